//! Instinct domain types: learned behavioral rules and their stores.
//!
//! An instinct pairs a *trigger* (when it applies) with an *action* (what to
//! do), tagged with a short domain such as `timing` or `communication`.
//! Instincts are owned by an external [`InstinctStore`]; the composer only
//! reads snapshots, derives transient confidence, and may request that a
//! decayed confidence be written back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::thread::ThreadId;

/// Clamp a confidence value into `[0, 1]`. NaN collapses to `0.0`.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Lifecycle status of an instinct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstinctStatus {
    #[default]
    Active,
    Deprecated,
    Deleted,
}

/// Reinforcement bookkeeping for an instinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstinctMetadata {
    /// Number of times the pattern has been reinforced.
    #[serde(default)]
    pub occurrence_count: u32,

    /// When the instinct was last reinforced, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,

    /// Observed success rate of acting on this instinct.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

fn default_success_rate() -> f64 {
    1.0
}

impl Default for InstinctMetadata {
    fn default() -> Self {
        Self {
            occurrence_count: 0,
            last_triggered: None,
            success_rate: default_success_rate(),
        }
    }
}

/// A learned behavioral rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instinct {
    /// Opaque identifier.
    pub id: String,

    /// When the instinct applies.
    pub trigger: String,

    /// What to do when it applies.
    pub action: String,

    /// Short category tag (`timing`, `communication`, `emotional`, ...).
    pub domain: String,

    /// Persisted confidence in `[0, 1]`.
    pub base_confidence: f64,

    /// When the pattern was first learned.
    pub created_at: DateTime<Utc>,

    /// Lifecycle status.
    #[serde(default)]
    pub status: InstinctStatus,

    /// Thread scope. `None` applies to every thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,

    /// Reinforcement bookkeeping.
    #[serde(default)]
    pub metadata: InstinctMetadata,
}

impl Instinct {
    /// Create a freshly learned, global instinct.
    pub fn new(
        trigger: impl Into<String>,
        action: impl Into<String>,
        domain: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trigger: trigger.into(),
            action: action.into(),
            domain: domain.into(),
            base_confidence: clamp_confidence(confidence),
            created_at: Utc::now(),
            status: InstinctStatus::Active,
            thread_id: None,
            metadata: InstinctMetadata::default(),
        }
    }

    /// Builder-style: scope this instinct to a thread.
    pub fn for_thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == InstinctStatus::Active
    }

    /// Whether this instinct applies to the given thread.
    pub fn applies_to(&self, thread_id: &ThreadId) -> bool {
        self.thread_id.as_ref().is_none_or(|t| t == thread_id)
    }

    /// Record a reinforcement: bump the count, stamp `last_triggered`, and
    /// raise the persisted confidence by `boost` (capped at 1.0).
    ///
    /// `created_at` is left untouched, so age-based decay keeps measuring
    /// from the moment the pattern was first learned.
    pub fn reinforce(&mut self, now: DateTime<Utc>, boost: f64) {
        self.metadata.occurrence_count = self.metadata.occurrence_count.saturating_add(1);
        self.metadata.last_triggered = Some(now);
        self.base_confidence = clamp_confidence(self.base_confidence + boost);
    }
}

/// An instinct paired with the confidence used for resolution and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredInstinct {
    pub instinct: Instinct,
    /// Calibrated effective confidence in `[0, 1]`.
    pub confidence: f64,
}

impl ScoredInstinct {
    pub fn new(instinct: Instinct, confidence: f64) -> Self {
        Self {
            instinct,
            confidence: clamp_confidence(confidence),
        }
    }

    pub fn id(&self) -> &str {
        &self.instinct.id
    }
}

/// The persisted instinct store. Implemented outside the core.
///
/// Implementations: in-memory (tests, ephemeral sessions) and JSON-lines
/// file in `tessera-memory`; production deployments bring their own.
#[async_trait]
pub trait InstinctStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Active instincts that apply to the given thread.
    async fn list_active_instincts(
        &self,
        thread_id: &ThreadId,
    ) -> std::result::Result<Vec<Instinct>, StoreError>;

    /// Overwrite the persisted confidence with a decayed value.
    async fn write_decayed_confidence(
        &self,
        id: &str,
        value: f64,
    ) -> std::result::Result<(), StoreError>;

    /// Apply a reinforcement of `boost` and return the updated instinct.
    async fn reinforce(&self, id: &str, boost: f64) -> std::result::Result<Instinct, StoreError>;

    /// Insert or replace an instinct. Returns its id.
    async fn upsert(&self, instinct: Instinct) -> std::result::Result<String, StoreError>;

    /// Fetch an instinct by id regardless of status.
    async fn get(&self, id: &str) -> std::result::Result<Option<Instinct>, StoreError>;
}

/// Receives predicted-vs-actual outcomes for calibration.
pub trait OutcomeRecorder: Send + Sync {
    fn record_prediction(
        &self,
        predicted_confidence: f64,
        actual_outcome: bool,
        instinct_id: &str,
        thread_id: &ThreadId,
    );
}
