//! Configuration loading, validation, and management for Tessera.
//!
//! Loads configuration from `~/.tessera/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tessera_core::layer::{LayerKind, LayerPolicy};

/// The root configuration structure.
///
/// Maps directly to `~/.tessera/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Token budgets
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Instinct confidence engine tuning
    #[serde(default)]
    pub instincts: InstinctConfig,

    /// Calibration table tuning
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Emotional state tracker tuning
    #[serde(default)]
    pub emotion: EmotionConfig,

    /// Static layer texts
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Replacement conflict rule table (empty = built-in rules)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_rules: Vec<ConflictRuleConfig>,

    /// JSON-lines file backing the instinct store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instinct_store_path: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum estimated tokens for the whole composed prompt
    #[serde(default = "default_global_max_tokens")]
    pub global_max_tokens: usize,

    /// Per-layer overrides keyed by layer name (e.g. `skill_index`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layers: BTreeMap<String, LayerOverride>,
}

fn default_global_max_tokens() -> usize {
    4000
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global_max_tokens: default_global_max_tokens(),
            layers: BTreeMap::new(),
        }
    }
}

impl BudgetConfig {
    /// Effective policy for a layer: built-in defaults with overrides applied.
    pub fn policy_for(&self, kind: LayerKind) -> LayerPolicy {
        let mut policy = kind.default_policy();
        if let Some(o) = self.layers.get(kind.name()) {
            if let Some(cap) = o.token_cap {
                policy.token_cap = cap;
            }
            if let Some(priority) = o.priority {
                policy.priority = priority;
            }
            if let Some(truncatable) = o.truncatable {
                policy.truncatable = truncatable;
            }
        }
        policy
    }
}

/// Optional per-layer budget overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_cap: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncatable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstinctConfig {
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,

    /// Floor applied by persisted decay
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Instincts reinforced at least this often never decay
    #[serde(default = "default_decay_exempt_occurrences")]
    pub decay_exempt_occurrences: u32,

    #[serde(default = "default_reinforcement_boost")]
    pub reinforcement_boost: f64,

    #[serde(default = "default_frequency_step")]
    pub frequency_step: f64,

    #[serde(default = "default_frequency_cap")]
    pub frequency_cap: f64,

    #[serde(default = "default_staleness_step")]
    pub staleness_step: f64,

    #[serde(default = "default_staleness_cap")]
    pub staleness_cap: f64,

    #[serde(default = "default_success_floor")]
    pub success_floor: f64,

    /// Maximum instincts rendered into the digest
    #[serde(default = "default_max_digest_instincts")]
    pub max_digest_instincts: usize,

    /// Minimum calibrated confidence for an instinct to appear in the digest
    #[serde(default)]
    pub digest_min_confidence: f64,
}

fn default_half_life_days() -> f64 {
    30.0
}
fn default_min_confidence() -> f64 {
    0.3
}
fn default_decay_exempt_occurrences() -> u32 {
    5
}
fn default_reinforcement_boost() -> f64 {
    0.1
}
fn default_frequency_step() -> f64 {
    0.03
}
fn default_frequency_cap() -> f64 {
    0.15
}
fn default_staleness_step() -> f64 {
    0.01
}
fn default_staleness_cap() -> f64 {
    0.2
}
fn default_success_floor() -> f64 {
    0.8
}
fn default_max_digest_instincts() -> usize {
    10
}

impl Default for InstinctConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            min_confidence: default_min_confidence(),
            decay_exempt_occurrences: default_decay_exempt_occurrences(),
            reinforcement_boost: default_reinforcement_boost(),
            frequency_step: default_frequency_step(),
            frequency_cap: default_frequency_cap(),
            staleness_step: default_staleness_step(),
            staleness_cap: default_staleness_cap(),
            success_floor: default_success_floor(),
            max_digest_instincts: default_max_digest_instincts(),
            digest_min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Rebuild the table after this many recorded predictions
    #[serde(default = "default_recalibrate_every")]
    pub recalibrate_every: usize,

    /// Bins with fewer samples contribute no adjustment
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,

    /// Gap between predicted and observed rate that triggers an adjustment
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,

    #[serde(default = "default_adjustment")]
    pub adjustment: f64,
}

fn default_recalibrate_every() -> usize {
    50
}
fn default_min_samples() -> u32 {
    5
}
fn default_drift_threshold() -> f64 {
    0.1
}
fn default_adjustment() -> f64 {
    0.1
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            recalibrate_every: default_recalibrate_every(),
            min_samples: default_min_samples(),
            drift_threshold: default_drift_threshold(),
            adjustment: default_adjustment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionConfig {
    /// Guidance is only emitted at or above this confidence
    #[serde(default = "default_guidance_threshold")]
    pub guidance_threshold: f64,

    /// Confidence after a state change
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    #[serde(default = "default_repeat_increment")]
    pub repeat_increment: f64,

    #[serde(default = "default_blocked_penalty")]
    pub blocked_penalty: f64,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_guidance_threshold() -> f64 {
    0.6
}
fn default_base_confidence() -> f64 {
    0.5
}
fn default_repeat_increment() -> f64 {
    0.05
}
fn default_blocked_penalty() -> f64 {
    0.1
}
fn default_history_capacity() -> usize {
    10
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            guidance_threshold: default_guidance_threshold(),
            base_confidence: default_base_confidence(),
            repeat_increment: default_repeat_increment(),
            blocked_penalty: default_blocked_penalty(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Inline texts for the static layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_policy: Option<String>,

    #[serde(default = "default_base_role")]
    pub base_role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_customization: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_index: Option<String>,

    /// Formatting rules keyed by channel name (`telegram`, `slack`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channel_formatting: BTreeMap<String, String>,
}

fn default_base_role() -> String {
    concat!(
        "You are a helpful, capable assistant. ",
        "Answer accurately, say when you are unsure, ",
        "and ask for clarification when a request is ambiguous.",
    )
    .into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            admin_policy: None,
            base_role: default_base_role(),
            user_customization: None,
            skill_index: None,
            channel_formatting: BTreeMap::new(),
        }
    }
}

/// A conflict rule as written in `config.toml` under `[[conflict_rules]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRuleConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrider_domain: Option<String>,

    #[serde(default)]
    pub overrider_keywords: Vec<String>,

    #[serde(default)]
    pub overridden_domains: Vec<String>,

    #[serde(default)]
    pub overridden_keywords: Vec<String>,

    #[serde(default)]
    pub min_overrider_confidence: f64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.tessera/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `TESSERA_GLOBAL_MAX_TOKENS`
    /// - `TESSERA_HALF_LIFE_DAYS`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Like [`load`](Self::load) but from an explicit path.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = std::env::var("TESSERA_GLOBAL_MAX_TOKENS") {
            self.budget.global_max_tokens = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "TESSERA_GLOBAL_MAX_TOKENS must be an integer, got '{raw}'"
                ))
            })?;
        }
        if let Ok(raw) = std::env::var("TESSERA_HALF_LIFE_DAYS") {
            self.instincts.half_life_days = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "TESSERA_HALF_LIFE_DAYS must be a number, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tessera")
    }

    /// Default config file: `~/.tessera/config.toml`.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Instinct store file, defaulting to `~/.tessera/instincts.jsonl`.
    pub fn instinct_store_path(&self) -> PathBuf {
        match &self.instinct_store_path {
            Some(p) => PathBuf::from(p),
            None => Self::config_dir().join("instincts.jsonl"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.budget.global_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "budget.global_max_tokens must be > 0".into(),
            ));
        }

        for name in self.budget.layers.keys() {
            name.parse::<LayerKind>().map_err(ConfigError::ValidationError)?;
        }

        let inst = &self.instincts;
        if !(inst.half_life_days > 0.0) {
            return Err(ConfigError::ValidationError(
                "instincts.half_life_days must be > 0".into(),
            ));
        }
        for (field, value) in [
            ("instincts.min_confidence", inst.min_confidence),
            ("instincts.reinforcement_boost", inst.reinforcement_boost),
            ("instincts.frequency_step", inst.frequency_step),
            ("instincts.frequency_cap", inst.frequency_cap),
            ("instincts.staleness_step", inst.staleness_step),
            ("instincts.staleness_cap", inst.staleness_cap),
            ("instincts.success_floor", inst.success_floor),
            ("instincts.digest_min_confidence", inst.digest_min_confidence),
            ("calibration.drift_threshold", self.calibration.drift_threshold),
            ("calibration.adjustment", self.calibration.adjustment),
            ("emotion.guidance_threshold", self.emotion.guidance_threshold),
            ("emotion.base_confidence", self.emotion.base_confidence),
            ("emotion.repeat_increment", self.emotion.repeat_increment),
            ("emotion.blocked_penalty", self.emotion.blocked_penalty),
        ] {
            check_unit_interval(field, value)?;
        }

        if self.calibration.recalibrate_every == 0 {
            return Err(ConfigError::ValidationError(
                "calibration.recalibrate_every must be > 0".into(),
            ));
        }

        if self.emotion.history_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "emotion.history_capacity must be > 0".into(),
            ));
        }

        for rule in &self.conflict_rules {
            check_unit_interval(
                &format!("conflict_rules.{}.min_overrider_confidence", rule.name),
                rule.min_overrider_confidence,
            )?;
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{field} must be between 0.0 and 1.0"
        )))
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
