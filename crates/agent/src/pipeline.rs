//! The prompt pipeline: one composed system prompt per inbound message.
//!
//! ```text
//! message ──▶ emotional tracker ──────────────────────────────┐
//!                                                             ▼
//! store ──▶ decay ▸ adjust ▸ calibrate ──▶ resolve ──▶ digest ─┤
//!                                                             ▼
//! layer sources (admin, role, user, channel, skills) ──▶ budget ──▶ compose
//! ```
//!
//! Nothing here is fatal to a turn: a failing store or layer source yields
//! an empty layer and is listed in the report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_config::{AppConfig, BudgetConfig};
use tessera_core::emotion::EmotionKind;
use tessera_core::error::StoreError;
use tessera_core::instinct::{Instinct, InstinctStore, ScoredInstinct};
use tessera_core::layer::{LayerKind, LayerSource, PromptLayer, RenderContext};
use tessera_core::thread::ThreadId;
use tessera_instincts::{
    CalibrationParams, Calibrator, ConfidenceEngine, ConfidenceParams, ConflictResolver,
    DigestOptions, PredictionRecord, RuleError, RuleSet, render_digest,
};
use tracing::{debug, warn};

use crate::context::{AllocationReport, BudgetAllocator, PromptComposer};
use crate::emotion::EmotionParams;
use crate::session::{ConversationSession, SessionRegistry};
use crate::sources::{ChannelFormattingSource, StaticLayerSource};

// ── Request / response ────────────────────────────────────────────────────

/// One inbound message to compose a prompt for.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub thread_id: ThreadId,
    pub channel: String,
    pub latest_message: String,
    /// Number of prior turns in the conversation; 0 for the first message.
    pub conversation_length: usize,
}

impl ComposeRequest {
    pub fn new(thread_id: ThreadId, latest_message: impl Into<String>) -> Self {
        Self {
            thread_id,
            channel: "default".into(),
            latest_message: latest_message.into(),
            conversation_length: 0,
        }
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn turn(mut self, conversation_length: usize) -> Self {
        self.conversation_length = conversation_length;
        self
    }
}

/// The composed system prompt plus diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedPrompt {
    pub text: String,
    pub report: AllocationReport,
    pub emotional_state: EmotionKind,
    /// Active instincts scored for this turn.
    pub instincts_considered: usize,
    /// Survivors of conflict resolution, in store order.
    pub instincts_kept: Vec<ScoredInstinct>,
}

// ── Pipeline ──────────────────────────────────────────────────────────────

/// Layers rendered by registered sources rather than computed here.
const SOURCED_LAYERS: [LayerKind; 5] = [
    LayerKind::Admin,
    LayerKind::BaseRole,
    LayerKind::UserCustomization,
    LayerKind::ChannelFormatting,
    LayerKind::SkillIndex,
];

/// The prompt pipeline. `Send + Sync`; share it behind an `Arc`.
pub struct PromptPipeline {
    store: Arc<dyn InstinctStore>,
    engine: ConfidenceEngine,
    calibrator: Arc<Calibrator>,
    resolver: ConflictResolver,
    digest: DigestOptions,
    budget: BudgetConfig,
    emotion: EmotionParams,
    sources: BTreeMap<LayerKind, Arc<dyn LayerSource>>,
    composer: PromptComposer,
}

impl PromptPipeline {
    /// A pipeline with default tuning, the built-in rule table, and only the
    /// default base role registered.
    pub fn new(store: Arc<dyn InstinctStore>) -> Self {
        Self::build(&AppConfig::default(), store, ConflictResolver::with_default_rules())
    }

    /// Build from configuration. Inline prompt texts become static sources.
    ///
    /// `[[conflict_rules]]`, when present, replace the built-in rule table.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn InstinctStore>,
    ) -> Result<Self, RuleError> {
        let resolver = if config.conflict_rules.is_empty() {
            ConflictResolver::with_default_rules()
        } else {
            ConflictResolver::new(RuleSet::from_config(&config.conflict_rules)?)?
        };
        Ok(Self::build(config, store, resolver))
    }

    fn build(
        config: &AppConfig,
        store: Arc<dyn InstinctStore>,
        resolver: ConflictResolver,
    ) -> Self {
        let mut sources: BTreeMap<LayerKind, Arc<dyn LayerSource>> = BTreeMap::new();
        let prompt = &config.prompt;

        let inline = [
            (LayerKind::Admin, prompt.admin_policy.as_deref()),
            (LayerKind::BaseRole, Some(prompt.base_role.as_str())),
            (LayerKind::UserCustomization, prompt.user_customization.as_deref()),
            (LayerKind::SkillIndex, prompt.skill_index.as_deref()),
        ];
        for (kind, text) in inline {
            if let Some(text) = text {
                sources.insert(kind, Arc::new(StaticLayerSource::new(text)));
            }
        }
        if !prompt.channel_formatting.is_empty() {
            sources.insert(
                LayerKind::ChannelFormatting,
                Arc::new(ChannelFormattingSource::new(prompt.channel_formatting.clone())),
            );
        }

        Self {
            store,
            engine: ConfidenceEngine::new(ConfidenceParams::from(&config.instincts)),
            calibrator: Arc::new(Calibrator::new(CalibrationParams::from(&config.calibration))),
            resolver,
            digest: DigestOptions::from(&config.instincts),
            budget: config.budget.clone(),
            emotion: EmotionParams::from(&config.emotion),
            sources,
            composer: PromptComposer::new(),
        }
    }

    /// Register (or replace) the source for a layer.
    ///
    /// Only admin, base role, user customization, channel formatting and skill
    /// index are rendered from sources; the digest and emotional guidance are
    /// always computed by the pipeline.
    pub fn with_source(mut self, kind: LayerKind, source: Arc<dyn LayerSource>) -> Self {
        if SOURCED_LAYERS.contains(&kind) {
            self.sources.insert(kind, source);
        } else {
            warn!(layer = %kind, "Layer is computed internally; source ignored");
        }
        self
    }

    pub fn without_source(mut self, kind: LayerKind) -> Self {
        self.sources.remove(&kind);
        self
    }

    /// Share a process-wide calibrator between pipelines.
    pub fn with_calibrator(mut self, calibrator: Arc<Calibrator>) -> Self {
        self.calibrator = calibrator;
        self
    }

    pub fn store(&self) -> &Arc<dyn InstinctStore> {
        &self.store
    }

    pub fn engine(&self) -> &ConfidenceEngine {
        &self.engine
    }

    pub fn calibrator(&self) -> &Arc<Calibrator> {
        &self.calibrator
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// A fresh session using this pipeline's emotion tuning.
    pub fn new_session(&self, thread_id: ThreadId) -> ConversationSession {
        ConversationSession::new(thread_id, self.emotion)
    }

    /// An empty registry using this pipeline's emotion tuning.
    pub fn session_registry(&self) -> SessionRegistry {
        SessionRegistry::new(self.emotion)
    }

    pub async fn compose_prompt(
        &self,
        session: &mut ConversationSession,
        request: &ComposeRequest,
    ) -> ComposedPrompt {
        self.compose_prompt_at(session, request, Utc::now()).await
    }

    /// [`compose_prompt`](Self::compose_prompt) with an explicit clock.
    pub async fn compose_prompt_at(
        &self,
        session: &mut ConversationSession,
        request: &ComposeRequest,
        now: DateTime<Utc>,
    ) -> ComposedPrompt {
        let thread_id = &request.thread_id;
        let emotional_state = session.tracker_mut().observe(
            &request.latest_message,
            request.conversation_length,
            now,
        );

        let mut failed_layers = Vec::new();

        // ── Instincts ──────────────────────────────────────────────────────
        let (considered, kept) = match self.score_instincts(thread_id, now).await {
            Ok(scored) => {
                let considered = scored.len();
                (considered, self.resolver.resolve(scored))
            }
            Err(e) => {
                warn!(
                    thread = %thread_id,
                    error = %e,
                    "Instinct store unavailable; digest left empty"
                );
                failed_layers.push(LayerKind::InstinctDigest.name().to_string());
                (0, Vec::new())
            }
        };
        let digest = render_digest(&kept, &self.digest);

        // ── Layers ─────────────────────────────────────────────────────────
        let ctx = RenderContext {
            thread_id,
            channel: &request.channel,
        };
        let mut layers = Vec::with_capacity(LayerKind::ALL.len());
        for kind in LayerKind::ALL {
            let text = match kind {
                LayerKind::InstinctDigest => digest.clone(),
                LayerKind::EmotionalGuidance => session.tracker().guidance().to_string(),
                _ => self.render_source(kind, &ctx, &mut failed_layers),
            };
            layers.push(PromptLayer::with_policy(kind, text, self.budget.policy_for(kind)));
        }

        // ── Budget + compose ───────────────────────────────────────────────
        let allocation = BudgetAllocator::new(self.budget.global_max_tokens).allocate(layers);
        let text = self.composer.compose(&allocation.layers);
        let mut report = allocation.report;
        report.failed_layers = failed_layers;

        debug!(
            thread = %thread_id,
            tokens = report.total_tokens,
            budget = report.budget,
            instincts = kept.len(),
            emotion = %emotional_state,
            "Prompt composed"
        );

        ComposedPrompt {
            text,
            report,
            emotional_state,
            instincts_considered: considered,
            instincts_kept: kept,
        }
    }

    /// Active instincts for a thread with calibrated effective confidence.
    ///
    /// Persists Stage A decay for every instinct whose stored confidence
    /// changed. Write-back failures are logged and otherwise ignored.
    pub async fn score_instincts(
        &self,
        thread_id: &ThreadId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredInstinct>, StoreError> {
        let instincts = self.store.list_active_instincts(thread_id).await?;
        let table = self.calibrator.snapshot();
        let mut scored = Vec::with_capacity(instincts.len());

        for mut instinct in instincts {
            if !instinct.is_active() {
                continue;
            }

            let decay = self.engine.apply_decay(&mut instinct, now);
            if decay.changed() {
                match self
                    .store
                    .write_decayed_confidence(&instinct.id, decay.confidence)
                    .await
                {
                    Ok(()) => debug!(
                        instinct = %instinct.id,
                        from = decay.previous,
                        to = decay.confidence,
                        "Decayed confidence persisted"
                    ),
                    Err(e) => warn!(
                        instinct = %instinct.id,
                        error = %e,
                        "Failed to persist decayed confidence"
                    ),
                }
            }

            let effective = self.engine.transient_confidence(&instinct, decay.confidence, now);
            scored.push(ScoredInstinct::new(instinct, table.calibrate(effective)));
        }

        Ok(scored)
    }

    /// Reinforce an instinct that proved useful, by the configured boost.
    pub async fn reinforce(&self, instinct_id: &str) -> Result<Instinct, StoreError> {
        let boost = self.engine.params().reinforcement_boost;
        let instinct = self.store.reinforce(instinct_id, boost).await?;
        debug!(
            instinct = %instinct.id,
            confidence = instinct.base_confidence,
            occurrences = instinct.metadata.occurrence_count,
            "Instinct reinforced"
        );
        Ok(instinct)
    }

    /// Feed a predicted-vs-actual outcome to the calibrator.
    ///
    /// Returns `true` when this record triggered a calibration rebuild.
    pub fn record_outcome(
        &self,
        predicted: f64,
        outcome: bool,
        instinct_id: &str,
        thread_id: &ThreadId,
    ) -> bool {
        self.calibrator.record(PredictionRecord {
            predicted,
            outcome,
            instinct_id: instinct_id.to_string(),
            thread_id: thread_id.clone(),
            recorded_at: Utc::now(),
        })
    }

    fn render_source(
        &self,
        kind: LayerKind,
        ctx: &RenderContext<'_>,
        failed: &mut Vec<String>,
    ) -> String {
        let Some(source) = self.sources.get(&kind) else {
            return String::new();
        };
        match source.render(ctx) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    layer = %kind,
                    thread = %ctx.thread_id,
                    error = %e,
                    "Layer source failed; layer left empty"
                );
                failed.push(kind.name().to_string());
                String::new()
            }
        }
    }
}
