//! Instinct confidence engine.
//!
//! Stage A, persisted decay:
//!
//! ```text
//! decayed = base * 0.5^(age_days / half_life_days)      (floored at min_confidence)
//! ```
//!
//! skipped entirely once an instinct has been reinforced
//! `decay_exempt_occurrences` times. The result may overwrite the stored
//! snapshot, so repeated reads without reinforcement keep lowering it until
//! the floor.
//!
//! Stage B, transient adjustment:
//!
//! ```text
//! (decayed + frequency_boost + staleness_penalty) * max(success_floor, success_rate)
//! ```
//!
//! clamped to `[0, 1]` and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_config::InstinctConfig;
use tessera_core::instinct::{Instinct, clamp_confidence};

use crate::calibration::CalibrationTable;

/// Changes smaller than this are not worth a store write.
const WRITE_BACK_EPSILON: f64 = 1e-9;

/// Tuning knobs for both confidence stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceParams {
    pub half_life_days: f64,
    pub min_confidence: f64,
    pub decay_exempt_occurrences: u32,
    pub reinforcement_boost: f64,
    pub frequency_step: f64,
    pub frequency_cap: f64,
    pub staleness_step: f64,
    pub staleness_cap: f64,
    pub success_floor: f64,
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self::from(&InstinctConfig::default())
    }
}

impl From<&InstinctConfig> for ConfidenceParams {
    fn from(cfg: &InstinctConfig) -> Self {
        Self {
            half_life_days: cfg.half_life_days,
            min_confidence: cfg.min_confidence,
            decay_exempt_occurrences: cfg.decay_exempt_occurrences,
            reinforcement_boost: cfg.reinforcement_boost,
            frequency_step: cfg.frequency_step,
            frequency_cap: cfg.frequency_cap,
            staleness_step: cfg.staleness_step,
            staleness_cap: cfg.staleness_cap,
            success_floor: cfg.success_floor,
        }
    }
}

/// Result of a Stage A decay computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayOutcome {
    /// Stored confidence before decay.
    pub previous: f64,
    /// Confidence after decay.
    pub confidence: f64,
    /// Whether the instinct was exempt through heavy reinforcement.
    pub exempt: bool,
}

impl DecayOutcome {
    /// Whether the stored snapshot should be overwritten.
    pub fn changed(&self) -> bool {
        (self.previous - self.confidence).abs() > WRITE_BACK_EPSILON
    }
}

/// Computes decayed, effective, and calibrated confidence for instincts.
///
/// Stateless apart from its parameters; share one per process.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceEngine {
    params: ConfidenceParams,
}

impl ConfidenceEngine {
    pub fn new(params: ConfidenceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConfidenceParams {
        &self.params
    }

    // ── Stage A ───────────────────────────────────────────────────────

    /// Compute persisted decay without touching the instinct.
    pub fn decayed_confidence(&self, instinct: &Instinct, now: DateTime<Utc>) -> DecayOutcome {
        let previous = clamp_confidence(instinct.base_confidence);

        if instinct.metadata.occurrence_count >= self.params.decay_exempt_occurrences {
            return DecayOutcome {
                previous,
                confidence: previous,
                exempt: true,
            };
        }

        // The floor never lifts a value that already sits below it.
        let confidence = if previous <= self.params.min_confidence {
            previous
        } else {
            let age_days = days_between(now, instinct.created_at);
            let decayed = previous * 0.5_f64.powf(age_days / self.params.half_life_days);
            decayed.max(self.params.min_confidence).min(previous)
        };

        DecayOutcome {
            previous,
            confidence,
            exempt: false,
        }
    }

    /// Apply persisted decay to the instinct in place.
    ///
    /// The caller decides whether to write `outcome.confidence` back to the
    /// store (see [`DecayOutcome::changed`]).
    pub fn apply_decay(&self, instinct: &mut Instinct, now: DateTime<Utc>) -> DecayOutcome {
        let outcome = self.decayed_confidence(instinct, now);
        instinct.base_confidence = outcome.confidence;
        outcome
    }

    // ── Stage B ───────────────────────────────────────────────────────

    /// Transient, per-request adjustment on top of a Stage A value.
    pub fn transient_confidence(
        &self,
        instinct: &Instinct,
        decayed: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        let meta = &instinct.metadata;
        let p = &self.params;

        let frequency_boost =
            (meta.occurrence_count as f64 * p.frequency_step).min(p.frequency_cap);

        let staleness_penalty = match meta.last_triggered {
            Some(at) => (-days_between(now, at) * p.staleness_step).max(-p.staleness_cap),
            None => 0.0,
        };

        let success_multiplier = clamp_confidence(meta.success_rate).max(p.success_floor);

        clamp_confidence((decayed + frequency_boost + staleness_penalty) * success_multiplier)
    }

    /// Stage A followed by Stage B, without mutating the instinct.
    pub fn effective_confidence(&self, instinct: &Instinct, now: DateTime<Utc>) -> f64 {
        let decay = self.decayed_confidence(instinct, now);
        self.transient_confidence(instinct, decay.confidence, now)
    }

    /// Effective confidence corrected by the calibration table.
    pub fn calibrated_confidence(
        &self,
        instinct: &Instinct,
        now: DateTime<Utc>,
        table: &CalibrationTable,
    ) -> f64 {
        table.calibrate(self.effective_confidence(instinct, now))
    }

    // ── Reinforcement ─────────────────────────────────────────────────

    pub fn reinforce(&self, instinct: &mut Instinct, now: DateTime<Utc>) {
        instinct.reinforce(now, self.params.reinforcement_boost);
    }
}

/// Fractional days from `earlier` to `later`; negative spans count as zero.
fn days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let millis = (later - earlier).num_milliseconds();
    (millis.max(0) as f64) / 86_400_000.0
}
