//! Instincts: learned behavioral rules, scored and de-conflicted.
//!
//! This crate turns a snapshot of stored instincts into the set that is
//! actually rendered into a prompt:
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌─────────────┐   ┌──────────┐
//! │ InstinctStore│──▶│ ConfidenceEngine │──▶│  Conflict   │──▶│  Digest  │
//! │  (snapshot)  │   │ decay ▸ adjust ▸ │   │  Resolver   │   │ renderer │
//! └──────────────┘   │    calibrate     │   └─────────────┘   └──────────┘
//!                    └──────────────────┘
//! ```
//!
//! Confidence is computed in two stages. Stage A (persisted decay) erodes
//! unused instincts and may be written back to the store. Stage B
//! (frequency, staleness, success) reflects relevance right now and is never
//! persisted. A process-wide [`Calibrator`] nudges the result up or down
//! depending on how well each confidence band has predicted real outcomes.
//!
//! # Example rule table
//!
//! ```toml
//! [[rules]]
//! name = "urgency-over-detail"
//! min_overrider_confidence = 0.6
//! [rules.overrider]
//! keywords = ["urgent", "asap"]
//! [rules.overridden]
//! keywords = ["detailed", "thorough"]
//! ```

mod calibration;
mod confidence;
mod digest;
mod resolver;
mod rules;

pub use calibration::{
    CalibrationBin, CalibrationParams, CalibrationTable, Calibrator, PredictionRecord, bin_index,
};
pub use confidence::{ConfidenceEngine, ConfidenceParams, DecayOutcome};
pub use digest::{DIGEST_HEADER, DigestOptions, render_digest};
pub use resolver::{ConflictResolver, Override, Resolution};
pub use rules::{ConflictRule, OverriddenPattern, OverriderPattern, RuleSet};

/// Errors from the conflict rule subsystem.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("invalid conflict rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
