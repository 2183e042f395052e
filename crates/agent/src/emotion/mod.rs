//! Emotional state tracking.
//!
//! Each inbound message is classified by [`detector::detect`] and fed to a
//! per-conversation [`EmotionalStateTracker`], which gates implausible
//! transitions and builds confidence in a state only as it keeps being
//! observed. Once confident, the tracker contributes a short guidance layer.

pub mod detector;
pub mod tracker;

pub use detector::detect;
pub use tracker::{EmotionParams, EmotionalStateTracker, can_transition, guidance_text};
