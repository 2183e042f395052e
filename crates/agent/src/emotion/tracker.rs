//! Per-conversation emotional state machine.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tessera_config::EmotionConfig;
use tessera_core::emotion::{EmotionKind, EmotionSample, EmotionalSummary};
use tracing::debug;

use super::detector;

const EPSILON: f64 = 1e-9;

/// Tuning for [`EmotionalStateTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionParams {
    pub guidance_threshold: f64,
    pub base_confidence: f64,
    pub repeat_increment: f64,
    pub blocked_penalty: f64,
    pub history_capacity: usize,
}

impl From<&EmotionConfig> for EmotionParams {
    fn from(cfg: &EmotionConfig) -> Self {
        Self {
            guidance_threshold: cfg.guidance_threshold,
            base_confidence: cfg.base_confidence,
            repeat_increment: cfg.repeat_increment,
            blocked_penalty: cfg.blocked_penalty,
            history_capacity: cfg.history_capacity.max(1),
        }
    }
}

impl Default for EmotionParams {
    fn default() -> Self {
        Self::from(&EmotionConfig::default())
    }
}

/// Whether the tracker may move directly from `from` to `to`.
///
/// Curious cannot follow Frustrated, and Frustrated cannot follow Satisfied
/// (a satisfied user has to pass through Confused first). Every other
/// transition is allowed.
pub fn can_transition(from: EmotionKind, to: EmotionKind) -> bool {
    use EmotionKind::*;
    match to {
        Curious => !matches!(from, Frustrated),
        Frustrated => !matches!(from, Satisfied),
        Neutral | Confused | Urgent | Satisfied => true,
    }
}

/// Tone guidance for a state. Empty for `Neutral`.
pub fn guidance_text(state: EmotionKind) -> &'static str {
    match state {
        EmotionKind::Neutral => "",
        EmotionKind::Curious => {
            "The user is exploring. Encourage that curiosity: offer concrete examples \
             and suggest where to go next."
        }
        EmotionKind::Confused => {
            "The user seems confused. Simplify the explanation, define any terms you use, \
             and check understanding before moving on."
        }
        EmotionKind::Frustrated => {
            "The user appears frustrated. Acknowledge it briefly, get straight to a \
             solution, and skip pleasantries."
        }
        EmotionKind::Urgent => {
            "The user is under time pressure. Lead with the answer and keep preamble \
             to a minimum."
        }
        EmotionKind::Satisfied => {
            "The user is happy with the current direction. Keep the same approach and \
             confirm clearly when the task is complete."
        }
    }
}

/// Tracks one conversation's emotional state across turns.
///
/// Not shared between threads of conversation; the caller owns one per
/// thread (see `ConversationSession`).
#[derive(Debug, Clone)]
pub struct EmotionalStateTracker {
    params: EmotionParams,
    state: EmotionKind,
    confidence: f64,
    history: VecDeque<EmotionSample>,
}

impl EmotionalStateTracker {
    pub fn new(params: EmotionParams) -> Self {
        Self {
            params,
            state: EmotionKind::Neutral,
            confidence: params.base_confidence,
            history: VecDeque::with_capacity(params.history_capacity),
        }
    }

    /// Resume from a previously observed state (e.g. after a restart).
    pub fn restore(params: EmotionParams, state: EmotionKind, confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            state,
            ..Self::new(params)
        }
    }

    pub fn state(&self) -> EmotionKind {
        self.state
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Classify `message` and advance the state machine.
    pub fn observe(
        &mut self,
        message: &str,
        conversation_length: usize,
        now: DateTime<Utc>,
    ) -> EmotionKind {
        let detected = detector::detect(message, conversation_length);
        self.apply(detected, now)
    }

    /// Advance the state machine with an already-detected state.
    pub fn apply(&mut self, detected: EmotionKind, now: DateTime<Utc>) -> EmotionKind {
        let previous = self.state;

        if !can_transition(previous, detected) {
            self.confidence = (self.confidence - self.params.blocked_penalty).max(0.0);
            debug!(
                from = %previous,
                to = %detected,
                confidence = self.confidence,
                "Emotional transition blocked"
            );
        } else if detected == previous {
            self.confidence = (self.confidence + self.params.repeat_increment).min(1.0);
        } else {
            self.state = detected;
            self.confidence = self.params.base_confidence;
            debug!(from = %previous, to = %detected, "Emotional state changed");
        }

        if self.history.len() >= self.params.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(EmotionSample {
            state: self.state,
            at: now,
        });

        self.state
    }

    /// Tone guidance for the current state, or empty when not confident
    /// enough (or neutral).
    pub fn guidance(&self) -> &'static str {
        if self.state == EmotionKind::Neutral
            || self.confidence + EPSILON < self.params.guidance_threshold
        {
            return "";
        }
        guidance_text(self.state)
    }

    pub fn summary(&self) -> EmotionalSummary {
        EmotionalSummary {
            state: self.state,
            confidence: self.confidence,
            history: self.history.iter().cloned().collect(),
        }
    }
}

impl Default for EmotionalStateTracker {
    fn default() -> Self {
        Self::new(EmotionParams::default())
    }
}
