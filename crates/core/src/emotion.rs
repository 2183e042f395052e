//! Emotional-state value types shared between the tracker and its callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The emotional states a conversation can be in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionKind {
    #[default]
    Neutral,
    Curious,
    Confused,
    Frustrated,
    Urgent,
    Satisfied,
}

impl EmotionKind {
    pub const ALL: [EmotionKind; 6] = [
        EmotionKind::Neutral,
        EmotionKind::Curious,
        EmotionKind::Confused,
        EmotionKind::Frustrated,
        EmotionKind::Urgent,
        EmotionKind::Satisfied,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionKind::Neutral => "neutral",
            EmotionKind::Curious => "curious",
            EmotionKind::Confused => "confused",
            EmotionKind::Frustrated => "frustrated",
            EmotionKind::Urgent => "urgent",
            EmotionKind::Satisfied => "satisfied",
        }
    }
}

impl std::fmt::Display for EmotionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the tracker's diagnostic history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSample {
    pub state: EmotionKind,
    pub at: DateTime<Utc>,
}

/// Diagnostic snapshot of a conversation's emotional state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalSummary {
    pub state: EmotionKind,
    pub confidence: f64,
    /// Oldest first.
    pub history: Vec<EmotionSample>,
}
