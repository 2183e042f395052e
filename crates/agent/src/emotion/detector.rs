//! Keyword/regex heuristics that classify a single message.
//!
//! This is a rough signal meant to steer tone, not a sentiment model. Pattern
//! sets are checked in a fixed priority order and the first match wins.

use regex_lite::Regex;
use std::sync::LazyLock;
use tessera_core::emotion::EmotionKind;
use tracing::warn;

const FRUSTRATED: &[&str] = &[
    r"frustrat",
    r"annoy",
    r"\b(still|not|doesn't|isn't|doesnt|isnt) work(ing|s)?\b",
    r"useless",
    r"ridiculous",
    r"waste of time",
    r"\bugh+\b",
    r"!!!",
    r"again\?!",
];

const SATISFIED: &[&str] = &[
    r"\bthank(s| you)",
    r"\bperfect\b",
    r"works now",
    r"that (helped|worked)",
    r"awesome",
    r"\bgreat\b",
    r"\bsolved\b",
];

const CONFUSED: &[&str] = &[
    r"confus",
    r"(don't|do not|dont) understand",
    r"what do you mean",
    r"unclear",
    r"makes no sense",
    r"\?\?",
    r"i'm lost",
];

const URGENT: &[&str] = &[
    r"urgent",
    r"\basap\b",
    r"immediately",
    r"right now",
    r"emergency",
    r"deadline",
    r"\bhurry\b",
];

/// Detection priority, highest first.
const PRIORITY: [(EmotionKind, &[&str]); 4] = [
    (EmotionKind::Frustrated, FRUSTRATED),
    (EmotionKind::Satisfied, SATISFIED),
    (EmotionKind::Confused, CONFUSED),
    (EmotionKind::Urgent, URGENT),
];

static PATTERN_SETS: LazyLock<Vec<(EmotionKind, Vec<Regex>)>> = LazyLock::new(|| {
    PRIORITY
        .iter()
        .map(|(kind, raw)| (*kind, raw.iter().filter_map(|p| compile(p)).collect()))
        .collect()
});

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(&format!("(?i){pattern}")) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "Skipping invalid emotion pattern");
            None
        }
    }
}

/// Classify one message.
///
/// No match yields `Neutral`, except on the very first turn
/// (`conversation_length == 0`) where a fresh conversation reads as `Curious`.
pub fn detect(message: &str, conversation_length: usize) -> EmotionKind {
    for (kind, patterns) in PATTERN_SETS.iter() {
        if patterns.iter().any(|re| re.is_match(message)) {
            return *kind;
        }
    }

    if conversation_length == 0 {
        EmotionKind::Curious
    } else {
        EmotionKind::Neutral
    }
}
