//! Renders the surviving instincts as a prompt section.

use std::cmp::Ordering;
use tessera_config::InstinctConfig;
use tessera_core::instinct::ScoredInstinct;

pub const DIGEST_HEADER: &str = "## Learned Preferences";

/// Which instincts make it into the digest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigestOptions {
    pub max_instincts: usize,
    pub min_confidence: f64,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self::from(&InstinctConfig::default())
    }
}

impl From<&InstinctConfig> for DigestOptions {
    fn from(cfg: &InstinctConfig) -> Self {
        Self {
            max_instincts: cfg.max_digest_instincts,
            min_confidence: cfg.digest_min_confidence,
        }
    }
}

/// Render instincts strongest-first, one bullet each.
///
/// Returns an empty string when nothing qualifies.
pub fn render_digest(instincts: &[ScoredInstinct], options: &DigestOptions) -> String {
    let mut selected: Vec<&ScoredInstinct> = instincts
        .iter()
        .filter(|s| s.confidence >= options.min_confidence)
        .collect();

    selected.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id().cmp(b.id()))
    });
    selected.truncate(options.max_instincts);

    if selected.is_empty() {
        return String::new();
    }

    let mut out = String::from(DIGEST_HEADER);
    for s in selected {
        out.push_str(&format!(
            "\n- When {}: {} (confidence {:.2})",
            s.instinct.trigger.trim(),
            s.instinct.action.trim(),
            s.confidence
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::instinct::Instinct;

    fn scored(id: &str, trigger: &str, action: &str, confidence: f64) -> ScoredInstinct {
        let mut inst = Instinct::new(trigger, action, "general", confidence);
        inst.id = id.into();
        ScoredInstinct::new(inst, confidence)
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render_digest(&[], &DigestOptions::default()), "");
    }

    #[test]
    fn renders_strongest_first() {
        let out = render_digest(
            &[
                scored("b", "asked for code", "use rust", 0.6),
                scored("a", "writing docs", "keep it short", 0.82),
            ],
            &DigestOptions::default(),
        );
        assert_eq!(
            out,
            "## Learned Preferences\n\
             - When writing docs: keep it short (confidence 0.82)\n\
             - When asked for code: use rust (confidence 0.60)"
        );
    }

    #[test]
    fn ties_break_on_id() {
        let out = render_digest(
            &[
                scored("z", "t", "second", 0.5),
                scored("m", "t", "first", 0.5),
            ],
            &DigestOptions::default(),
        );
        let first = out.find("first").unwrap();
        let second = out.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn respects_cap_and_threshold() {
        let options = DigestOptions {
            max_instincts: 2,
            min_confidence: 0.4,
        };
        let out = render_digest(
            &[
                scored("a", "t", "weak", 0.3),
                scored("b", "t", "one", 0.9),
                scored("c", "t", "two", 0.8),
                scored("d", "t", "three", 0.7),
            ],
            &options,
        );
        assert_eq!(out.lines().count(), 3);
        assert!(!out.contains("weak"));
        assert!(!out.contains("three"));
    }

    #[test]
    fn everything_filtered_renders_nothing() {
        let options = DigestOptions {
            max_instincts: 10,
            min_confidence: 0.95,
        };
        assert_eq!(render_digest(&[scored("a", "t", "x", 0.5)], &options), "");
    }
}
