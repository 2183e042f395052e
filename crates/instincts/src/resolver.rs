//! Conflict resolution engine.
//!
//! Evaluates every enabled rule against every ordered pair of distinct
//! instincts in the *original* set, marks the overridden ones, and removes
//! them in a single pass. Because marks never depend on earlier removals,
//! the result is independent of pair order and `resolve` is idempotent.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tessera_core::instinct::ScoredInstinct;
use tracing::{debug, info};

use crate::RuleError;
use crate::rules::RuleSet;

/// One applied override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub rule: String,
    pub winner_id: String,
    pub loser_id: String,
}

/// Outcome of resolving an instinct set.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Survivors, in input order.
    pub kept: Vec<ScoredInstinct>,
    /// One entry per removed instinct, naming the first rule that removed it.
    pub overrides: Vec<Override>,
}

/// The conflict resolver.
///
/// Thread-safe. Holds an ordered [`RuleSet`] that can be swapped at runtime.
pub struct ConflictResolver {
    rules: RwLock<RuleSet>,
}

impl ConflictResolver {
    pub fn new(rules: RuleSet) -> Result<Self, RuleError> {
        rules.validate()?;
        Ok(Self {
            rules: RwLock::new(rules),
        })
    }

    pub fn with_default_rules() -> Self {
        Self {
            rules: RwLock::new(RuleSet::defaults()),
        }
    }

    /// Replace the rule table.
    pub fn reload(&self, rules: RuleSet) -> Result<(), RuleError> {
        rules.validate()?;
        let count = rules.active_count();
        *self.rules.write().unwrap_or_else(|e| e.into_inner()) = rules;
        info!(rules = count, "Conflict rules reloaded");
        Ok(())
    }

    /// A copy of the current rule table.
    pub fn rules(&self) -> RuleSet {
        self.rules.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove instincts overridden by higher-priority contradictory ones.
    pub fn resolve(&self, instincts: Vec<ScoredInstinct>) -> Vec<ScoredInstinct> {
        self.resolve_with_report(instincts).kept
    }

    /// Like [`resolve`](Self::resolve), also reporting which rule removed what.
    pub fn resolve_with_report(&self, instincts: Vec<ScoredInstinct>) -> Resolution {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        let mut removed_by: Vec<Option<Override>> = vec![None; instincts.len()];

        for rule in rules.enabled() {
            for (i, a) in instincts.iter().enumerate() {
                if a.confidence < rule.min_overrider_confidence
                    || !rule.matches_overrider(&a.instinct)
                {
                    continue;
                }
                for (j, b) in instincts.iter().enumerate() {
                    if i == j || removed_by[j].is_some() || !rule.matches_overridden(&b.instinct) {
                        continue;
                    }
                    // Mutual conflict: only the loser is removed.
                    if overrides_any(&rules, b, a) && !wins(a, b) {
                        continue;
                    }
                    debug!(
                        rule = %rule.name,
                        winner = %a.id(),
                        loser = %b.id(),
                        "Instinct overridden"
                    );
                    removed_by[j] = Some(Override {
                        rule: rule.name.clone(),
                        winner_id: a.id().to_string(),
                        loser_id: b.id().to_string(),
                    });
                }
            }
        }

        let mut kept = Vec::with_capacity(instincts.len());
        let mut overrides = Vec::new();
        for (instinct, mark) in instincts.into_iter().zip(removed_by) {
            match mark {
                Some(o) => overrides.push(o),
                None => kept.push(instinct),
            }
        }

        Resolution { kept, overrides }
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

fn overrides_any(rules: &RuleSet, a: &ScoredInstinct, b: &ScoredInstinct) -> bool {
    rules.enabled().any(|r| r.overrides(a, b))
}

/// Tie-break for mutual conflicts: higher confidence, then smaller id.
fn wins(a: &ScoredInstinct, b: &ScoredInstinct) -> bool {
    a.confidence > b.confidence || (a.confidence == b.confidence && a.id() < b.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{ConflictRule, OverriddenPattern, OverriderPattern};
    use tessera_core::instinct::Instinct;

    fn scored(id: &str, domain: &str, action: &str, confidence: f64) -> ScoredInstinct {
        let mut inst = Instinct::new("always", action, domain, confidence);
        inst.id = id.into();
        ScoredInstinct::new(inst, confidence)
    }

    fn ids(set: &[ScoredInstinct]) -> Vec<&str> {
        set.iter().map(|s| s.id()).collect()
    }

    #[test]
    fn urgent_timing_overrides_detailed_explanations() {
        let resolver = ConflictResolver::default();
        let out = resolver.resolve(vec![
            scored("t", "timing", "urgent: respond quickly", 0.8),
            scored("c", "communication", "detailed explanations", 0.7),
        ]);
        assert_eq!(ids(&out), vec!["t"]);
    }

    #[test]
    fn low_confidence_urgency_does_not_override() {
        let resolver = ConflictResolver::default();
        let out = resolver.resolve(vec![
            scored("t", "timing", "urgent: respond quickly", 0.4),
            scored("c", "communication", "detailed explanations", 0.7),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn unrelated_instincts_both_survive() {
        let resolver = ConflictResolver::default();
        let out = resolver.resolve(vec![
            scored("a", "coding", "prefer rust examples", 0.9),
            scored("b", "timing", "send summaries in the morning", 0.6),
        ]);
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn frustration_overrides_brevity() {
        let resolver = ConflictResolver::default();
        let out = resolver.resolve(vec![
            scored("brief", "communication", "keep responses short", 0.9),
            scored("mood", "emotional", "user is frustrated with the build", 0.5),
        ]);
        assert_eq!(ids(&out), vec!["mood"]);
    }

    #[test]
    fn no_cascading_within_one_pass() {
        // concise removes verbose; frustration removes concise ("brief").
        // Both marks are computed against the original set.
        let resolver = ConflictResolver::default();
        let out = resolver.resolve_with_report(vec![
            scored("concise", "communication", "be brief", 0.8),
            scored("verbose", "communication", "verbose walkthroughs", 0.6),
            scored("mood", "emotional", "frustrated user", 0.5),
        ]);
        assert_eq!(ids(&out.kept), vec!["mood"]);
        assert_eq!(out.overrides.len(), 2);
    }

    #[test]
    fn mutual_override_keeps_the_stronger_instinct() {
        let rules = RuleSet {
            rules: vec![
                ConflictRule {
                    name: "formal-over-casual".into(),
                    description: String::new(),
                    overrider: OverriderPattern {
                        domain: None,
                        keywords: vec!["formal".into()],
                    },
                    overridden: OverriddenPattern {
                        domains: vec![],
                        keywords: vec!["casual".into()],
                    },
                    min_overrider_confidence: 0.0,
                    enabled: true,
                },
                ConflictRule {
                    name: "casual-over-formal".into(),
                    description: String::new(),
                    overrider: OverriderPattern {
                        domain: None,
                        keywords: vec!["casual".into()],
                    },
                    overridden: OverriddenPattern {
                        domains: vec![],
                        keywords: vec!["formal".into()],
                    },
                    min_overrider_confidence: 0.0,
                    enabled: true,
                },
            ],
        };
        let resolver = ConflictResolver::new(rules).unwrap();

        let out = resolver.resolve(vec![
            scored("f", "tone", "formal tone", 0.4),
            scored("c", "tone", "casual tone", 0.7),
        ]);
        assert_eq!(ids(&out), vec!["c"]);

        // Equal confidence: smaller id wins.
        let out = resolver.resolve(vec![
            scored("b", "tone", "formal tone", 0.5),
            scored("a", "tone", "casual tone", 0.5),
        ]);
        assert_eq!(ids(&out), vec!["a"]);
    }

    #[test]
    fn resolve_is_idempotent() {
        let resolver = ConflictResolver::default();
        let pool = [
            ("t1", "timing", "urgent: respond quickly", 0.8),
            ("t2", "timing", "asap replies", 0.5),
            ("c1", "communication", "detailed explanations", 0.7),
            ("c2", "communication", "be concise", 0.65),
            ("c3", "communication", "verbose, thorough answers", 0.9),
            ("c4", "communication", "keep responses short", 0.75),
            ("e1", "emotional", "frustrated by short answers", 0.55),
            ("x1", "coding", "prefer rust", 0.9),
        ];

        // Every subset of the pool.
        for mask in 0u32..(1 << pool.len()) {
            let set: Vec<ScoredInstinct> = pool
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, (id, d, a, c))| scored(id, d, a, *c))
                .collect();

            let once = resolver.resolve(set);
            let twice = resolver.resolve(once.clone());
            assert_eq!(ids(&once), ids(&twice), "not idempotent for mask {mask:#b}");
        }
    }

    #[test]
    fn reload_swaps_rules() {
        let resolver = ConflictResolver::default();
        resolver.reload(RuleSet::new()).unwrap();
        let out = resolver.resolve(vec![
            scored("t", "timing", "urgent: respond quickly", 0.8),
            scored("c", "communication", "detailed explanations", 0.7),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(resolver.rules().active_count(), 0);
    }
}
