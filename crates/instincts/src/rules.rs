//! Conflict rule data model: declarative "A overrides B" statements.

use serde::{Deserialize, Serialize};
use tessera_config::ConflictRuleConfig;
use tessera_core::instinct::{Instinct, ScoredInstinct};

use crate::RuleError;

/// An ordered table of conflict rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<ConflictRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rule table.
    pub fn defaults() -> Self {
        Self {
            rules: vec![
                ConflictRule {
                    name: "urgency-over-detail".into(),
                    description: "Urgent instincts override detailed-explanation instincts".into(),
                    overrider: OverriderPattern {
                        domain: None,
                        keywords: words(&[
                            "urgent",
                            "asap",
                            "quickly",
                            "immediately",
                            "right away",
                        ]),
                    },
                    overridden: OverriddenPattern {
                        domains: vec![],
                        keywords: words(&["detailed", "verbose", "thorough", "in-depth"]),
                    },
                    min_overrider_confidence: 0.6,
                    enabled: true,
                },
                ConflictRule {
                    name: "concise-over-verbose".into(),
                    description: "Conciseness is the preferred communication style".into(),
                    overrider: OverriderPattern {
                        domain: Some("communication".into()),
                        keywords: words(&["concise", "brief", "short"]),
                    },
                    overridden: OverriddenPattern {
                        domains: vec![],
                        keywords: words(&["verbose", "lengthy", "long-form", "detailed"]),
                    },
                    min_overrider_confidence: 0.0,
                    enabled: true,
                },
                ConflictRule {
                    name: "frustration-over-brevity".into(),
                    description: "A frustrated user needs more than a terse reply".into(),
                    overrider: OverriderPattern {
                        domain: Some("emotional".into()),
                        keywords: words(&["frustrat"]),
                    },
                    overridden: OverriddenPattern {
                        domains: vec![],
                        keywords: words(&["brief", "keep responses short", "terse"]),
                    },
                    min_overrider_confidence: 0.0,
                    enabled: true,
                },
            ],
        }
    }

    /// Load rules from a TOML string (`[[rules]]` tables).
    pub fn from_toml(toml_str: &str) -> Result<Self, RuleError> {
        let set: RuleSet = toml::from_str(toml_str)?;
        set.validate()?;
        Ok(set)
    }

    /// Build a rule set from `[[conflict_rules]]` config entries.
    pub fn from_config(configs: &[ConflictRuleConfig]) -> Result<Self, RuleError> {
        let set = Self {
            rules: configs.iter().map(ConflictRule::from).collect(),
        };
        set.validate()?;
        Ok(set)
    }

    pub fn add(&mut self, rule: ConflictRule) {
        self.rules.push(rule);
    }

    /// Remove a rule by name. Returns `true` if found.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.name != name);
        self.rules.len() < before
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }

    /// Enabled rules in table order.
    pub fn enabled(&self) -> impl Iterator<Item = &ConflictRule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn active_count(&self) -> usize {
        self.enabled().count()
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// One override rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRule {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub overrider: OverriderPattern,

    pub overridden: OverriddenPattern,

    /// The overrider's confidence must reach this value.
    #[serde(default)]
    pub min_overrider_confidence: f64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Which instincts can override. Domain (if set) and a keyword must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverriderPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Which instincts get overridden. Any listed domain or any keyword matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverriddenPattern {
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ConflictRule {
    pub fn validate(&self) -> Result<(), RuleError> {
        let invalid = |reason: &str| RuleError::InvalidRule {
            name: if self.name.is_empty() {
                "(empty)".into()
            } else {
                self.name.clone()
            },
            reason: reason.into(),
        };

        if self.name.is_empty() {
            return Err(invalid("rule name cannot be empty"));
        }
        if self.overrider.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(invalid("overrider needs at least one keyword"));
        }
        if self.overridden.domains.is_empty() && self.overridden.keywords.is_empty() {
            return Err(invalid("overridden pattern needs a domain or keyword"));
        }
        if !(0.0..=1.0).contains(&self.min_overrider_confidence) {
            return Err(invalid("min_overrider_confidence must be within [0, 1]"));
        }
        Ok(())
    }

    pub fn matches_overrider(&self, instinct: &Instinct) -> bool {
        if let Some(domain) = &self.overrider.domain {
            if !instinct.domain.eq_ignore_ascii_case(domain) {
                return false;
            }
        }
        contains_any(&haystack(instinct), &self.overrider.keywords)
    }

    pub fn matches_overridden(&self, instinct: &Instinct) -> bool {
        self.overridden
            .domains
            .iter()
            .any(|d| instinct.domain.eq_ignore_ascii_case(d))
            || contains_any(&haystack(instinct), &self.overridden.keywords)
    }

    /// Whether `a` overrides `b` under this rule. An instinct never
    /// overrides itself.
    pub fn overrides(&self, a: &ScoredInstinct, b: &ScoredInstinct) -> bool {
        !std::ptr::eq(a, b)
            && a.confidence >= self.min_overrider_confidence
            && self.matches_overrider(&a.instinct)
            && self.matches_overridden(&b.instinct)
    }
}

impl From<&ConflictRuleConfig> for ConflictRule {
    fn from(cfg: &ConflictRuleConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            description: String::new(),
            overrider: OverriderPattern {
                domain: cfg.overrider_domain.clone(),
                keywords: cfg.overrider_keywords.clone(),
            },
            overridden: OverriddenPattern {
                domains: cfg.overridden_domains.clone(),
                keywords: cfg.overridden_keywords.clone(),
            },
            min_overrider_confidence: cfg.min_overrider_confidence,
            enabled: cfg.enabled,
        }
    }
}

fn haystack(instinct: &Instinct) -> String {
    format!("{} {}", instinct.trigger, instinct.action).to_lowercase()
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && haystack.contains(&k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(domain: &str, action: &str, confidence: f64) -> ScoredInstinct {
        ScoredInstinct::new(Instinct::new("always", action, domain, confidence), confidence)
    }

    #[test]
    fn default_rules_are_valid() {
        let set = RuleSet::defaults();
        assert!(set.validate().is_ok());
        assert_eq!(set.active_count(), 3);
    }

    #[test]
    fn urgency_rule_respects_threshold() {
        let rule = &RuleSet::defaults().rules[0];
        let detail = scored("communication", "detailed explanations", 0.7);

        assert!(rule.overrides(&scored("timing", "urgent: respond quickly", 0.8), &detail));
        assert!(!rule.overrides(&scored("timing", "urgent: respond quickly", 0.4), &detail));
    }

    #[test]
    fn overrider_domain_is_required_when_set() {
        let rule = &RuleSet::defaults().rules[1];
        let verbose = scored("communication", "give verbose answers", 0.5);

        assert!(rule.overrides(&scored("communication", "be concise", 0.5), &verbose));
        assert!(!rule.overrides(&scored("coding", "be concise", 0.5), &verbose));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rule = &RuleSet::defaults().rules[2];
        let frustrated = scored("Emotional", "User gets FRUSTRATED by one-liners", 0.3);
        let brief = scored("communication", "Keep responses short", 0.9);
        assert!(rule.overrides(&frustrated, &brief));
    }

    #[test]
    fn instinct_never_overrides_itself() {
        let rule = &RuleSet::defaults().rules[1];
        let both = scored("communication", "be concise, never verbose", 0.9);
        assert!(!rule.overrides(&both, &both));
    }

    #[test]
    fn parse_rules_from_toml() {
        let set = RuleSet::from_toml(
            r#"
[[rules]]
name = "safety-over-speed"
min_overrider_confidence = 0.5
[rules.overrider]
domain = "safety"
keywords = ["double-check"]
[rules.overridden]
domains = ["speed"]
"#,
        )
        .unwrap();
        assert_eq!(set.rules.len(), 1);
        assert!(set.rules[0].enabled);
        assert_eq!(set.rules[0].overrider.domain.as_deref(), Some("safety"));
    }

    #[test]
    fn rule_without_overrider_keywords_rejected() {
        let result = RuleSet::from_toml(
            r#"
[[rules]]
name = "broken"
[rules.overrider]
keywords = []
[rules.overridden]
keywords = ["x"]
"#,
        );
        assert!(matches!(result, Err(RuleError::InvalidRule { .. })));
    }

    #[test]
    fn rule_with_bad_threshold_rejected() {
        let mut rule = RuleSet::defaults().rules[0].clone();
        rule.min_overrider_confidence = 1.2;
        assert!(rule.validate().is_err());
    }

    #[test]
    fn from_config_converts_entries() {
        let cfg = ConflictRuleConfig {
            name: "custom".into(),
            overrider_domain: None,
            overrider_keywords: vec!["formal".into()],
            overridden_domains: vec!["tone".into()],
            overridden_keywords: vec![],
            min_overrider_confidence: 0.4,
            enabled: true,
        };
        let set = RuleSet::from_config(&[cfg]).unwrap();
        assert_eq!(set.rules[0].name, "custom");
        assert_eq!(set.rules[0].overridden.domains, vec!["tone".to_string()]);
    }
}
