//! `tessera rules`: show the active conflict rule table.

use std::path::Path;
use tessera_instincts::RuleSet;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let (rules, source) = if config.conflict_rules.is_empty() {
        (RuleSet::defaults(), "built-in")
    } else {
        (RuleSet::from_config(&config.conflict_rules)?, "config.toml")
    };

    println!(
        "Conflict rules ({} active, {source}):\n",
        rules.active_count()
    );
    for (i, r) in rules.rules.iter().enumerate() {
        let status = if r.enabled { "ON " } else { "OFF" };
        println!(
            "  {}. [{}] {} (min confidence: {:.2})",
            i + 1,
            status,
            r.name,
            r.min_overrider_confidence
        );
        if !r.description.is_empty() {
            println!("     {}", r.description);
        }
        let domain = r.overrider.domain.as_deref().unwrap_or("any");
        println!(
            "     overrider: domain {domain}, keywords [{}]",
            r.overrider.keywords.join(", ")
        );
        println!(
            "     overridden: domains [{}], keywords [{}]",
            r.overridden.domains.join(", "),
            r.overridden.keywords.join(", ")
        );
    }
    Ok(())
}
