//! `tessera doctor`: diagnose configuration and store health.

use std::path::Path;
use tessera_config::AppConfig;
use tessera_instincts::{ConflictResolver, RuleSet};
use tessera_memory::FileInstinctStore;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Tessera Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    // Check config
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    if !path.exists() {
        println!("  ⚠️  No config file at {}, using defaults", path.display());
    }
    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. Fix the config and run again.");
            return Ok(());
        }
    };

    // Check rule table
    if config.conflict_rules.is_empty() {
        println!("  ✅ Using {} built-in conflict rules", RuleSet::defaults().active_count());
    } else {
        match RuleSet::from_config(&config.conflict_rules).and_then(ConflictResolver::new) {
            Ok(resolver) => println!(
                "  ✅ {} conflict rules valid",
                resolver.rules().active_count()
            ),
            Err(e) => {
                println!("  ❌ Conflict rules invalid: {e}");
                issues += 1;
            }
        }
    }

    // Check instinct store
    let store_path = config.instinct_store_path();
    if store_path.exists() {
        let store = FileInstinctStore::new(store_path.clone());
        let skipped = store.skipped_lines();
        if skipped == 0 {
            println!("  ✅ Instinct store readable ({} instincts)", store.len().await);
        } else {
            println!(
                "  ⚠️  Instinct store has {skipped} unreadable line(s); they will be dropped on next write"
            );
            issues += 1;
        }
    } else {
        println!(
            "  ⚠️  No instinct store at {}; prompts will carry no learned preferences",
            store_path.display()
        );
    }

    // Check layers
    if config.prompt.base_role.trim().is_empty() {
        println!("  ⚠️  Base role is empty");
        issues += 1;
    } else {
        println!("  ✅ Base role configured");
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
