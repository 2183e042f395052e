//! `tessera instincts`: list stored instincts with their live confidence.

use chrono::Utc;
use std::path::Path;
use tessera_core::{InstinctStore, ThreadId};
use tessera_instincts::{CalibrationParams, Calibrator, ConfidenceEngine, ConfidenceParams};
use tessera_memory::FileInstinctStore;

pub async fn run(
    config_path: Option<&Path>,
    thread: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = FileInstinctStore::new(config.instinct_store_path());
    let engine = ConfidenceEngine::new(ConfidenceParams::from(&config.instincts));
    // A fresh process has no recorded outcomes, so calibration is neutral.
    let table = Calibrator::new(CalibrationParams::from(&config.calibration)).snapshot();

    let instincts = store.list_active_instincts(&ThreadId::from(thread.as_str())).await?;
    if instincts.is_empty() {
        println!("No active instincts in {}", store.path().display());
        return Ok(());
    }

    let now = Utc::now();
    println!("Active instincts ({}):\n", instincts.len());
    println!("  {:<10} {:>6} {:>6} {:>6}  rule", "domain", "stored", "eff", "cal");
    for inst in &instincts {
        let decay = engine.decayed_confidence(inst, now);
        let effective = engine.transient_confidence(inst, decay.confidence, now);
        let calibrated = table.calibrate(effective);
        println!(
            "  {:<10} {:>6.2} {:>6.2} {:>6.2}  When {}: {}{}",
            inst.domain,
            inst.base_confidence,
            effective,
            calibrated,
            inst.trigger,
            inst.action,
            if decay.exempt { " (decay exempt)" } else { "" }
        );
    }
    Ok(())
}
