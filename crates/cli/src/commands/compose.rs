//! `tessera compose`: compose the system prompt for one message.

use std::path::Path;
use std::sync::Arc;
use tessera_agent::{ComposeRequest, PromptPipeline};
use tessera_core::ThreadId;
use tessera_memory::FileInstinctStore;
use tracing::debug;

pub async fn run(
    config_path: Option<&Path>,
    message: String,
    thread: String,
    channel: String,
    turn: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = Arc::new(FileInstinctStore::new(config.instinct_store_path()));
    debug!(
        path = %store.path().display(),
        skipped = store.skipped_lines(),
        "Instinct store opened"
    );
    let pipeline = PromptPipeline::from_config(&config, store)?;

    let thread_id = ThreadId::from(thread.as_str());
    let mut session = pipeline.new_session(thread_id.clone());
    let request = ComposeRequest::new(thread_id, message)
        .channel(channel)
        .turn(turn);

    let composed = pipeline.compose_prompt(&mut session, &request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&composed)?);
        return Ok(());
    }

    println!("{}", composed.text);

    let report = &composed.report;
    eprintln!();
    eprintln!(
        "── {} / {} tokens · emotion: {} · instincts: {} of {}",
        report.total_tokens,
        report.budget,
        composed.emotional_state,
        composed.instincts_kept.len(),
        composed.instincts_considered
    );
    for t in &report.truncations {
        eprintln!("   truncated {} by {} tokens ({})", t.layer, t.tokens_removed, t.reason);
    }
    for layer in &report.failed_layers {
        eprintln!("   ⚠️  layer {layer} failed to render");
    }
    if report.over_budget {
        eprintln!("   ⚠️  still over budget: non-truncatable layers exceed the limit");
    }

    Ok(())
}
