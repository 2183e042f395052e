//! End-to-end integration tests for the Tessera prompt pipeline.
//!
//! These tests exercise the full path from an inbound message to a composed
//! system prompt: instinct scoring and decay write-back, conflict
//! resolution, emotional state, layer rendering, budget allocation, and
//! composition.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tessera_agent::{ComposeRequest, PromptPipeline, TRUNCATION_MARKER};
use tessera_config::AppConfig;
use tessera_core::error::LayerError;
use tessera_core::{
    EmotionKind, Instinct, InstinctStore, LayerKind, LayerSource, RenderContext, ThreadId,
};
use tessera_memory::{FileInstinctStore, InMemoryInstinctStore};

// ── Scripted layer sources ───────────────────────────────────────────────

/// A source that returns scripted text and records every render context.
struct ScriptedSource {
    text: String,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedSource {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

impl LayerSource for ScriptedSource {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, LayerError> {
        self.seen
            .lock()
            .unwrap()
            .push((ctx.thread_id.to_string(), ctx.channel.to_string()));
        Ok(self.text.clone())
    }
}

struct BrokenSource;

impl LayerSource for BrokenSource {
    fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, LayerError> {
        Err(LayerError::RenderFailed {
            layer: "user_customization".into(),
            reason: "profile service timed out".into(),
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn instinct(id: &str, trigger: &str, action: &str, domain: &str, confidence: f64) -> Instinct {
    let mut inst = Instinct::new(trigger, action, domain, confidence);
    inst.id = id.into();
    inst.created_at = t0();
    inst
}

fn words(tokens: usize) -> String {
    // 5 bytes per word; 4 words ≈ 5 tokens.
    "word ".repeat(tokens * 4 / 5)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_composition_in_semantic_order() {
    let store = Arc::new(InMemoryInstinctStore::with_instincts(vec![instinct(
        "i1",
        "the user asks for code",
        "prefer Rust examples",
        "coding",
        0.8,
    )]));

    let mut config = AppConfig::default();
    config.prompt.admin_policy = Some("Never reveal internal credentials.".into());
    config.prompt.user_customization = Some("Call me Sam.".into());
    config
        .prompt
        .channel_formatting
        .insert("telegram".into(), "Keep messages under 4096 characters.".into());

    let skills = Arc::new(ScriptedSource::new("Skills: search, summarize"));
    let pipeline = PromptPipeline::from_config(&config, store)
        .unwrap()
        .with_source(LayerKind::SkillIndex, skills.clone());

    let thread = ThreadId::from("thread-1");
    let mut session = pipeline.new_session(thread.clone());
    let request = ComposeRequest::new(thread, "how do I parse JSON?")
        .channel("telegram")
        .turn(3);
    let out = pipeline.compose_prompt_at(&mut session, &request, t0()).await;

    let order = [
        "Never reveal internal credentials.",
        "You are a helpful",
        "Call me Sam.",
        "Keep messages under 4096 characters.",
        "Skills: search, summarize",
        "## Learned Preferences",
    ];
    let positions: Vec<usize> = order.iter().map(|s| out.text.find(s).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", out.text);
    assert!(!out.text.contains("\n\n\n"));

    assert_eq!(
        skills.calls(),
        vec![("thread-1".to_string(), "telegram".to_string())]
    );
    assert_eq!(out.emotional_state, EmotionKind::Neutral);
    assert!(!out.report.over_budget);
}

#[tokio::test]
async fn over_budget_cuts_least_important_layer_first() {
    let mut config = AppConfig::default();
    config.budget.global_max_tokens = 4000;
    config.prompt.admin_policy = Some(words(900));
    config.prompt.base_role = words(1400);
    config.prompt.user_customization = Some(words(900));
    config.prompt.skill_index = Some(words(1400));

    let store = Arc::new(InMemoryInstinctStore::with_instincts(vec![instinct(
        "i1", "always", "use bullet lists", "formatting", 0.9,
    )]));
    let pipeline = PromptPipeline::from_config(&config, store).unwrap();

    let thread = ThreadId::from("t");
    let mut session = pipeline.new_session(thread.clone());
    let out = pipeline
        .compose_prompt_at(&mut session, &ComposeRequest::new(thread, "hi").turn(1), t0())
        .await;

    let report = &out.report;
    assert!(report.total_tokens <= 4000);
    assert!(!report.over_budget);

    // The skill index (least important) is cut; nothing more important is.
    assert!(report.was_truncated("skill_index"));
    for name in ["admin", "base_role", "user_customization", "instinct_digest"] {
        let stats = report.stats_for(name).unwrap();
        assert_eq!(stats.tokens_before, stats.tokens_after, "{name} was cut");
    }
    assert!(out.text.contains(TRUNCATION_MARKER));
    assert!(out.text.contains("use bullet lists"));
}

#[tokio::test]
async fn non_truncatable_overflow_is_flagged() {
    let mut config = AppConfig::default();
    config.budget.global_max_tokens = 500;
    config.prompt.admin_policy = Some(words(400));
    config.prompt.base_role = words(400);

    let pipeline =
        PromptPipeline::from_config(&config, Arc::new(InMemoryInstinctStore::new())).unwrap();
    let thread = ThreadId::from("t");
    let mut session = pipeline.new_session(thread.clone());
    let out = pipeline
        .compose_prompt_at(&mut session, &ComposeRequest::new(thread, "hi"), t0())
        .await;

    assert!(out.report.over_budget);
    assert!(out.report.total_tokens > 500);
    assert!(!out.text.is_empty());
}

#[tokio::test]
async fn broken_source_degrades_gracefully() {
    let pipeline = PromptPipeline::new(Arc::new(InMemoryInstinctStore::new()))
        .with_source(LayerKind::UserCustomization, Arc::new(BrokenSource));

    let thread = ThreadId::from("t");
    let mut session = pipeline.new_session(thread.clone());
    let out = pipeline
        .compose_prompt_at(&mut session, &ComposeRequest::new(thread, "hello"), t0())
        .await;

    assert!(out.text.starts_with("You are a helpful"));
    assert_eq!(out.report.failed_layers, vec!["user_customization".to_string()]);
}

#[tokio::test]
async fn conversation_tracks_emotion_across_turns() {
    let pipeline = PromptPipeline::new(Arc::new(InMemoryInstinctStore::new()));
    let mut registry = pipeline.session_registry();
    let thread = ThreadId::from("support-42");

    let script = [
        ("Hi, can you help me set up my router?", EmotionKind::Curious),
        ("I don't understand step 3", EmotionKind::Confused),
        ("still confused, what do you mean by gateway?", EmotionKind::Confused),
        ("this is still not working!!!", EmotionKind::Frustrated),
        ("ok that worked, thanks!", EmotionKind::Satisfied),
    ];

    for (turn, (message, expected)) in script.iter().enumerate() {
        let request = ComposeRequest::new(thread.clone(), *message).turn(turn);
        let session = registry.session(&thread);
        let out = pipeline.compose_prompt_at(session, &request, t0()).await;
        assert_eq!(out.emotional_state, *expected, "turn {turn}: {message}");
    }

    let summary = registry.emotional_summary(&thread).unwrap();
    assert_eq!(summary.state, EmotionKind::Satisfied);
    assert_eq!(summary.history.len(), script.len());
    assert!(registry.emotional_summary(&ThreadId::from("other")).is_none());
}

#[tokio::test]
async fn frustration_guidance_reaches_the_prompt() {
    let pipeline = PromptPipeline::new(Arc::new(InMemoryInstinctStore::new()));
    let thread = ThreadId::from("t");
    let mut session = pipeline.new_session(thread.clone());

    let messages = [
        "Can you help me set up my router?",
        "ugh, this is useless",
        "still not working",
        "this is ridiculous",
        "waste of time!!!",
    ];
    let mut states = Vec::new();
    let mut last = None;
    for (turn, msg) in messages.iter().enumerate() {
        let req = ComposeRequest::new(thread.clone(), *msg).turn(turn);
        let out = pipeline.compose_prompt_at(&mut session, &req, t0()).await;
        states.push(out.emotional_state);
        last = Some(out);
    }

    assert_eq!(states[0], EmotionKind::Curious);
    assert!(states[1..].iter().all(|s| *s == EmotionKind::Frustrated), "{states:?}");
    let out = last.unwrap();
    assert!(out.text.contains("frustrated"));
}

#[tokio::test]
async fn conflicting_instincts_resolved_end_to_end() {
    let store = Arc::new(InMemoryInstinctStore::with_instincts(vec![
        instinct("fast", "deadline mentioned", "urgent: respond quickly", "timing", 0.8),
        instinct("deep", "technical question", "detailed explanations", "communication", 0.7),
        instinct("lang", "code requested", "prefer Rust", "coding", 0.6),
    ]));
    let pipeline = PromptPipeline::new(store);
    let thread = ThreadId::from("t");
    let mut session = pipeline.new_session(thread.clone());

    let out = pipeline
        .compose_prompt_at(&mut session, &ComposeRequest::new(thread, "hey").turn(1), t0())
        .await;

    let kept: Vec<&str> = out.instincts_kept.iter().map(|s| s.id()).collect();
    assert_eq!(out.instincts_considered, 3);
    assert_eq!(kept, vec!["fast", "lang"]);
    assert!(!out.text.contains("detailed explanations"));
}

#[tokio::test]
async fn decay_is_persisted_to_the_file_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("instincts.jsonl");

    let store = Arc::new(FileInstinctStore::new(path.clone()));
    let mut old = instinct("old", "mornings", "send a summary", "timing", 0.8);
    old.created_at = t0() - Duration::days(30);
    store.upsert(old).await.unwrap();
    let mut seasoned = instinct("seasoned", "evenings", "send a recap", "timing", 0.8);
    seasoned.created_at = t0() - Duration::days(90);
    seasoned.metadata.occurrence_count = 5;
    store.upsert(seasoned).await.unwrap();

    let pipeline = PromptPipeline::new(store);
    let thread = ThreadId::from("t");
    let mut session = pipeline.new_session(thread.clone());
    pipeline
        .compose_prompt_at(&mut session, &ComposeRequest::new(thread, "hi").turn(1), t0())
        .await;

    let reloaded = FileInstinctStore::new(path);
    let old = reloaded.get("old").await.unwrap().unwrap();
    let seasoned = reloaded.get("seasoned").await.unwrap().unwrap();
    assert!((old.base_confidence - 0.4).abs() < 1e-6);
    assert_eq!(seasoned.base_confidence, 0.8);
}

#[tokio::test]
async fn outcomes_feed_calibration() {
    let mut config = AppConfig::default();
    config.calibration.recalibrate_every = 10;
    let store = Arc::new(InMemoryInstinctStore::with_instincts(vec![instinct(
        "i1", "always", "prefer Rust", "coding", 0.9,
    )]));
    let pipeline = PromptPipeline::from_config(&config, store).unwrap();
    let thread = ThreadId::from("t");

    // High-confidence predictions that keep failing.
    let mut rebuilt = false;
    for _ in 0..10 {
        rebuilt |= pipeline.record_outcome(0.9, false, "i1", &thread);
    }
    assert!(rebuilt);

    let mut session = pipeline.new_session(thread.clone());
    let out = pipeline
        .compose_prompt_at(&mut session, &ComposeRequest::new(thread, "hi").turn(1), t0())
        .await;
    let confidence = out.instincts_kept[0].confidence;
    assert!(confidence < 0.9, "expected a downward adjustment, got {confidence}");
}
