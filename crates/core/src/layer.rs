//! Prompt layers: named, independently-sourced slices of the final context.
//!
//! | Layer | Semantic order | Priority | Truncatable | Default cap |
//! |-------|---------------|----------|-------------|-------------|
//! | admin | 0 | 0 | no | 1000 |
//! | base_role | 1 | 1 | no | 1500 |
//! | user_customization | 2 | 3 | yes | 1000 |
//! | channel_formatting | 3 | 2 | no | 500 |
//! | skill_index | 4 | 6 | yes | 1500 |
//! | instinct_digest | 5 | 4 | yes | 800 |
//! | emotional_guidance | 6 | 5 | yes | 200 |
//!
//! Lower priority numbers are more important. The budget allocator cuts the
//! truncatable layer with the largest priority number first.

use serde::{Deserialize, Serialize};

use crate::error::LayerError;
use crate::thread::ThreadId;

/// The seven knowledge domains that make up a composed prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Admin,
    BaseRole,
    UserCustomization,
    ChannelFormatting,
    SkillIndex,
    InstinctDigest,
    EmotionalGuidance,
}

impl LayerKind {
    /// Every layer kind, in semantic (composition) order.
    pub const ALL: [LayerKind; 7] = [
        LayerKind::Admin,
        LayerKind::BaseRole,
        LayerKind::UserCustomization,
        LayerKind::ChannelFormatting,
        LayerKind::SkillIndex,
        LayerKind::InstinctDigest,
        LayerKind::EmotionalGuidance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Admin => "admin",
            LayerKind::BaseRole => "base_role",
            LayerKind::UserCustomization => "user_customization",
            LayerKind::ChannelFormatting => "channel_formatting",
            LayerKind::SkillIndex => "skill_index",
            LayerKind::InstinctDigest => "instinct_digest",
            LayerKind::EmotionalGuidance => "emotional_guidance",
        }
    }

    /// Position in the composed prompt.
    pub fn semantic_order(self) -> usize {
        match self {
            LayerKind::Admin => 0,
            LayerKind::BaseRole => 1,
            LayerKind::UserCustomization => 2,
            LayerKind::ChannelFormatting => 3,
            LayerKind::SkillIndex => 4,
            LayerKind::InstinctDigest => 5,
            LayerKind::EmotionalGuidance => 6,
        }
    }

    /// Built-in budget policy for this kind.
    pub fn default_policy(self) -> LayerPolicy {
        let (priority, truncatable, token_cap) = match self {
            LayerKind::Admin => (0, false, 1000),
            LayerKind::BaseRole => (1, false, 1500),
            LayerKind::ChannelFormatting => (2, false, 500),
            LayerKind::UserCustomization => (3, true, 1000),
            LayerKind::InstinctDigest => (4, true, 800),
            LayerKind::EmotionalGuidance => (5, true, 200),
            LayerKind::SkillIndex => (6, true, 1500),
        };
        LayerPolicy {
            priority,
            truncatable,
            token_cap,
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown layer kind '{s}'"))
    }
}

/// Budget policy for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPolicy {
    /// Rank; lower = more important.
    pub priority: u32,
    /// Whether global budget enforcement may cut this layer.
    pub truncatable: bool,
    /// Per-layer token cap.
    pub token_cap: usize,
}

/// One rendered slice of context, ready for budget allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptLayer {
    pub kind: LayerKind,
    pub text: String,
    pub priority: u32,
    pub token_cap: usize,
    pub truncatable: bool,
}

impl PromptLayer {
    /// A layer using the kind's built-in policy.
    pub fn new(kind: LayerKind, text: impl Into<String>) -> Self {
        Self::with_policy(kind, text, kind.default_policy())
    }

    pub fn with_policy(kind: LayerKind, text: impl Into<String>, policy: LayerPolicy) -> Self {
        Self {
            kind,
            text: text.into(),
            priority: policy.priority,
            token_cap: policy.token_cap,
            truncatable: policy.truncatable,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// What a layer source knows about the request it renders for.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub thread_id: &'a ThreadId,
    pub channel: &'a str,
}

/// A producer of text for one layer. Implemented outside the core.
///
/// The returned text is treated as opaque, already-formatted content.
pub trait LayerSource: Send + Sync {
    fn render(&self, ctx: &RenderContext<'_>) -> std::result::Result<String, LayerError>;
}
