//! Built-in layer sources backed by configuration text.
//!
//! Deployments with dynamic sources (a skill registry, a per-user profile
//! service) implement [`LayerSource`] themselves and register it on the
//! pipeline.

use std::collections::BTreeMap;
use tessera_core::error::LayerError;
use tessera_core::layer::{LayerSource, RenderContext};

/// Fixed text, identical for every request.
#[derive(Debug, Clone, Default)]
pub struct StaticLayerSource {
    text: String,
}

impl StaticLayerSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl LayerSource for StaticLayerSource {
    fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, LayerError> {
        Ok(self.text.clone())
    }
}

/// Formatting rules selected by the request's channel.
///
/// A `default` entry applies to channels without their own rules. Unknown
/// channels with no default render nothing.
#[derive(Debug, Clone, Default)]
pub struct ChannelFormattingSource {
    rules: BTreeMap<String, String>,
}

impl ChannelFormattingSource {
    pub const FALLBACK_KEY: &'static str = "default";

    pub fn new(rules: BTreeMap<String, String>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, channel: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.insert(channel.into(), text.into());
        self
    }
}

impl LayerSource for ChannelFormattingSource {
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, LayerError> {
        Ok(self
            .rules
            .get(ctx.channel)
            .or_else(|| self.rules.get(Self::FALLBACK_KEY))
            .cloned()
            .unwrap_or_default())
    }
}
