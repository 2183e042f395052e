//! Token budget allocation across prompt layers.
//!
//! Two steps, both deterministic:
//!
//! 1. **Per-layer cap.** Any layer over its own `token_cap` is cut to fit.
//! 2. **Global cap.** While the total exceeds the global budget, the least
//!    important truncatable layer that still has content (largest priority
//!    number, later layer on ties) is shrunk by the overflow or emptied.
//!
//! Cut layers end with [`TRUNCATION_MARKER`] on its own line. Layers marked
//! non-truncatable are never touched by step 2, so the result can still be
//! over budget; the report says so.

use crate::context::token;
use serde::{Deserialize, Serialize};
use tessera_core::layer::PromptLayer;
use tracing::{debug, warn};

/// Appended on its own line to every truncated layer.
pub const TRUNCATION_MARKER: &str = "[...truncated for prompt budget]";

// ── Types ─────────────────────────────────────────────────────────────────

/// Statistics for a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStats {
    /// Layer name.
    pub name: String,
    /// Tokens before any truncation.
    pub tokens_before: usize,
    /// Tokens after allocation.
    pub tokens_after: usize,
    pub truncated: bool,
}

/// Why a layer was cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    PerLayerCap,
    GlobalBudget,
}

impl std::fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerLayerCap => f.write_str("per-layer cap"),
            Self::GlobalBudget => f.write_str("global budget"),
        }
    }
}

/// One truncation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncationInfo {
    pub layer: String,
    pub tokens_removed: usize,
    pub reason: TruncationReason,
}

/// Detailed report of an allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    /// Per-layer statistics, in input order.
    pub layers: Vec<LayerStats>,
    /// Truncation events, in the order they happened.
    pub truncations: Vec<TruncationInfo>,
    /// Total tokens after allocation.
    pub total_tokens: usize,
    /// Configured global budget.
    pub budget: usize,
    /// True iff `total_tokens` still exceeds `budget`.
    pub over_budget: bool,
    /// Layers whose source failed to render (filled in by the pipeline).
    #[serde(default)]
    pub failed_layers: Vec<String>,
}

impl AllocationReport {
    pub fn stats_for(&self, name: &str) -> Option<&LayerStats> {
        self.layers.iter().find(|s| s.name == name)
    }

    pub fn was_truncated(&self, name: &str) -> bool {
        self.stats_for(name).is_some_and(|s| s.truncated)
    }
}

/// Layers after allocation plus the report.
#[derive(Debug, Clone)]
pub struct Allocation {
    /// Same order as the input.
    pub layers: Vec<PromptLayer>,
    pub report: AllocationReport,
}

// ── Allocator ─────────────────────────────────────────────────────────────

/// The budget allocator. Stateless apart from the budget; reuse freely.
#[derive(Debug, Clone, Copy)]
pub struct BudgetAllocator {
    global_max_tokens: usize,
}

impl BudgetAllocator {
    pub fn new(global_max_tokens: usize) -> Self {
        Self { global_max_tokens }
    }

    pub fn global_max_tokens(&self) -> usize {
        self.global_max_tokens
    }

    /// Fit `layers` into the budget.
    pub fn allocate(&self, mut layers: Vec<PromptLayer>) -> Allocation {
        let before: Vec<usize> = layers.iter().map(|l| token::estimate_tokens(&l.text)).collect();
        let mut truncated = vec![false; layers.len()];
        let mut truncations = Vec::new();

        // ── Step 1: per-layer caps ─────────────────────────────────────────
        for (i, layer) in layers.iter_mut().enumerate() {
            let tokens = token::estimate_tokens(&layer.text);
            if tokens <= layer.token_cap {
                continue;
            }
            layer.text = cut_to(&layer.text, layer.token_cap);
            truncated[i] = true;
            let removed = tokens - token::estimate_tokens(&layer.text);
            debug!(layer = %layer.name(), removed, "Layer cut to its cap");
            truncations.push(TruncationInfo {
                layer: layer.name().into(),
                tokens_removed: removed,
                reason: TruncationReason::PerLayerCap,
            });
        }

        // ── Step 2: global budget ──────────────────────────────────────────
        let mut total = total_tokens(&layers);
        while total > self.global_max_tokens {
            let Some(victim) = least_important_truncatable(&layers) else {
                break;
            };
            let layer = &mut layers[victim];
            let tokens = token::estimate_tokens(&layer.text);
            let overflow = total - self.global_max_tokens;

            layer.text = cut_to(&layer.text, tokens.saturating_sub(overflow));
            truncated[victim] = true;
            let removed = tokens - token::estimate_tokens(&layer.text);
            debug!(layer = %layer.name(), removed, overflow, "Layer cut for global budget");
            truncations.push(TruncationInfo {
                layer: layer.name().into(),
                tokens_removed: removed,
                reason: TruncationReason::GlobalBudget,
            });
            total -= removed;
        }

        let over_budget = total > self.global_max_tokens;
        if over_budget {
            warn!(
                total,
                budget = self.global_max_tokens,
                "Prompt still over budget; remaining layers are not truncatable"
            );
        }

        let stats = layers
            .iter()
            .enumerate()
            .map(|(i, l)| LayerStats {
                name: l.name().into(),
                tokens_before: before[i],
                tokens_after: token::estimate_tokens(&l.text),
                truncated: truncated[i],
            })
            .collect();

        Allocation {
            layers,
            report: AllocationReport {
                layers: stats,
                truncations,
                total_tokens: total,
                budget: self.global_max_tokens,
                over_budget,
                failed_layers: Vec::new(),
            },
        }
    }
}

fn total_tokens(layers: &[PromptLayer]) -> usize {
    layers.iter().map(|l| token::estimate_tokens(&l.text)).sum()
}

/// Index of the truncatable, non-empty layer with the largest priority
/// number. Ties go to the later layer.
fn least_important_truncatable(layers: &[PromptLayer]) -> Option<usize> {
    layers
        .iter()
        .enumerate()
        .filter(|(_, l)| l.truncatable && !l.text.is_empty())
        .max_by_key(|(i, l)| (l.priority, *i))
        .map(|(i, _)| i)
}

/// Cut `text` so that it plus the marker line fits in `max_tokens`.
///
/// Returns an empty string when not even one byte of content fits next to
/// the marker. A marker left by an earlier cut is stripped first.
fn cut_to(text: &str, max_tokens: usize) -> String {
    let body = text
        .strip_suffix(TRUNCATION_MARKER)
        .map(|t| t.strip_suffix('\n').unwrap_or(t))
        .unwrap_or(text);

    let suffix_len = 1 + TRUNCATION_MARKER.len();
    let Some(room) = token::max_bytes_for(max_tokens).checked_sub(suffix_len) else {
        return String::new();
    };
    if room == 0 {
        return String::new();
    }

    let kept = token::prefix_within(body, room).trim_end();
    if kept.is_empty() {
        return String::new();
    }
    format!("{kept}\n{TRUNCATION_MARKER}")
}
