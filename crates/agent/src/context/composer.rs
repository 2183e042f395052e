//! Final prompt assembly.
//!
//! Layers are joined in a fixed semantic order regardless of how they were
//! supplied. Empty layers contribute nothing, not even a blank separator.

use tessera_core::layer::PromptLayer;

const SEPARATOR: &str = "\n\n";

/// Joins allocated layers into the system prompt. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer;

impl PromptComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(&self, layers: &[PromptLayer]) -> String {
        let mut ordered: Vec<&PromptLayer> = layers.iter().collect();
        // Stable: duplicate kinds keep their input order.
        ordered.sort_by_key(|l| l.kind.semantic_order());

        ordered
            .into_iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}
