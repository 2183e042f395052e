//! The prompt pipeline, the heart of Tessera.
//!
//! For every inbound message the pipeline:
//!
//! 1. **Observes** the message to update the conversation's emotional state
//! 2. **Scores** the thread's active instincts (decay, relevance, calibration)
//! 3. **Resolves** contradictory instincts and renders the survivors
//! 4. **Renders** the static and channel-specific layers
//! 5. **Allocates** the token budget across all seven layers
//! 6. **Composes** the layers, in semantic order, into one system prompt
//!
//! No step is fatal: degraded inputs produce empty layers that are listed in
//! the allocation report.

pub mod context;
pub mod emotion;
pub mod pipeline;
pub mod session;
pub mod sources;

pub use context::{
    Allocation, AllocationReport, BudgetAllocator, LayerStats, PromptComposer, TRUNCATION_MARKER,
    TruncationInfo, TruncationReason,
};
pub use emotion::{EmotionParams, EmotionalStateTracker};
pub use pipeline::{ComposeRequest, ComposedPrompt, PromptPipeline};
pub use session::{ConversationSession, SessionRegistry};
pub use sources::{ChannelFormattingSource, StaticLayerSource};
