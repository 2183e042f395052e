//! # Tessera Core
//!
//! Domain types, collaborator traits, and error definitions for the Tessera
//! context composer. This crate has **no algorithmic code**; it defines the
//! domain model the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here (instinct store, layer
//! source, outcome recorder). Implementations live in their respective
//! crates, so:
//! - stores can be swapped via configuration
//! - tests use in-memory or scripted stand-ins
//! - all crates depend inward on core

pub mod emotion;
pub mod error;
pub mod instinct;
pub mod layer;
pub mod thread;

// Re-export key types at crate root for ergonomics
pub use emotion::{EmotionKind, EmotionSample, EmotionalSummary};
pub use error::{LayerError, StoreError};
pub use instinct::{
    Instinct, InstinctMetadata, InstinctStatus, InstinctStore, OutcomeRecorder, ScoredInstinct,
    clamp_confidence,
};
pub use layer::{LayerKind, LayerPolicy, LayerSource, PromptLayer, RenderContext};
pub use thread::ThreadId;
