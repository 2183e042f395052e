//! Layered prompt assembly.
//!
//! # Layers (in semantic order)
//!
//! | Layer | Default priority | Truncatable | Cap |
//! |-------|------------------|-------------|-----|
//! | 1. Admin policy | 0 | no | 1000 |
//! | 2. Base role | 1 | no | 1500 |
//! | 3. User customization | 3 | yes | 1000 |
//! | 4. Channel formatting | 2 | no | 500 |
//! | 5. Skill index | 6 | yes | 1500 |
//! | 6. Instinct digest | 4 | yes | 800 |
//! | 7. Emotional guidance | 5 | yes | 200 |
//!
//! Lower priority numbers are more important. The budget allocator cuts the
//! largest numbers first; the composer always emits semantic order.

pub mod budget;
pub mod composer;
pub mod token;

pub use budget::{
    Allocation, AllocationReport, BudgetAllocator, LayerStats, TRUNCATION_MARKER, TruncationInfo,
    TruncationReason,
};
pub use composer::PromptComposer;
