//! Instinct store implementations for Tessera.

pub mod file_backend;
pub mod in_memory;
mod records;

pub use file_backend::FileInstinctStore;
pub use in_memory::InMemoryInstinctStore;
