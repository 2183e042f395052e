//! Error types for the Tessera domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// Failures reported by an [`InstinctStore`](crate::instinct::InstinctStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Instinct not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a [`LayerSource`](crate::layer::LayerSource).
#[derive(Debug, Clone, Error)]
pub enum LayerError {
    #[error("Layer source '{layer}' failed: {reason}")]
    RenderFailed { layer: String, reason: String },

    #[error("Layer source '{0}' is not available")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_displays_correctly() {
        let err = StoreError::NotFound("inst_42".into());
        assert!(err.to_string().contains("inst_42"));
        assert!(err.to_string().starts_with("Instinct not found"));
    }

    #[test]
    fn layer_error_displays_correctly() {
        let err = LayerError::RenderFailed {
            layer: "skill_index".into(),
            reason: "skills directory missing".into(),
        };
        assert!(err.to_string().contains("skill_index"));
        assert!(err.to_string().contains("skills directory missing"));
    }
}
