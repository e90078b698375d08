//! Error taxonomy surfaced by construction, import, and forward evaluation.
//!
//! Each variant marks a distinct failure class so callers can tell a bad
//! config from a bad checkpoint from a violated structural invariant. None of
//! these are retried internally; they always abort the operation that raised
//! them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Rejected before any construction work: unknown depth variant,
    /// non-positive width factor or class count.
    #[error("invalid model configuration: {0}")]
    Config(String),

    /// An assembled shape disagrees with the architecture contract, e.g. a
    /// residual branch and its shortcut, or a non-1x1 post-pool head.
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// A required tensor is absent from the weight store. Fatal: partial
    /// population would silently leave stale parameters behind.
    #[error("checkpoint key '{0}' not found in weight store")]
    CheckpointKey(String),

    /// Axis conversion was attempted on a tensor that is neither rank-4 nor
    /// a vector.
    #[error("layout conversion unsupported for rank-{rank} tensor '{name}'")]
    Layout { name: String, rank: usize },
}

impl ModelError {
    pub fn config(message: impl Into<String>) -> Self {
        ModelError::Config(message.into())
    }

    pub fn structural(message: impl Into<String>) -> Self {
        ModelError::StructuralMismatch(message.into())
    }
}
