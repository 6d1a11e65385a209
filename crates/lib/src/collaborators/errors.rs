//! Error types reported by persistence collaborators.

use thiserror::Error;

/// Errors a persistence collaborator can reject a call with.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The item does not exist on the remote side.
    #[error("Item not found: {id}")]
    NotFound {
        /// The id that was looked up
        id: String,
    },

    /// The remote side refused the write (validation, permissions).
    #[error("Write rejected: {reason}")]
    Rejected {
        /// Reason given by the remote side
        reason: String,
    },

    /// A position that cannot be stored.
    #[error("Invalid position {position} for item {id}")]
    InvalidPosition {
        /// The item being moved
        id: String,
        /// The offending position
        position: f64,
    },

    /// The remote side could not be reached, including timeouts.
    #[error("Store unavailable: {reason}")]
    Unavailable {
        /// Transport level description
        reason: String,
    },
}

impl StoreError {
    /// Check if this error indicates a missing item.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Check if the remote side actively refused the call.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::Rejected { .. } | StoreError::InvalidPosition { .. }
        )
    }

    /// Check if this error is a transport failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

// Conversion from StoreError to the main Error type
impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
