//! Error types for ordered collections.

use thiserror::Error;

/// Structural problems detected while building or checking an ordered collection.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The same id appears more than once
    #[error("Duplicate item id: {id}")]
    DuplicateItem { id: String },

    /// A position is NaN or infinite
    #[error("Item {id} has invalid position {position}")]
    InvalidPosition { id: String, position: f64 },

    /// An item is stored under a partition other than its container
    #[error("Item {id} is stored under the wrong container")]
    ContainerMismatch { id: String },

    /// Positions within a partition are not strictly increasing
    #[error("Item {id} is out of order: position {position} does not follow {previous}")]
    OutOfOrder {
        id: String,
        position: f64,
        previous: f64,
    },

    /// An id was expected in the collection but is absent
    #[error("Item not found: {id}")]
    ItemNotFound { id: String },
}

impl CollectionError {
    /// Check if this error indicates a missing item
    pub fn is_not_found(&self) -> bool {
        matches!(self, CollectionError::ItemNotFound { .. })
    }

    /// Check if this error is an ordering invariant violation
    pub fn is_ordering_error(&self) -> bool {
        matches!(
            self,
            CollectionError::OutOfOrder { .. } | CollectionError::InvalidPosition { .. }
        )
    }

    /// The offending item id
    pub fn item_id(&self) -> &str {
        match self {
            CollectionError::DuplicateItem { id }
            | CollectionError::InvalidPosition { id, .. }
            | CollectionError::ContainerMismatch { id }
            | CollectionError::OutOfOrder { id, .. }
            | CollectionError::ItemNotFound { id } => id,
        }
    }
}

// Conversion from CollectionError to the main Error type
impl From<CollectionError> for crate::Error {
    fn from(err: CollectionError) -> Self {
        crate::Error::Collection(err)
    }
}
