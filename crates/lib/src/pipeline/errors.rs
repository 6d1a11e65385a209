//! Error types for optimistic mutations.

use thiserror::Error;

use super::MutationKind;
use crate::item::ItemId;

/// Ways an optimistic mutation can fail.
///
/// Every variant has already been recovered from by the time it is returned:
/// a denied mutation never touched the view, a rolled back one has restored
/// it. What remains is telling the user, see [`PipelineError::user_message`].
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Access control refused the mutation before anything was applied.
    #[error("{kind} denied: {reason}")]
    Denied {
        /// What was attempted
        kind: MutationKind,
        /// Reason given by the access collaborator
        reason: String,
    },

    /// The remote write failed and the optimistic change was undone.
    #[error("{kind} of {item} rolled back")]
    RolledBack {
        /// What was attempted
        kind: MutationKind,
        /// The item as it was known locally
        item: ItemId,
        /// The collaborator's error
        #[source]
        source: Box<crate::Error>,
    },

    /// A debounced write failed. Local edits are kept.
    #[error("Saving {item} failed")]
    SaveFailed {
        /// The edited item
        item: ItemId,
        /// The collaborator's error
        #[source]
        source: Box<crate::Error>,
    },

    /// An edit referred to an item that is not in the view.
    #[error("Unknown item: {id}")]
    UnknownItem {
        /// The id that was not found
        id: ItemId,
    },
}

impl PipelineError {
    /// Check if access control refused the mutation.
    pub fn is_denied(&self) -> bool {
        matches!(self, PipelineError::Denied { .. })
    }

    /// Check if the mutation was applied and then undone.
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, PipelineError::RolledBack { .. })
    }

    /// Check if a debounced save failed.
    pub fn is_save_failure(&self) -> bool {
        matches!(self, PipelineError::SaveFailed { .. })
    }

    /// Check if the target item was missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            PipelineError::UnknownItem { .. } => true,
            PipelineError::RolledBack { source, .. } | PipelineError::SaveFailed { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }

    /// The item the failure is about, if any.
    pub fn item(&self) -> Option<&ItemId> {
        match self {
            PipelineError::RolledBack { item, .. }
            | PipelineError::SaveFailed { item, .. }
            | PipelineError::UnknownItem { id: item } => Some(item),
            PipelineError::Denied { .. } => None,
        }
    }

    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Denied { kind, .. } => {
                format!("You don't have permission to {} this item.", kind.verb())
            }
            PipelineError::RolledBack { kind, .. } => {
                format!("Could not {} the item. Your change was undone.", kind.verb())
            }
            PipelineError::SaveFailed { .. } => {
                "Could not save your changes. They are kept locally.".to_string()
            }
            PipelineError::UnknownItem { .. } => "This item no longer exists.".to_string(),
        }
    }
}

// Conversion from PipelineError to the main Error type
impl From<PipelineError> for crate::Error {
    fn from(err: PipelineError) -> Self {
        crate::Error::Pipeline(err)
    }
}
