//!
//! Orderly: ordered collections with fractional positions and optimistic,
//! rollback-safe synchronization.
//!
//! Two kinds of drag-and-drop surface share this engine: a kanban board (tasks
//! in ordered status columns) and a page tree (pages ordered among siblings,
//! nested under parent pages). Both keep a client-visible total order over a
//! collection that is reordered locally and persisted asynchronously.
//!
//! ## Core Concepts
//!
//! * **Items (`item::OrderedItem`)**: an id, a container key, a floating point
//!   position and an opaque domain payload.
//! * **Collections (`collection::OrderedCollection`)**: items partitioned by
//!   container key, each partition sorted by position.
//! * **Positions (`position`)**: midpoint allocation, so inserting between two
//!   siblings never renumbers the others.
//! * **Move resolution (`resolver`)**: turns a drop target into the next
//!   collection and the one `(container, position)` pair to persist, rejecting
//!   tree cycles.
//! * **Pipeline (`pipeline::Pipeline`)**: applies each mutation optimistically,
//!   calls the persistence collaborator, then reconciles or rolls back only
//!   the items that mutation owns.
//! * **Reconciliation (`reconcile`)**: swaps a placeholder for the authoritative
//!   record and notifies dependent read models.
//!
//! The `board`, `tree` and `calendar` modules instantiate the engine for the
//! concrete surfaces.

pub mod board;
pub mod calendar;
pub mod clock;
pub mod collaborators;
pub mod collection;
pub mod config;
pub mod constants;
pub mod item;
pub mod pipeline;
pub mod position;
pub mod reconcile;
pub mod resolver;
pub mod tree;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "testing"))]
pub use clock::FixedClock;
pub use collection::OrderedCollection;
pub use config::EngineConfig;
pub use item::{ContainerKey, ItemId, ItemPatch, OrderedItem, Payload, Record};
pub use pipeline::{Intent, Outcome, Pipeline, Placement};
pub use resolver::{DropTarget, MoveOutcome};

/// Result type used throughout the Orderly library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Orderly library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structural errors from the collection module
    #[error(transparent)]
    Collection(collection::CollectionError),

    /// Mutation failures from the pipeline module
    #[error(transparent)]
    Pipeline(pipeline::PipelineError),

    /// Rejections from a persistence collaborator
    #[error(transparent)]
    Store(collaborators::StoreError),

    /// Invalid engine configuration
    #[error(transparent)]
    Config(config::ConfigError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Serialize(_) => "serialize",
            Error::Collection(_) => "collection",
            Error::Pipeline(_) => "pipeline",
            Error::Store(_) => "store",
            Error::Config(_) => "config",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Collection(collection_err) => collection_err.is_not_found(),
            Error::Pipeline(pipeline_err) => pipeline_err.is_not_found(),
            Error::Store(store_err) => store_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates permission was denied.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::Pipeline(pipeline_err) => pipeline_err.is_denied(),
            _ => false,
        }
    }

    /// Check if an optimistic change was undone.
    pub fn is_rolled_back(&self) -> bool {
        match self {
            Error::Pipeline(pipeline_err) => pipeline_err.is_rolled_back(),
            _ => false,
        }
    }

    /// Check if this error came from the remote side being unreachable.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_unavailable(),
            _ => false,
        }
    }

    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Pipeline(pipeline_err) => pipeline_err.user_message(),
            _ => "Something went wrong.".to_string(),
        }
    }
}
