//! Contracts for the services the engine depends on but does not implement.
//!
//! * [`Persistence`]: the remote authority that stores items and answers
//!   every write with the authoritative [`Record`].
//! * [`Loader`]: supplies the cold starting state of a view.
//! * [`AccessControl`]: consulted before any optimistic state is applied.
//!
//! Notification sinks live next to the reconciler that feeds them, see
//! [`crate::reconcile::NotificationSink`].
//!
//! [`InMemoryStore`] implements both [`Persistence`] and [`Loader`] and is
//! what the tests and benchmarks run against.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::Result;
use crate::item::{ContainerKey, ItemId, ItemPatch, Payload, Record};
use crate::pipeline::MutationKind;

pub mod errors;
pub mod in_memory;

pub use errors::StoreError;
pub use in_memory::{InMemoryStore, StoreCall};

/// The remote authority for a collection.
///
/// Every call either resolves with the authoritative record or fails. The
/// pipeline treats all failures alike, so implementations are free to map
/// timeouts and transport errors onto whatever [`crate::Error`] suits them.
#[async_trait]
pub trait Persistence<K: ContainerKey, P: Payload>: Send + Sync {
    /// Create a new item in `container`. The store decides id and position.
    async fn create(&self, container: K, payload: P) -> Result<Record<K, P>>;

    /// Apply a partial update.
    async fn update(&self, id: &ItemId, patch: &ItemPatch<K, P>) -> Result<Record<K, P>>;

    /// Persist a resolved move.
    async fn move_item(&self, id: &ItemId, container: K, position: f64) -> Result<Record<K, P>>;

    /// Delete an item, returning the id that was removed.
    async fn delete(&self, id: &ItemId) -> Result<ItemId>;
}

/// Supplies the starting state of a view.
#[async_trait]
pub trait Loader<K: ContainerKey, P: Payload>: Send + Sync {
    /// Load every record of the view. Order does not matter.
    async fn load(&self) -> Result<Vec<Record<K, P>>>;
}

/// What a mutation is about to touch.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a, K> {
    pub kind: MutationKind,
    /// The existing item, absent for creates
    pub item: Option<&'a ItemId>,
    /// The destination container, when the mutation names one
    pub container: Option<&'a K>,
}

/// An access decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny { reason: String },
}

impl Access {
    /// Deny with a reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Access::Deny {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow)
    }
}

/// Decides whether a mutation may be attempted at all.
///
/// Checks are synchronous: a denied mutation never reaches the optimistic
/// stage.
pub trait AccessControl<K>: Send + Sync {
    fn check(&self, request: &AccessRequest<'_, K>) -> Access;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<K> AccessControl<K> for AllowAll {
    fn check(&self, _request: &AccessRequest<'_, K>) -> Access {
        Access::Allow
    }
}

/// Denies every mutation of the listed items.
#[derive(Debug, Clone, Default)]
pub struct DenyList {
    items: HashSet<ItemId>,
    deny_creates: bool,
}

impl DenyList {
    /// Deny mutations of `items`.
    pub fn new(items: impl IntoIterator<Item = impl Into<ItemId>>) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            deny_creates: false,
        }
    }

    /// Also deny every create.
    pub fn deny_creates(mut self) -> Self {
        self.deny_creates = true;
        self
    }
}

impl<K> AccessControl<K> for DenyList {
    fn check(&self, request: &AccessRequest<'_, K>) -> Access {
        if request.kind == MutationKind::Create && self.deny_creates {
            return Access::deny("Creating items is not allowed");
        }
        match request.item {
            Some(id) if self.items.contains(id) => Access::deny(format!("No access to item {id}")),
            _ => Access::Allow,
        }
    }
}
