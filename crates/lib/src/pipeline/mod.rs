//! The optimistic mutation pipeline.
//!
//! A mutation goes through these steps:
//!
//! 1. access control is consulted; a denial returns at once and changes nothing;
//! 2. [`predict`] computes the next collection and a [`MutationSnapshot`];
//! 3. the prediction becomes the visible view before any remote call is made;
//! 4. the remote call is awaited;
//! 5. on success the authoritative record is [reconciled](crate::reconcile) into
//!    the view, on failure the snapshot's owned items are restored.
//!
//! Steps 1-3 are synchronous. The view lock is never held across step 4, so
//! any number of mutations can be in flight and their confirmations may
//! arrive in any order. Each one only ever confirms or restores the items it
//! owns.
//!
//! [`Pipeline`] is a cheap-to-clone handle. Free-text edits go through the
//! [`Debouncer`] instead, which coalesces rapid edits into one trailing write.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{Instrument, debug, debug_span, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::collaborators::{Access, AccessControl, AccessRequest, AllowAll, Loader, Persistence};
use crate::collection::OrderedCollection;
use crate::config::EngineConfig;
use crate::item::{ContainerKey, ItemId, ItemPatch, OrderedItem, Payload, Record};
use crate::reconcile::{ChangeCause, ChangeEvent, NotificationSink, SinkCollection, reconcile};
use crate::resolver::DropTarget;
use crate::Result;

pub mod debounce;
pub mod errors;
pub mod ledger;
pub mod predict;
pub mod snapshot;

pub use debounce::{Debouncer, SaveState};
pub use errors::PipelineError;
pub use ledger::{MutationId, MutationRecord, MutationState};
pub use predict::{Prediction, RemoteCall, predict};
pub use snapshot::MutationSnapshot;

use ledger::Ledger;

/// The four kinds of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Move,
    Delete,
}

impl MutationKind {
    /// Lowercase verb, for messages.
    pub fn verb(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Move => "move",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Where a created item goes within its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Before every existing sibling (new board tasks)
    Head,
    /// After every existing sibling (new pages)
    #[default]
    Tail,
}

/// A requested state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent<K, P: Payload> {
    Create {
        container: K,
        payload: P,
        placement: Placement,
    },
    Update {
        id: ItemId,
        patch: ItemPatch<K, P>,
    },
    Move {
        id: ItemId,
        target: DropTarget<K>,
    },
    Delete {
        id: ItemId,
    },
}

impl<K, P: Payload> Intent<K, P> {
    pub fn kind(&self) -> MutationKind {
        match self {
            Intent::Create { .. } => MutationKind::Create,
            Intent::Update { .. } => MutationKind::Update,
            Intent::Move { .. } => MutationKind::Move,
            Intent::Delete { .. } => MutationKind::Delete,
        }
    }

    /// The existing item the intent is about, absent for creates.
    pub fn item(&self) -> Option<&ItemId> {
        match self {
            Intent::Create { .. } => None,
            Intent::Update { id, .. } | Intent::Move { id, .. } | Intent::Delete { id } => Some(id),
        }
    }

    /// The destination container the intent names, if any.
    pub fn container(&self) -> Option<&K> {
        match self {
            Intent::Create { container, .. } => Some(container),
            Intent::Update { patch, .. } => patch.container.as_ref(),
            Intent::Move { target, .. } => match target {
                DropTarget::ContainerEnd(container)
                | DropTarget::BeforeSibling { container, .. }
                | DropTarget::Index { container, .. } => Some(container),
            },
            Intent::Delete { .. } => None,
        }
    }
}

/// How a mutation ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<K, P> {
    /// The remote write succeeded; the item as it now appears in the view
    Confirmed(OrderedItem<K, P>),
    /// The item was deleted remotely
    Deleted(ItemId),
    /// The remote write succeeded but the item had been removed locally in
    /// the meantime, so it was not brought back
    Superseded(ItemId),
    /// Nothing to do: no remote call was made
    NoOp,
}

impl<K, P> Outcome<K, P> {
    pub fn is_noop(&self) -> bool {
        matches!(self, Outcome::NoOp)
    }

    /// The confirmed item, if any.
    pub fn item(&self) -> Option<&OrderedItem<K, P>> {
        match self {
            Outcome::Confirmed(item) => Some(item),
            _ => None,
        }
    }
}

pub(crate) struct PipelineInner<K: ContainerKey, P: Payload> {
    view: Mutex<OrderedCollection<K, P>>,
    persistence: Arc<dyn Persistence<K, P>>,
    access: Arc<dyn AccessControl<K>>,
    sinks: RwLock<SinkCollection<K>>,
    ledger: Mutex<Ledger<K>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

/// Handle to a shared ordered view and the mutations running against it.
///
/// Cloning is cheap; all clones see the same view.
pub struct Pipeline<K: ContainerKey, P: Payload> {
    inner: Arc<PipelineInner<K, P>>,
}

impl<K: ContainerKey, P: Payload> Clone for Pipeline<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: ContainerKey, P: Payload> fmt::Debug for Pipeline<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("items", &self.with_view(|view| view.len()))
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Configures and creates a [`Pipeline`].
pub struct PipelineBuilder<K: ContainerKey, P: Payload> {
    persistence: Arc<dyn Persistence<K, P>>,
    access: Arc<dyn AccessControl<K>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    sinks: SinkCollection<K>,
}

impl<K: ContainerKey, P: Payload> PipelineBuilder<K, P> {
    /// Use `access` instead of allowing everything.
    pub fn access(mut self, access: Arc<dyn AccessControl<K>>) -> Self {
        self.access = access;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a notification sink.
    pub fn sink(mut self, sink: Arc<dyn NotificationSink<K>>) -> Self {
        self.sinks.add_sink(sink);
        self
    }

    /// Timestamp ledger records with `clock`.
    ///
    /// Only available with the `testing` feature or in test builds.
    #[cfg(any(test, feature = "testing"))]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create the pipeline over an initial collection.
    pub fn build(self, collection: OrderedCollection<K, P>) -> Result<Pipeline<K, P>> {
        self.config.validate()?;
        Ok(Pipeline {
            inner: Arc::new(PipelineInner {
                view: Mutex::new(collection),
                persistence: self.persistence,
                access: self.access,
                sinks: RwLock::new(self.sinks),
                ledger: Mutex::new(Ledger::default()),
                clock: self.clock,
                config: self.config,
            }),
        })
    }

    /// Load the initial collection from `loader` and create the pipeline.
    pub async fn open(self, loader: &dyn Loader<K, P>) -> Result<Pipeline<K, P>> {
        let records = loader.load().await?;
        debug!(count = records.len(), "Loaded initial records");
        let collection = OrderedCollection::from_records(records)?;
        self.build(collection)
    }
}

impl<K: ContainerKey, P: Payload> Pipeline<K, P> {
    /// Start configuring a pipeline that writes to `persistence`.
    pub fn builder(persistence: Arc<dyn Persistence<K, P>>) -> PipelineBuilder<K, P> {
        PipelineBuilder {
            persistence,
            access: Arc::new(AllowAll),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            sinks: SinkCollection::new(),
        }
    }

    /// A copy of the current view.
    pub fn view(&self) -> OrderedCollection<K, P> {
        self.with_view(Clone::clone)
    }

    /// Run `f` against the current view without copying it.
    pub fn with_view<R>(&self, f: impl FnOnce(&OrderedCollection<K, P>) -> R) -> R {
        f(&self.inner.view.lock().unwrap())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register a notification sink.
    pub fn add_sink(&self, sink: Arc<dyn NotificationSink<K>>) {
        self.inner.sinks.write().unwrap().add_sink(sink);
    }

    /// Mutations whose remote call has not settled yet.
    pub fn pending(&self) -> Vec<MutationRecord<K>> {
        self.inner.ledger.lock().unwrap().pending()
    }

    /// Recent mutations, pending and settled, oldest first.
    pub fn history(&self) -> Vec<MutationRecord<K>> {
        self.inner.ledger.lock().unwrap().history()
    }

    /// A debounced editor writing through this pipeline.
    pub fn debouncer(&self) -> Debouncer<K, P> {
        Debouncer::new(self.clone())
    }

    /// Create an item in `container`.
    pub async fn create(&self, container: K, payload: P, placement: Placement) -> Result<Outcome<K, P>> {
        self.run(Intent::Create {
            container,
            payload,
            placement,
        })
        .await
    }

    /// Apply a partial update.
    pub async fn update(&self, id: impl Into<ItemId>, patch: ItemPatch<K, P>) -> Result<Outcome<K, P>> {
        self.run(Intent::Update {
            id: id.into(),
            patch,
        })
        .await
    }

    /// Move an item to a drop target.
    pub async fn move_item(&self, id: impl Into<ItemId>, target: DropTarget<K>) -> Result<Outcome<K, P>> {
        self.run(Intent::Move {
            id: id.into(),
            target,
        })
        .await
    }

    /// Delete an item.
    pub async fn delete(&self, id: impl Into<ItemId>) -> Result<Outcome<K, P>> {
        self.run(Intent::Delete { id: id.into() }).await
    }

    /// Run one mutation to completion.
    ///
    /// The predicted state is visible through [`Pipeline::view`] before this
    /// future first suspends. Failures are returned as
    /// [`PipelineError`]s after the view has been restored.
    ///
    /// The predict and commit halves are the pure functions
    /// [`predict`](crate::pipeline::predict::predict) and
    /// [`reconcile`](crate::reconcile::reconcile); this method swaps their
    /// results into the shared view around the remote call.
    pub async fn run(&self, intent: Intent<K, P>) -> Result<Outcome<K, P>> {
        let kind = intent.kind();
        let span = debug_span!("mutation", %kind, item = ?intent.item());
        self.run_inner(intent).instrument(span).await
    }

    async fn run_inner(&self, intent: Intent<K, P>) -> Result<Outcome<K, P>> {
        let kind = intent.kind();
        self.authorize(kind, intent.item(), intent.container())?;

        let (mutation, prediction_item, snapshot, remote) = {
            let mut view = self.inner.view.lock().unwrap();
            let Some(prediction) = predict(&view, &intent, &self.inner.config.optimistic_id_prefix)
            else {
                debug!("Intent resolved to nothing");
                return Ok(Outcome::NoOp);
            };
            if prediction.needs_renormalize {
                warn!(item = %prediction.item, "Position precision exhausted; partition needs renormalizing");
            }
            *view = prediction.collection;

            let mutation = self.inner.ledger.lock().unwrap().begin(
                kind,
                prediction.item.clone(),
                prediction.snapshot.owned().to_vec(),
                prediction.snapshot.containers(),
                self.inner.clock.now_millis(),
            );
            (mutation, prediction.item, prediction.snapshot, prediction.remote)
        };
        debug!(%mutation, "Applied optimistically");

        let persistence = &self.inner.persistence;
        let result = match remote {
            RemoteCall::Create { container, payload } => {
                persistence.create(container, payload).await.map(Some)
            }
            RemoteCall::Update { id, patch } => persistence.update(&id, &patch).await.map(Some),
            RemoteCall::Move {
                id,
                container,
                position,
            } => persistence.move_item(&id, container, position).await.map(Some),
            RemoteCall::Delete { id } => persistence.delete(&id).await.map(|_| None),
        };

        match result {
            Ok(record) => Ok(self.confirm(mutation, kind, prediction_item, snapshot, record)),
            Err(err) => Err(self.roll_back(mutation, kind, prediction_item, snapshot, err)),
        }
    }

    pub(crate) fn authorize(&self, kind: MutationKind, item: Option<&ItemId>, container: Option<&K>) -> Result<()> {
        let request = AccessRequest {
            kind,
            item,
            container,
        };
        match self.inner.access.check(&request) {
            Access::Allow => Ok(()),
            Access::Deny { reason } => {
                debug!(%kind, %reason, "Mutation denied");
                Err(PipelineError::Denied { kind, reason }.into())
            }
        }
    }

    fn confirm(
        &self,
        mutation: MutationId,
        kind: MutationKind,
        lookup: ItemId,
        snapshot: MutationSnapshot<K, P>,
        record: Option<Record<K, P>>,
    ) -> Outcome<K, P> {
        let mut containers = snapshot.containers();
        let (outcome, item_id) = match record {
            None => (Outcome::Deleted(lookup.clone()), lookup.clone()),
            Some(record) => {
                let server_id = record.id.clone();
                let reconciled = {
                    let mut view = self.inner.view.lock().unwrap();
                    let reconciled = reconcile(&view, &lookup, record);
                    *view = reconciled.collection.clone();
                    reconciled
                };
                for key in reconciled.touched {
                    if !containers.contains(&key) {
                        containers.push(key);
                    }
                }
                match reconciled.item {
                    Some(item) => (Outcome::Confirmed(item), server_id),
                    None => (Outcome::Superseded(server_id.clone()), server_id),
                }
            }
        };

        self.settle(mutation, MutationState::Confirmed);
        info!(%mutation, item = %item_id, "Mutation confirmed");

        self.notify(ChangeEvent {
            containers,
            previous_id: (item_id != lookup).then_some(lookup),
            item: item_id,
            cause: ChangeCause::Confirmed(kind),
        });
        outcome
    }

    fn roll_back(
        &self,
        mutation: MutationId,
        kind: MutationKind,
        item: ItemId,
        snapshot: MutationSnapshot<K, P>,
        err: crate::Error,
    ) -> crate::Error {
        {
            let mut view = self.inner.view.lock().unwrap();
            let restored = snapshot.restore(&view);
            *view = restored;
        }
        self.settle(mutation, MutationState::RolledBack);
        warn!(%mutation, %item, "Remote write failed, rolled back: {err}");

        self.notify(ChangeEvent {
            containers: snapshot.containers(),
            item: item.clone(),
            previous_id: None,
            cause: ChangeCause::RolledBack(kind),
        });
        PipelineError::RolledBack {
            kind,
            item,
            source: Box::new(err),
        }
        .into()
    }

    fn settle(&self, mutation: MutationId, state: MutationState) {
        let now = self.inner.clock.now_millis();
        self.inner.ledger.lock().unwrap().settle(mutation, state, now);
    }

    pub(crate) fn notify(&self, event: ChangeEvent<K>) {
        // Failures are logged by the sink collection
        let _ = self.inner.sinks.read().unwrap().notify(&event);
    }

    pub(crate) fn persistence(&self) -> &Arc<dyn Persistence<K, P>> {
        &self.inner.persistence
    }

    /// Apply `f` to the view in place.
    pub(crate) fn edit_view<R>(&self, f: impl FnOnce(&mut OrderedCollection<K, P>) -> R) -> R {
        f(&mut self.inner.view.lock().unwrap())
    }
}
