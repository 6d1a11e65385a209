//! Shared fixtures for the integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use orderly::{
    ContainerKey, Intent, ItemId, ItemPatch, OrderedCollection, Outcome, Payload, Pipeline, Record,
    Result,
    board::{Task, TaskStatus},
    collaborators::{InMemoryStore, Loader, Persistence, StoreError},
    tree::{Page, PageParent},
};

// ==========================
// RECORD FACTORIES
// ==========================

/// A task record titled after its id.
pub fn task(id: &str, status: TaskStatus, position: f64) -> Record<TaskStatus, Task> {
    Record {
        id: id.into(),
        container: status,
        position,
        payload: Task::new(id),
    }
}

/// A page record titled after its id.
pub fn page(id: &str, parent: Option<&str>, position: f64) -> Record<PageParent, Page> {
    Record {
        id: id.into(),
        container: parent.map(ItemId::from),
        position,
        payload: Page::new(id),
    }
}

/// Board with `[X@1, Y@2]` in todo and an empty done column.
pub fn two_card_board() -> Vec<Record<TaskStatus, Task>> {
    vec![task("X", TaskStatus::Todo, 1.0), task("Y", TaskStatus::Todo, 2.0)]
}

/// Tree with two root pages and a small subtree under `P1`:
///
/// ```text
/// P1
///   C1
///     G1
///   C2
/// P2
/// ```
pub fn sample_tree() -> Vec<Record<PageParent, Page>> {
    vec![
        page("P1", None, 1.0),
        page("P2", None, 2.0),
        page("C1", Some("P1"), 1.0),
        page("C2", Some("P1"), 2.0),
        page("G1", Some("C1"), 1.0),
    ]
}

// ==========================
// PIPELINE FACTORIES
// ==========================

/// Opens a pipeline that loads from and writes to `store`.
pub async fn open<K, P, S>(store: &Arc<S>) -> Pipeline<K, P>
where
    K: ContainerKey,
    P: Payload,
    S: Persistence<K, P> + Loader<K, P> + 'static,
{
    Pipeline::<K, P>::builder(store.clone())
        .open(store.as_ref())
        .await
        .expect("Failed to open pipeline")
}

pub async fn board(records: Vec<Record<TaskStatus, Task>>) -> (Arc<InMemoryStore<TaskStatus, Task>>, Pipeline<TaskStatus, Task>) {
    let store = Arc::new(InMemoryStore::with_records(records));
    let pipeline = open(&store).await;
    (store, pipeline)
}

pub async fn tree(records: Vec<Record<PageParent, Page>>) -> (Arc<InMemoryStore<PageParent, Page>>, Pipeline<PageParent, Page>) {
    let store = Arc::new(InMemoryStore::with_records(records));
    let pipeline = open(&store).await;
    (store, pipeline)
}

/// Ids of one partition, in order.
pub fn ids<K: ContainerKey, P: Payload>(collection: &OrderedCollection<K, P>, key: &K) -> Vec<String> {
    collection
        .partition(key)
        .iter()
        .map(|item| item.id.to_string())
        .collect()
}

/// Spawns `intent` and waits until its optimistic state is visible.
///
/// Returns as soon as the mutation is in flight, or when it finished without
/// reaching the store (a no-op or a denial).
pub async fn start<K: ContainerKey, P: Payload>(
    pipeline: &Pipeline<K, P>,
    intent: Intent<K, P>,
) -> JoinHandle<Result<Outcome<K, P>>> {
    let started = pipeline.history().len();
    let worker = pipeline.clone();
    let handle = tokio::spawn(async move { worker.run(intent).await });
    while pipeline.history().len() == started && !handle.is_finished() {
        tokio::task::yield_now().await;
    }
    handle
}

// ==========================
// GATED STORE
// ==========================

/// Holds one store call until the test releases it.
pub struct Gate(oneshot::Sender<Option<StoreError>>);

impl Gate {
    /// Let the call through to the store.
    pub fn release(self) {
        let _ = self.0.send(None);
    }

    /// Fail the call without reaching the store.
    pub fn fail(self, error: StoreError) {
        let _ = self.0.send(Some(error));
    }
}

/// An [`InMemoryStore`] whose writes can be held back, so tests control the
/// order in which confirmations arrive.
pub struct GatedStore<K: ContainerKey, P: Payload> {
    pub inner: InMemoryStore<K, P>,
    gates: Mutex<VecDeque<oneshot::Receiver<Option<StoreError>>>>,
}

impl<K: ContainerKey, P: Payload> GatedStore<K, P> {
    pub fn new(records: impl IntoIterator<Item = Record<K, P>>) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::with_records(records),
            gates: Mutex::new(VecDeque::new()),
        })
    }

    /// Hold the next write that arrives. Gates apply to writes in arrival order.
    pub fn hold_next(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        Gate(tx)
    }

    async fn pass(&self) -> Result<()> {
        let gate = self.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate
            && let Ok(Some(error)) = gate.await
        {
            return Err(error.into());
        }
        Ok(())
    }
}

#[async_trait]
impl<K: ContainerKey, P: Payload> Persistence<K, P> for GatedStore<K, P> {
    async fn create(&self, container: K, payload: P) -> Result<Record<K, P>> {
        self.pass().await?;
        self.inner.create(container, payload).await
    }

    async fn update(&self, id: &ItemId, patch: &ItemPatch<K, P>) -> Result<Record<K, P>> {
        self.pass().await?;
        self.inner.update(id, patch).await
    }

    async fn move_item(&self, id: &ItemId, container: K, position: f64) -> Result<Record<K, P>> {
        self.pass().await?;
        self.inner.move_item(id, container, position).await
    }

    async fn delete(&self, id: &ItemId) -> Result<ItemId> {
        self.pass().await?;
        self.inner.delete(id).await
    }
}

#[async_trait]
impl<K: ContainerKey, P: Payload> Loader<K, P> for GatedStore<K, P> {
    async fn load(&self) -> Result<Vec<Record<K, P>>> {
        self.inner.load().await
    }
}

pub fn offline() -> StoreError {
    StoreError::Unavailable {
        reason: "network unreachable".into(),
    }
}
