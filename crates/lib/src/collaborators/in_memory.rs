//! In-memory persistence.
//!
//! Behaves like the remote authority the engine is written against: it hands
//! out its own ids, appends creates to the end of their container regardless
//! of where the client placed them optimistically, and refuses positions it
//! cannot store. Failures can be injected one call at a time.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::{Loader, Persistence, StoreError};
use crate::Result;
use crate::constants::EMPTY_PARTITION_POSITION;
use crate::item::{ContainerKey, ItemId, ItemPatch, Payload, Record};

/// A call received by an [`InMemoryStore`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall<K, P: Payload> {
    Load,
    Create { container: K, payload: P },
    Update { id: ItemId, patch: ItemPatch<K, P> },
    Move { id: ItemId, container: K, position: f64 },
    Delete { id: ItemId },
}

#[derive(Debug)]
struct StoreState<K, P: Payload> {
    records: HashMap<ItemId, Record<K, P>>,
    next_id: u64,
    failures: VecDeque<StoreError>,
    calls: Vec<StoreCall<K, P>>,
}

/// A thread-safe in-memory store implementing [`Persistence`] and [`Loader`].
#[derive(Debug)]
pub struct InMemoryStore<K, P: Payload> {
    state: Mutex<StoreState<K, P>>,
}

impl<K: ContainerKey, P: Payload> Default for InMemoryStore<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ContainerKey, P: Payload> InMemoryStore<K, P> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Creates a store seeded with existing records.
    pub fn with_records(records: impl IntoIterator<Item = Record<K, P>>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
                next_id: 1,
                failures: VecDeque::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Make the next call fail with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: StoreError) {
        self.state.lock().unwrap().failures.push_back(error);
    }

    /// The stored record for `id`.
    pub fn get(&self, id: &ItemId) -> Option<Record<K, P>> {
        self.state.lock().unwrap().records.get(id).cloned()
    }

    /// All stored records, grouped by container and sorted by position.
    pub fn records(&self) -> Vec<Record<K, P>> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.container
                .cmp(&b.container)
                .then(a.position.total_cmp(&b.position))
        });
        records
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<StoreCall<K, P>> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of received calls, excluding loads.
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| !matches!(call, StoreCall::Load))
            .count()
    }

    fn begin(&self, call: StoreCall<K, P>) -> Result<std::sync::MutexGuard<'_, StoreState<K, P>>> {
        let mut state = self.state.lock().unwrap();
        debug!(?call, "Store call");
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(error) => Err(error.into()),
            None => Ok(state),
        }
    }
}

impl<K: ContainerKey, P: Payload> StoreState<K, P> {
    fn fresh_id(&mut self) -> ItemId {
        loop {
            let id = ItemId::new(format!("item-{}", self.next_id));
            self.next_id += 1;
            if !self.records.contains_key(&id) {
                return id;
            }
        }
    }

    fn tail_position(&self, container: &K) -> f64 {
        self.records
            .values()
            .filter(|r| &r.container == container)
            .map(|r| r.position)
            .reduce(f64::max)
            .map_or(EMPTY_PARTITION_POSITION, |max| max + 1.0)
    }

    fn record_mut(&mut self, id: &ItemId) -> Result<&mut Record<K, P>> {
        self.records.get_mut(id).ok_or_else(|| {
            StoreError::NotFound {
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Ids of every record whose ancestor chain passes through `id`.
    fn descendants(&self, id: &ItemId) -> Vec<ItemId> {
        let mut found = Vec::new();
        let mut frontier = vec![id.clone()];
        while let Some(parent) = frontier.pop() {
            for record in self.records.values() {
                if record.container.parent_item() == Some(&parent) && !found.contains(&record.id) {
                    found.push(record.id.clone());
                    frontier.push(record.id.clone());
                }
            }
        }
        found
    }
}

fn check_position(id: &ItemId, position: f64) -> Result<()> {
    if !position.is_finite() || position <= 0.0 {
        return Err(StoreError::InvalidPosition {
            id: id.to_string(),
            position,
        }
        .into());
    }
    Ok(())
}

#[async_trait]
impl<K: ContainerKey, P: Payload> Persistence<K, P> for InMemoryStore<K, P> {
    async fn create(&self, container: K, payload: P) -> Result<Record<K, P>> {
        tokio::task::yield_now().await;
        let mut state = self.begin(StoreCall::Create {
            container: container.clone(),
            payload: payload.clone(),
        })?;
        let id = state.fresh_id();
        let position = state.tail_position(&container);
        let record = Record {
            id: id.clone(),
            container,
            position,
            payload,
        };
        state.records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: &ItemId, patch: &ItemPatch<K, P>) -> Result<Record<K, P>> {
        tokio::task::yield_now().await;
        let mut state = self.begin(StoreCall::Update {
            id: id.clone(),
            patch: patch.clone(),
        })?;
        if let Some(position) = patch.position {
            check_position(id, position)?;
        }
        let record = state.record_mut(id)?;
        record.payload.apply(&patch.payload);
        if let Some(container) = &patch.container {
            record.container = container.clone();
        }
        if let Some(position) = patch.position {
            record.position = position;
        }
        Ok(record.clone())
    }

    async fn move_item(&self, id: &ItemId, container: K, position: f64) -> Result<Record<K, P>> {
        tokio::task::yield_now().await;
        let mut state = self.begin(StoreCall::Move {
            id: id.clone(),
            container: container.clone(),
            position,
        })?;
        check_position(id, position)?;
        let record = state.record_mut(id)?;
        record.container = container;
        record.position = position;
        Ok(record.clone())
    }

    async fn delete(&self, id: &ItemId) -> Result<ItemId> {
        tokio::task::yield_now().await;
        let mut state = self.begin(StoreCall::Delete { id: id.clone() })?;
        state.record_mut(id)?;
        for child in state.descendants(id) {
            state.records.remove(&child);
        }
        state.records.remove(id);
        Ok(id.clone())
    }
}

#[async_trait]
impl<K: ContainerKey, P: Payload> Loader<K, P> for InMemoryStore<K, P> {
    async fn load(&self) -> Result<Vec<Record<K, P>>> {
        tokio::task::yield_now().await;
        let state = self.begin(StoreCall::Load)?;
        Ok(state.records.values().cloned().collect())
    }
}
