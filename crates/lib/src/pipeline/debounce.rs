//! Trailing-edge debouncing of free-text edits.
//!
//! Every [`Debouncer::edit`] is applied to the view immediately. The remote
//! write is delayed until the item has been quiet for the configured period,
//! and all edits made in the meantime are folded into that one write.
//!
//! A write that has not been sent yet is cancelled silently when a new edit
//! arrives. A failed write stays pending, so the next flush or edit retries
//! it. A write that has been sent is never cancelled; its confirmation
//! is only reconciled into the view if no newer edit is waiting, so a slow
//! echo of older text cannot overwrite what the user typed since.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, warn};

use super::{MutationKind, Pipeline, PipelineError};
use crate::Result;
use crate::item::{ContainerKey, ItemId, ItemPatch, Payload};
use crate::reconcile::{ChangeCause, ChangeEvent, reconcile};

/// Save status of one item, for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveState {
    /// Nothing has been edited
    #[default]
    Idle,
    /// Edits are waiting for the quiet period to end
    Pending,
    /// A write is in flight
    Saving,
    Saved,
    /// The last write failed; local edits are kept
    Failed(String),
}

struct Slot<K, P: Payload> {
    /// Bumped on every edit
    generation: u64,
    pending: Option<ItemPatch<K, P>>,
    timer: Option<JoinHandle<()>>,
    state: SaveState,
}

impl<K, P: Payload> Default for Slot<K, P> {
    fn default() -> Self {
        Self {
            generation: 0,
            pending: None,
            timer: None,
            state: SaveState::Idle,
        }
    }
}

/// Coalesces rapid edits into trailing writes through a [`Pipeline`].
///
/// Timers are Tokio tasks, so edits must be made from within a runtime.
pub struct Debouncer<K: ContainerKey, P: Payload> {
    pipeline: Pipeline<K, P>,
    slots: Arc<Mutex<HashMap<ItemId, Slot<K, P>>>>,
    delay: Duration,
}

impl<K: ContainerKey, P: Payload> Clone for Debouncer<K, P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            slots: Arc::clone(&self.slots),
            delay: self.delay,
        }
    }
}

impl<K: ContainerKey, P: Payload> fmt::Debug for Debouncer<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("items", &self.slots.lock().unwrap().len())
            .finish()
    }
}

impl<K: ContainerKey, P: Payload> Debouncer<K, P> {
    pub(crate) fn new(pipeline: Pipeline<K, P>) -> Self {
        let delay = pipeline.config().debounce();
        Self {
            pipeline,
            slots: Arc::new(Mutex::new(HashMap::new())),
            delay,
        }
    }

    /// The quiet period before a write is sent.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Apply `patch` locally and schedule a trailing write.
    ///
    /// Fails without touching the view if access control denies the update
    /// or the item is not in the view.
    pub fn edit(&self, id: impl Into<ItemId>, patch: P::Patch) -> Result<()> {
        let id = id.into();
        self.pipeline.authorize(MutationKind::Update, Some(&id), None)?;

        let applied = self.pipeline.edit_view(|view| match view.get_mut(&id) {
            Some(item) => {
                item.payload.apply(&patch);
                item.optimistic = true;
                true
            }
            None => false,
        });
        if !applied {
            return Err(PipelineError::UnknownItem { id }.into());
        }

        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(id.clone()).or_default();
        slot.generation += 1;
        match &mut slot.pending {
            Some(pending) => pending.coalesce(ItemPatch::payload(patch)),
            None => slot.pending = Some(ItemPatch::payload(patch)),
        }
        if let Some(timer) = slot.timer.take() {
            // Not sent yet: the task clears `timer` before it writes
            timer.abort();
        }
        slot.state = SaveState::Pending;

        let debouncer = self.clone();
        let delay = self.delay;
        let span = debug_span!("debounced_save", item = %id);
        slot.timer = Some(tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                // Failures are recorded in the slot state
                let _ = debouncer.send(&id).await;
            }
            .instrument(span),
        ));
        debug!("Edit applied, write scheduled");
        Ok(())
    }

    /// Send a pending write now instead of waiting for the quiet period.
    pub async fn flush(&self, id: &ItemId) -> Result<()> {
        {
            let mut slots = self.slots.lock().unwrap();
            let Some(slot) = slots.get_mut(id) else {
                return Ok(());
            };
            if slot.pending.is_none() {
                return Ok(());
            }
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
        self.send(id).await
    }

    /// Send every pending write.
    pub async fn flush_all(&self) -> Result<()> {
        let ids: Vec<ItemId> = {
            let slots = self.slots.lock().unwrap();
            slots
                .iter()
                .filter(|(_, slot)| slot.pending.is_some())
                .map(|(id, _)| id.clone())
                .collect()
        };
        let mut first_error = None;
        for id in ids {
            if let Err(e) = self.flush(&id).await
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Drop a pending write. Local edits stay in the view.
    ///
    /// Returns true if a write was pending.
    pub fn cancel(&self, id: &ItemId) -> bool {
        let mut slots = self.slots.lock().unwrap();
        let Some(slot) = slots.get_mut(id) else {
            return false;
        };
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        let had_pending = slot.pending.take().is_some();
        if had_pending {
            slot.state = SaveState::Idle;
            debug!(item = %id, "Pending write cancelled");
        }
        had_pending
    }

    /// Save status of `id`.
    pub fn save_state(&self, id: &ItemId) -> SaveState {
        self.slots
            .lock()
            .unwrap()
            .get(id)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    /// True if any write is pending or in flight.
    pub fn is_busy(&self) -> bool {
        self.slots
            .lock()
            .unwrap()
            .values()
            .any(|slot| matches!(slot.state, SaveState::Pending | SaveState::Saving))
    }

    async fn send(&self, id: &ItemId) -> Result<()> {
        let (patch, generation) = {
            let mut slots = self.slots.lock().unwrap();
            let Some(slot) = slots.get_mut(id) else {
                return Ok(());
            };
            let Some(patch) = slot.pending.take() else {
                return Ok(());
            };
            slot.timer = None;
            slot.state = SaveState::Saving;
            (patch, slot.generation)
        };

        let result = self.pipeline.persistence().update(id, &patch).await;

        let mut slots = self.slots.lock().unwrap();
        let slot = slots.entry(id.clone()).or_default();
        let superseded = slot.generation != generation;

        match result {
            Ok(record) => {
                if superseded {
                    debug!(item = %id, "Write confirmed, newer edit pending");
                    return Ok(());
                }
                slot.state = SaveState::Saved;
                drop(slots);

                let touched = self.pipeline.edit_view(|view| {
                    let reconciled = reconcile(view, id, record);
                    *view = reconciled.collection;
                    reconciled.touched
                });
                debug!(item = %id, "Debounced write confirmed");
                if !touched.is_empty() {
                    self.pipeline.notify(ChangeEvent {
                        containers: touched,
                        item: id.clone(),
                        previous_id: None,
                        cause: ChangeCause::Saved,
                    });
                }
                Ok(())
            }
            Err(err) => {
                warn!(item = %id, "Debounced write failed, keeping local edits: {err}");
                // Newer edits win over the failed patch
                let mut retry = patch;
                if let Some(newer) = slot.pending.take() {
                    retry.coalesce(newer);
                }
                slot.pending = Some(retry);

                let error = PipelineError::SaveFailed {
                    item: id.clone(),
                    source: Box::new(err),
                };
                if !superseded {
                    slot.state = SaveState::Failed(error.user_message());
                }
                Err(error.into())
            }
        }
    }
}
