//! List view state for one entity: the rows, a loading flag and the last
//! error, kept in sync with the backend after each write.
//!
//! Background loads run on a worker thread and are applied back on the
//! owner's thread. Every view owns a [`Scope`]; a load whose scope was
//! cancelled, or that a newer load superseded, is dropped without touching
//! the view.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use agrodesk_core::Record;
use agrodesk_storage::{Gateway, SqliteStorage};

use crate::client::Client;
use crate::confirm::Confirm;
use crate::error::{EngineError, ServiceError};

#[derive(Debug, Clone)]
pub struct ViewState<R> {
    pub data: Vec<R>,
    pub loading: bool,
    pub error: Option<ServiceError>,
}

impl<R> Default for ViewState<R> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// How a view reflects its own writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Splice the written record into the local list.
    PatchLocal,
    /// Fetch the whole list again.
    Refetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    Cancelled,
    Stale,
}

/// Cancellation token shared between a view and its in-flight loads.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    cancelled: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Start a new load, superseding every earlier one.
    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// A load running on a worker thread.
pub struct PendingLoad<R> {
    generation: u64,
    handle: JoinHandle<Result<Vec<R>, EngineError>>,
}

impl<R> PendingLoad<R> {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct ListView<R: Record> {
    client: Client,
    filter: R::Filter,
    policy: SyncPolicy,
    state: ViewState<R>,
    scope: Scope,
}

impl<R: Record> ListView<R>
where
    SqliteStorage: Gateway<R>,
{
    /// An empty view; call [`refresh`](Self::refresh) or
    /// [`spawn_load`](Self::spawn_load) to fill it.
    pub fn new(client: Client, filter: R::Filter, policy: SyncPolicy) -> Self {
        Self {
            client,
            filter,
            policy,
            state: ViewState::default(),
            scope: Scope::new(),
        }
    }

    pub fn state(&self) -> &ViewState<R> {
        &self.state
    }

    pub fn data(&self) -> &[R] {
        &self.state.data
    }

    pub fn filter(&self) -> &R::Filter {
        &self.filter
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn refresh(&mut self) -> Result<(), ServiceError> {
        if self.scope.is_cancelled() {
            return Ok(());
        }
        let generation = self.scope.begin();
        self.state.loading = true;
        let result = self.client.get_all::<R>(&self.filter);
        self.finish(generation, result)
    }

    /// Replace the filter and reload.
    pub fn set_filter(&mut self, filter: R::Filter) -> Result<(), ServiceError> {
        self.filter = filter;
        self.refresh()
    }

    pub fn create(&mut self, draft: R::Draft) -> Result<R, ServiceError> {
        let record: R = self.client.create(draft).map_err(|e| self.fail(e))?;
        match self.policy {
            SyncPolicy::PatchLocal => self.state.data.insert(0, record.clone()),
            SyncPolicy::Refetch => self.refresh()?,
        }
        Ok(record)
    }

    pub fn update(&mut self, id: R::Id, patch: R::Patch) -> Result<R, ServiceError> {
        let record: R = self.client.update(id, patch).map_err(|e| self.fail(e))?;
        match self.policy {
            SyncPolicy::PatchLocal => {
                if let Some(slot) = self.state.data.iter_mut().find(|r| r.id() == id) {
                    *slot = record.clone();
                }
            }
            SyncPolicy::Refetch => self.refresh()?,
        }
        Ok(record)
    }

    /// Delete after the user confirms. Declining makes no backend call.
    pub fn delete(&mut self, id: R::Id, confirm: &dyn Confirm) -> Result<DeleteOutcome, ServiceError> {
        let prompt = format!("Are you sure you want to delete this record from {}?", R::TABLE);
        if !confirm.confirm(&prompt) {
            tracing::debug!(table = R::TABLE, id = %id, "delete declined");
            return Ok(DeleteOutcome::Declined);
        }
        self.client.delete::<R>(id).map_err(|e| self.fail(e))?;
        match self.policy {
            SyncPolicy::PatchLocal => self.state.data.retain(|r| r.id() != id),
            SyncPolicy::Refetch => self.refresh()?,
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Fetch on a worker thread. Hand the result to [`apply`](Self::apply).
    pub fn spawn_load(&mut self) -> PendingLoad<R>
    where
        R: Send + 'static,
        R::Filter: Send + 'static,
    {
        let generation = self.scope.begin();
        self.state.loading = true;
        let client = self.client.clone();
        let filter = self.filter.clone();
        let handle = std::thread::spawn(move || client.get_all::<R>(&filter));
        PendingLoad { generation, handle }
    }

    /// Wait for a background load and apply it if it is still wanted.
    pub fn apply(&mut self, pending: PendingLoad<R>) -> LoadOutcome {
        let result = pending
            .handle
            .join()
            .unwrap_or(Err(EngineError::ClientPoisoned));
        if self.scope.is_cancelled() {
            tracing::debug!(table = R::TABLE, "load discarded: view disposed");
            return LoadOutcome::Cancelled;
        }
        if !self.scope.is_current(pending.generation) {
            tracing::debug!(table = R::TABLE, "load discarded: superseded");
            return LoadOutcome::Stale;
        }
        // The error already sits in the view state.
        let _ = self.finish(pending.generation, result);
        LoadOutcome::Applied
    }

    /// Stop accepting results. Pending loads are discarded when applied.
    pub fn dispose(&mut self) {
        self.scope.cancel();
    }

    fn finish(&mut self, generation: u64, result: Result<Vec<R>, EngineError>) -> Result<(), ServiceError> {
        if !self.scope.is_current(generation) {
            return Ok(());
        }
        self.state.loading = false;
        match result {
            Ok(rows) => {
                self.state.data = rows;
                self.state.error = None;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, err: EngineError) -> ServiceError {
        tracing::warn!(table = R::TABLE, error = %err, "view operation failed");
        let err = ServiceError::from(err);
        self.state.error = Some(err.clone());
        err
    }
}

impl<R: Record> Drop for ListView<R> {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

#[cfg(test)]
mod tests {
    use agrodesk_core::{Zone, ZoneDraft, ZoneFilter, ZonePatch};

    use super::*;
    use crate::confirm::AlwaysConfirm;

    fn draft(code: &str) -> ZoneDraft {
        ZoneDraft {
            code: code.into(),
            name: format!("Zone {code}"),
            description: None,
            is_active: true,
        }
    }

    fn view(policy: SyncPolicy) -> ListView<Zone> {
        ListView::new(Client::open_in_memory().unwrap(), ZoneFilter::default(), policy)
    }

    #[test]
    fn refresh_fills_state() {
        let mut zones = view(SyncPolicy::Refetch);
        zones.client.create::<Zone>(draft("Z1")).unwrap();
        zones.refresh().unwrap();
        assert_eq!(zones.data().len(), 1);
        assert!(!zones.state().loading);
        assert!(zones.state().error.is_none());
    }

    #[test]
    fn patch_local_splices_writes() {
        let mut zones = view(SyncPolicy::PatchLocal);
        let z = zones.create(draft("Z1")).unwrap();
        let renamed = zones
            .update(
                z.id,
                ZonePatch {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(zones.data(), &[renamed]);
        assert_eq!(zones.delete(z.id, &AlwaysConfirm).unwrap(), DeleteOutcome::Deleted);
        assert!(zones.data().is_empty());
    }

    #[test]
    fn failed_write_records_error() {
        let mut zones = view(SyncPolicy::Refetch);
        zones.create(draft("Z1")).unwrap();
        let err = zones.create(draft("Z1")).unwrap_err();
        assert_eq!(err.code, "constraint_violation");
        assert_eq!(zones.state().error.as_ref(), Some(&err));
        assert_eq!(zones.data().len(), 1);
    }

    #[test]
    fn background_load_applies() {
        let mut zones = view(SyncPolicy::Refetch);
        zones.client.create::<Zone>(draft("Z1")).unwrap();
        let pending = zones.spawn_load();
        assert!(zones.state().loading);
        assert_eq!(zones.apply(pending), LoadOutcome::Applied);
        assert_eq!(zones.data().len(), 1);
        assert!(!zones.state().loading);
    }

    #[test]
    fn superseded_load_is_stale() {
        let mut zones = view(SyncPolicy::Refetch);
        let first = zones.spawn_load();
        zones.client.create::<Zone>(draft("Z1")).unwrap();
        let second = zones.spawn_load();
        assert_eq!(zones.apply(first), LoadOutcome::Stale);
        assert!(zones.data().is_empty());
        assert_eq!(zones.apply(second), LoadOutcome::Applied);
        assert_eq!(zones.data().len(), 1);
    }

    #[test]
    fn disposed_view_ignores_load() {
        let mut zones = view(SyncPolicy::Refetch);
        zones.client.create::<Zone>(draft("Z1")).unwrap();
        let pending = zones.spawn_load();
        zones.dispose();
        assert_eq!(zones.apply(pending), LoadOutcome::Cancelled);
        assert!(zones.data().is_empty());
    }
}
