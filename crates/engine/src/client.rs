use std::sync::{Arc, Mutex, MutexGuard};

use agrodesk_core::{Record, StaffId};
use agrodesk_storage::{Gateway, SqliteStorage, Storage, StorageError};

use crate::config::BackofficeConfig;
use crate::error::EngineError;

/// Handle to the backend, built once at startup and cloned into every
/// component that reads or writes records.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl Client {
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    pub fn open(config: &BackofficeConfig) -> Result<Self, EngineError> {
        let storage = match &config.database.path {
            Some(path) => SqliteStorage::open_with_timeout(path, config.database.busy_timeout())?,
            None => SqliteStorage::open_in_memory()?,
        };
        tracing::info!(
            database = config
                .database
                .path
                .as_ref()
                .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string()),
            "backend client ready"
        );
        Ok(Self::new(storage))
    }

    pub fn open_in_memory() -> Result<Self, EngineError> {
        Ok(Self::new(SqliteStorage::open_in_memory()?))
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, SqliteStorage>, EngineError> {
        self.inner.lock().map_err(|_| EngineError::ClientPoisoned)
    }

    /// Run one storage call, mapping its failure into engine terms.
    pub fn call<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> Result<T, StorageError>,
    ) -> Result<T, EngineError> {
        let mut storage = self.lock()?;
        f(&mut *storage).map_err(EngineError::from_storage)
    }

    /// Attribute subsequent writes to a staff member.
    pub fn set_actor(&self, actor: Option<StaffId>) -> Result<(), EngineError> {
        self.lock()?.set_actor(actor);
        Ok(())
    }

    pub fn get_all<R: Record>(&self, filter: &R::Filter) -> Result<Vec<R>, EngineError>
    where
        SqliteStorage: Gateway<R>,
    {
        self.call(|s| Gateway::<R>::get_all(s, filter))
    }

    pub fn get_by_id<R: Record>(&self, id: R::Id) -> Result<Option<R>, EngineError>
    where
        SqliteStorage: Gateway<R>,
    {
        self.call(|s| Gateway::<R>::get_by_id(s, id))
    }

    pub fn create<R: Record>(&self, draft: R::Draft) -> Result<R, EngineError>
    where
        SqliteStorage: Gateway<R>,
    {
        self.call(|s| Gateway::<R>::create(s, draft))
    }

    pub fn update<R: Record>(&self, id: R::Id, patch: R::Patch) -> Result<R, EngineError>
    where
        SqliteStorage: Gateway<R>,
    {
        self.call(|s| Gateway::<R>::update(s, id, patch))
    }

    pub fn delete<R: Record>(&self, id: R::Id) -> Result<(), EngineError>
    where
        SqliteStorage: Gateway<R>,
    {
        self.call(|s| Gateway::<R>::delete(s, id))
    }
}
