pub mod client;
pub mod config;
pub mod confirm;
pub mod error;
pub mod export;
pub mod forms;
pub mod lifecycle;
pub mod logging;
pub mod notice;
pub mod views;

pub use client::Client;
pub use config::{BackofficeConfig, ConfigError};
pub use confirm::{AlwaysConfirm, Confirm};
pub use error::{EngineError, ServiceError};
pub use export::{Directory, ExportArtifact, ExportError, ExportFormat, Table};
pub use forms::{AreaForm, SelectOption};
pub use lifecycle::EngagementManager;
pub use notice::{Notice, NoticeLevel, NoticeStyle};
pub use views::{DeleteOutcome, ListView, LoadOutcome, Scope, SyncPolicy, ViewState};

use std::path::PathBuf;

use agrodesk_core::{Engagement, EngagementFilter, Farmer, FarmerFilter, Record};
use agrodesk_storage::{Gateway, SqliteStorage};

/// Application root: one backend client plus the configuration every
/// component is built from.
pub struct Backoffice {
    config: BackofficeConfig,
    client: Client,
}

impl Backoffice {
    pub fn open(config: BackofficeConfig) -> Result<Self, EngineError> {
        let client = Client::open(&config)?;
        Ok(Self { config, client })
    }

    pub fn with_client(config: BackofficeConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &BackofficeConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn engagements(&self) -> EngagementManager {
        EngagementManager::new(self.client.clone(), self.config.transition_policy)
    }

    pub fn view<R: Record>(&self, filter: R::Filter, policy: SyncPolicy) -> ListView<R>
    where
        SqliteStorage: Gateway<R>,
    {
        ListView::new(self.client.clone(), filter, policy)
    }

    /// Farmer list; writes are spliced into the loaded rows.
    pub fn farmer_view(&self, filter: FarmerFilter) -> ListView<Farmer> {
        self.view(filter, SyncPolicy::PatchLocal)
    }

    /// Engagement list; writes reload it so stage counts stay consistent.
    pub fn engagement_view(&self, filter: EngagementFilter) -> ListView<Engagement> {
        self.view(filter, SyncPolicy::Refetch)
    }

    pub fn directory(&self) -> Result<Directory, EngineError> {
        Directory::load(&self.client)
    }

    /// Render `table` and write it into the configured export directory.
    pub fn export(&self, table: &Table, format: ExportFormat) -> Result<PathBuf, EngineError> {
        let artifact = table.export(format)?;
        Ok(artifact.write_to(&self.config.export.directory)?)
    }

    pub fn export_farmers(&self, farmers: &[Farmer], format: ExportFormat) -> Result<PathBuf, EngineError> {
        let table = export::farmer_table(farmers, &self.directory()?);
        self.export(&table, format)
    }

    pub fn export_engagements(
        &self,
        engagements: &[Engagement],
        format: ExportFormat,
    ) -> Result<PathBuf, EngineError> {
        let table = export::engagement_table(engagements, &self.directory()?);
        self.export(&table, format)
    }
}
