use std::path::PathBuf;

use agrodesk_core::TransitionPolicy;
use agrodesk_engine::{BackofficeConfig, Client};
use tempfile::TempDir;

use crate::TestBackoffice;

/// One SQLite file opened by several independent back offices, the way
/// several operators share a hosted database.
pub struct SharedDatabase {
    dir: TempDir,
    offices: Vec<TestBackoffice>,
}

impl SharedDatabase {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            offices: Vec::new(),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("agrodesk.db")
    }

    /// Open another connection on the shared file.
    pub fn add_office(&mut self, policy: TransitionPolicy) -> Result<usize, Box<dyn std::error::Error>> {
        let mut config = BackofficeConfig::default();
        config.database.path = Some(self.path());
        let client = Client::open(&config)?;
        let index = self.offices.len();
        self.offices.push(TestBackoffice::attach(client, policy)?);
        Ok(index)
    }

    pub fn office(&self, index: usize) -> &TestBackoffice {
        &self.offices[index]
    }
}
