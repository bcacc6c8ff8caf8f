use agrodesk_core::{
    Engagement, EngagementFilter, EngagementId, EngagementStats, Hlc, Record, StageChange,
    StageTransition, StaffId,
    ids::AuditId,
};

use crate::error::StorageError;

/// The uniform per-table contract every list and form screen talks to.
pub trait Gateway<R: Record> {
    /// Every row matching the filter's equality predicates, unpaginated.
    fn get_all(&self, filter: &R::Filter) -> Result<Vec<R>, StorageError>;

    fn get_by_id(&self, id: R::Id) -> Result<Option<R>, StorageError>;

    fn create(&mut self, draft: R::Draft) -> Result<R, StorageError>;

    fn update(&mut self, id: R::Id, patch: R::Patch) -> Result<R, StorageError>;

    fn delete(&mut self, id: R::Id) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    StageChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::StageChange => "stage_change",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "stage_change" => Ok(Self::StageChange),
            _ => Err(StorageError::Serialization(format!("unknown audit action: {s}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub audit_id: AuditId,
    pub table: String,
    pub record_id: [u8; 16],
    pub action: AuditAction,
    pub actor: Option<StaffId>,
    pub at: Hlc,
    /// MessagePack encoding of the submitted draft or patch.
    pub payload: Option<Vec<u8>>,
}

impl AuditEntry {
    pub fn decode_payload<T: serde::de::DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        self.payload
            .as_deref()
            .map(|bytes| {
                rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }
}

/// Engagement lifecycle and audit queries that don't fit the per-table contract.
pub trait Storage {
    /// Staff member recorded on subsequent audit entries.
    fn set_actor(&mut self, actor: Option<StaffId>);

    fn actor(&self) -> Option<StaffId>;

    /// Write a lifecycle change and its history row in one transaction.
    /// Fails with [`StorageError::VersionConflict`] if the row moved on since
    /// `change.expected_version` was read.
    fn apply_stage_change(&mut self, change: &StageChange) -> Result<Engagement, StorageError>;

    fn stage_history(&self, engagement_id: EngagementId) -> Result<Vec<StageTransition>, StorageError>;

    fn engagement_stats(&self, filter: &EngagementFilter) -> Result<EngagementStats, StorageError>;

    fn audit_entries(
        &self,
        table: &str,
        record_id: &[u8; 16],
    ) -> Result<Vec<AuditEntry>, StorageError>;
}
