use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::hlc::Hlc;
use crate::ids::{ActivityId, EngagementId, FarmerId, ProductId, StaffId, TransitionId};
use crate::lead_stage::LeadStage;
use crate::record::{Record, Validate, optional_text, require_text, validate_amount};

/// Where an engagement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Manual,
    Import,
    Campaign,
    Referral,
}

impl DataSource {
    pub const ALL: [DataSource; 4] = [Self::Manual, Self::Import, Self::Campaign, Self::Referral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Import => "import",
            Self::Campaign => "campaign",
            Self::Referral => "referral",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "data source",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: EngagementId,
    pub farmer_id: FarmerId,
    pub product_id: ProductId,
    pub season: String,
    pub data_source: DataSource,
    pub lead_stage: LeadStage,
    pub assigned_tmo_id: Option<StaffId>,
    pub is_active: bool,
    pub total_purchases: Option<f64>,
    pub closure_reason: Option<String>,
    pub notes: Option<String>,
    /// Bumped on every write; stage changes are conditional on it.
    pub version: i64,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementDraft {
    pub farmer_id: FarmerId,
    pub product_id: ProductId,
    pub season: String,
    pub data_source: DataSource,
    /// Starting stage; imports may enter mid-funnel. Defaults to `new`.
    pub lead_stage: Option<LeadStage>,
    pub assigned_tmo_id: Option<StaffId>,
    pub notes: Option<String>,
}

impl EngagementDraft {
    pub fn new(
        farmer_id: FarmerId,
        product_id: ProductId,
        season: impl Into<String>,
        data_source: DataSource,
    ) -> Self {
        Self {
            farmer_id,
            product_id,
            season: season.into(),
            data_source,
            lead_stage: None,
            assigned_tmo_id: None,
            notes: None,
        }
    }

    pub fn initial_stage(&self) -> LeadStage {
        self.lead_stage.unwrap_or(LeadStage::New)
    }
}

/// Free edits of an engagement. Stage, activity flag, purchases and closure
/// reason only change through the lifecycle operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementPatch {
    pub season: Option<String>,
    pub data_source: Option<DataSource>,
    pub assigned_tmo_id: Option<Option<StaffId>>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct EngagementFilter {
    pub farmer_id: Option<FarmerId>,
    pub product_id: Option<ProductId>,
    pub season: Option<String>,
    pub lead_stage: Option<LeadStage>,
    pub assigned_tmo_id: Option<StaffId>,
    pub is_active: Option<bool>,
    pub data_source: Option<DataSource>,
}

impl Record for Engagement {
    const TABLE: &'static str = "engagements";

    type Id = EngagementId;
    type Draft = EngagementDraft;
    type Patch = EngagementPatch;
    type Filter = EngagementFilter;

    fn id(&self) -> EngagementId {
        self.id
    }
}

impl Validate for EngagementDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("season", &self.season)
    }
}

impl Validate for EngagementPatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("season", self.season.as_deref())
    }
}

/// One lifecycle write against an engagement, applied atomically together
/// with its [`StageTransition`] row.
#[derive(Debug, Clone)]
pub struct StageChange {
    pub engagement_id: EngagementId,
    /// Version the change was computed against.
    pub expected_version: i64,
    pub from: LeadStage,
    pub to: LeadStage,
    pub is_active: bool,
    /// `Some(None)` clears the amount, `None` leaves it untouched.
    pub total_purchases: Option<Option<f64>>,
    /// `Some(None)` clears the reason, `None` leaves it untouched.
    pub closure_reason: Option<Option<String>>,
    pub actor: Option<StaffId>,
    pub reason: Option<String>,
}

impl StageChange {
    /// Whether the change writes a history row (the stage actually moves).
    pub fn moves_stage(&self) -> bool {
        self.from != self.to
    }
}

impl Validate for StageChange {
    fn validate(&self) -> Result<(), CoreError> {
        if let Some(Some(total)) = self.total_purchases {
            validate_amount("total_purchases", total)?;
        }
        if let Some(Some(reason)) = &self.closure_reason {
            require_text("closure_reason", reason)?;
        }
        if self.is_active && self.to.is_terminal() {
            return Err(CoreError::validation(
                "is_active",
                format!("{} is terminal", self.to),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    pub id: TransitionId,
    pub engagement_id: EngagementId,
    pub from_stage: LeadStage,
    pub to_stage: LeadStage,
    pub actor: Option<StaffId>,
    pub reason: Option<String>,
    pub at: Hlc,
}

/// Aggregate counts over a filtered set of engagements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngagementStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub by_stage: BTreeMap<LeadStage, u64>,
    pub total_purchases: f64,
}

impl EngagementStats {
    pub fn count(&self, stage: LeadStage) -> u64 {
        self.by_stage.get(&stage).copied().unwrap_or(0)
    }

    /// Converted plus active customers.
    pub fn converted(&self) -> u64 {
        self.count(LeadStage::Converted) + self.count(LeadStage::ActiveCustomer)
    }

    pub fn conversion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.converted() as f64 / self.total as f64
        }
    }
}

// ============================================================================
// Activities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Call,
    Sms,
    Visit,
    Meeting,
    Demo,
    FollowUp,
    Note,
}

impl ActivityType {
    pub const ALL: [ActivityType; 7] = [
        Self::Call,
        Self::Sms,
        Self::Visit,
        Self::Meeting,
        Self::Demo,
        Self::FollowUp,
        Self::Note,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Sms => "sms",
            Self::Visit => "visit",
            Self::Meeting => "meeting",
            Self::Demo => "demo",
            Self::FollowUp => "follow_up",
            Self::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "activity type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub engagement_id: EngagementId,
    pub farmer_id: FarmerId,
    pub activity_type: ActivityType,
    pub outcome: Option<String>,
    pub performed_by: Option<StaffId>,
    /// Follow-up time, milliseconds since Unix epoch.
    pub follow_up_at: Option<i64>,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDraft {
    pub engagement_id: EngagementId,
    pub farmer_id: FarmerId,
    pub activity_type: ActivityType,
    pub outcome: Option<String>,
    pub performed_by: Option<StaffId>,
    pub follow_up_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
    pub activity_type: Option<ActivityType>,
    pub outcome: Option<Option<String>>,
    pub follow_up_at: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub engagement_id: Option<EngagementId>,
    pub farmer_id: Option<FarmerId>,
    pub performed_by: Option<StaffId>,
    pub activity_type: Option<ActivityType>,
}

impl Record for Activity {
    const TABLE: &'static str = "activities";

    type Id = ActivityId;
    type Draft = ActivityDraft;
    type Patch = ActivityPatch;
    type Filter = ActivityFilter;

    fn id(&self) -> ActivityId {
        self.id
    }
}

impl Validate for ActivityDraft {
    fn validate(&self) -> Result<(), CoreError> {
        if self.follow_up_at.is_some_and(|at| at < 0) {
            return Err(CoreError::validation("follow_up_at", "before epoch"));
        }
        Ok(())
    }
}

impl Validate for ActivityPatch {
    fn validate(&self) -> Result<(), CoreError> {
        if matches!(self.follow_up_at, Some(Some(at)) if at < 0) {
            return Err(CoreError::validation("follow_up_at", "before epoch"));
        }
        Ok(())
    }
}
