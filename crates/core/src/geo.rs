use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::hlc::Hlc;
use crate::ids::{AreaId, VillageId, ZoneId};
use crate::record::{Record, Validate, optional_text, require_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDraft {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZonePatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ZoneFilter {
    pub is_active: Option<bool>,
}

impl Record for Zone {
    const TABLE: &'static str = "zones";

    type Id = ZoneId;
    type Draft = ZoneDraft;
    type Patch = ZonePatch;
    type Filter = ZoneFilter;

    fn id(&self) -> ZoneId {
        self.id
    }
}

impl Validate for ZoneDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("code", &self.code)?;
        require_text("name", &self.name)
    }
}

impl Validate for ZonePatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("code", self.code.as_deref())?;
        optional_text("name", self.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub zone_id: ZoneId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaDraft {
    pub zone_id: ZoneId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaPatch {
    pub zone_id: Option<ZoneId>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct AreaFilter {
    pub zone_id: Option<ZoneId>,
    pub is_active: Option<bool>,
}

impl Record for Area {
    const TABLE: &'static str = "areas";

    type Id = AreaId;
    type Draft = AreaDraft;
    type Patch = AreaPatch;
    type Filter = AreaFilter;

    fn id(&self) -> AreaId {
        self.id
    }
}

impl Validate for AreaDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("code", &self.code)?;
        require_text("name", &self.name)
    }
}

impl Validate for AreaPatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("code", self.code.as_deref())?;
        optional_text("name", self.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Village {
    pub id: VillageId,
    pub area_id: AreaId,
    pub code: String,
    pub name: String,
    pub pincode: Option<String>,
    pub is_active: bool,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillageDraft {
    pub area_id: AreaId,
    pub code: String,
    pub name: String,
    pub pincode: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VillagePatch {
    pub area_id: Option<AreaId>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub pincode: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct VillageFilter {
    pub area_id: Option<AreaId>,
    pub is_active: Option<bool>,
}

impl Record for Village {
    const TABLE: &'static str = "villages";

    type Id = VillageId;
    type Draft = VillageDraft;
    type Patch = VillagePatch;
    type Filter = VillageFilter;

    fn id(&self) -> VillageId {
        self.id
    }
}

fn validate_pincode(value: Option<&str>) -> Result<(), CoreError> {
    match value {
        Some(p) if p.len() != 6 || !p.chars().all(|c| c.is_ascii_digit()) => Err(
            CoreError::validation("pincode", format!("expected six digits, got {p:?}")),
        ),
        _ => Ok(()),
    }
}

impl Validate for VillageDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("code", &self.code)?;
        require_text("name", &self.name)?;
        validate_pincode(self.pincode.as_deref())
    }
}

impl Validate for VillagePatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("code", self.code.as_deref())?;
        optional_text("name", self.name.as_deref())?;
        validate_pincode(self.pincode.as_ref().and_then(|p| p.as_deref()))
    }
}
