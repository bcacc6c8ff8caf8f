use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::hlc::Hlc;
use crate::ids::{AreaId, DealerId, FarmerId, StaffId, VillageId, ZoneId};
use crate::record::{
    Record, Validate, optional_text, require_text, validate_amount, validate_optional_phone,
    validate_phone,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadQuality {
    Hot,
    Warm,
    Cold,
}

impl LeadQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "hot" => Ok(Self::Hot),
            "warm" => Ok(Self::Warm),
            "cold" => Ok(Self::Cold),
            _ => Err(CoreError::UnknownVariant {
                kind: "lead quality",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LeadQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Telemarketing officer.
    Tmo,
    FieldStaff,
    Manager,
    Admin,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tmo => "tmo",
            Self::FieldStaff => "field_staff",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "tmo" => Ok(Self::Tmo),
            "field_staff" => Ok(Self::FieldStaff),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            _ => Err(CoreError::UnknownVariant {
                kind: "staff role",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Farmer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farmer {
    pub id: FarmerId,
    pub name: String,
    pub father_name: Option<String>,
    pub phone: String,
    pub alternate_phone: Option<String>,
    pub village_id: Option<VillageId>,
    pub area_id: Option<AreaId>,
    pub zone_id: Option<ZoneId>,
    pub land_acres: Option<f64>,
    pub primary_crops: Option<String>,
    pub lead_score: u8,
    pub lead_quality: Option<LeadQuality>,
    pub is_customer: bool,
    pub assigned_tmo_id: Option<StaffId>,
    pub assigned_field_staff_id: Option<StaffId>,
    pub dealer_id: Option<DealerId>,
    pub is_active: bool,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmerDraft {
    pub name: String,
    pub father_name: Option<String>,
    pub phone: String,
    pub alternate_phone: Option<String>,
    pub village_id: Option<VillageId>,
    pub area_id: Option<AreaId>,
    pub zone_id: Option<ZoneId>,
    pub land_acres: Option<f64>,
    pub primary_crops: Option<String>,
    pub lead_score: u8,
    pub lead_quality: Option<LeadQuality>,
    pub is_customer: bool,
    pub assigned_tmo_id: Option<StaffId>,
    pub assigned_field_staff_id: Option<StaffId>,
    pub dealer_id: Option<DealerId>,
}

impl FarmerDraft {
    /// A draft with only the required fields set.
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            father_name: None,
            phone: phone.into(),
            alternate_phone: None,
            village_id: None,
            area_id: None,
            zone_id: None,
            land_acres: None,
            primary_crops: None,
            lead_score: 0,
            lead_quality: None,
            is_customer: false,
            assigned_tmo_id: None,
            assigned_field_staff_id: None,
            dealer_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmerPatch {
    pub name: Option<String>,
    pub father_name: Option<Option<String>>,
    pub phone: Option<String>,
    pub alternate_phone: Option<Option<String>>,
    pub village_id: Option<Option<VillageId>>,
    pub area_id: Option<Option<AreaId>>,
    pub zone_id: Option<Option<ZoneId>>,
    pub land_acres: Option<Option<f64>>,
    pub primary_crops: Option<Option<String>>,
    pub lead_score: Option<u8>,
    pub lead_quality: Option<Option<LeadQuality>>,
    pub is_customer: Option<bool>,
    pub assigned_tmo_id: Option<Option<StaffId>>,
    pub assigned_field_staff_id: Option<Option<StaffId>>,
    pub dealer_id: Option<Option<DealerId>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct FarmerFilter {
    pub zone_id: Option<ZoneId>,
    pub area_id: Option<AreaId>,
    pub village_id: Option<VillageId>,
    pub assigned_tmo_id: Option<StaffId>,
    pub assigned_field_staff_id: Option<StaffId>,
    pub dealer_id: Option<DealerId>,
    pub is_customer: Option<bool>,
    pub lead_quality: Option<LeadQuality>,
    pub is_active: Option<bool>,
}

impl Record for Farmer {
    const TABLE: &'static str = "farmers";

    type Id = FarmerId;
    type Draft = FarmerDraft;
    type Patch = FarmerPatch;
    type Filter = FarmerFilter;

    fn id(&self) -> FarmerId {
        self.id
    }
}

fn validate_lead_score(score: u8) -> Result<(), CoreError> {
    if score > 100 {
        return Err(CoreError::validation("lead_score", format!("must be 0-100, got {score}")));
    }
    Ok(())
}

impl Validate for FarmerDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("name", &self.name)?;
        validate_phone("phone", &self.phone)?;
        validate_optional_phone("alternate_phone", self.alternate_phone.as_deref())?;
        if let Some(acres) = self.land_acres {
            validate_amount("land_acres", acres)?;
        }
        validate_lead_score(self.lead_score)
    }
}

impl Validate for FarmerPatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("name", self.name.as_deref())?;
        if let Some(phone) = &self.phone {
            validate_phone("phone", phone)?;
        }
        if let Some(Some(alt)) = &self.alternate_phone {
            validate_phone("alternate_phone", alt)?;
        }
        if let Some(Some(acres)) = self.land_acres {
            validate_amount("land_acres", acres)?;
        }
        match self.lead_score {
            Some(score) => validate_lead_score(score),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Dealer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dealer {
    pub id: DealerId,
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub zone_id: Option<ZoneId>,
    pub area_id: Option<AreaId>,
    pub is_active: bool,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealerDraft {
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub zone_id: Option<ZoneId>,
    pub area_id: Option<AreaId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealerPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub contact_person: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub zone_id: Option<Option<ZoneId>>,
    pub area_id: Option<Option<AreaId>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct DealerFilter {
    pub zone_id: Option<ZoneId>,
    pub area_id: Option<AreaId>,
    pub is_active: Option<bool>,
}

impl Record for Dealer {
    const TABLE: &'static str = "dealers";

    type Id = DealerId;
    type Draft = DealerDraft;
    type Patch = DealerPatch;
    type Filter = DealerFilter;

    fn id(&self) -> DealerId {
        self.id
    }
}

impl Validate for DealerDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("code", &self.code)?;
        require_text("name", &self.name)?;
        validate_optional_phone("phone", self.phone.as_deref())
    }
}

impl Validate for DealerPatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("code", self.code.as_deref())?;
        optional_text("name", self.name.as_deref())?;
        validate_optional_phone("phone", self.phone.as_ref().and_then(|p| p.as_deref()))
    }
}

// ============================================================================
// Staff
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub employee_code: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: StaffRole,
    pub zone_id: Option<ZoneId>,
    pub is_active: bool,
    pub created_at: Hlc,
    pub updated_at: Hlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffDraft {
    pub employee_code: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: StaffRole,
    pub zone_id: Option<ZoneId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffPatch {
    pub employee_code: Option<String>,
    pub name: Option<String>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub role: Option<StaffRole>,
    pub zone_id: Option<Option<ZoneId>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct StaffFilter {
    pub role: Option<StaffRole>,
    pub zone_id: Option<ZoneId>,
    pub is_active: Option<bool>,
}

impl Record for Staff {
    const TABLE: &'static str = "staff";

    type Id = StaffId;
    type Draft = StaffDraft;
    type Patch = StaffPatch;
    type Filter = StaffFilter;

    fn id(&self) -> StaffId {
        self.id
    }
}

fn validate_email(value: Option<&str>) -> Result<(), CoreError> {
    match value {
        Some(email) => match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(CoreError::validation("email", format!("not an email address: {email}"))),
        },
        None => Ok(()),
    }
}

impl Validate for StaffDraft {
    fn validate(&self) -> Result<(), CoreError> {
        require_text("employee_code", &self.employee_code)?;
        require_text("name", &self.name)?;
        validate_optional_phone("phone", self.phone.as_deref())?;
        validate_email(self.email.as_deref())
    }
}

impl Validate for StaffPatch {
    fn validate(&self) -> Result<(), CoreError> {
        optional_text("employee_code", self.employee_code.as_deref())?;
        optional_text("name", self.name.as_deref())?;
        validate_optional_phone("phone", self.phone.as_ref().and_then(|p| p.as_deref()))?;
        validate_email(self.email.as_ref().and_then(|e| e.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farmer_lead_score_is_bounded() {
        let mut draft = FarmerDraft::new("Ravi Kumar", "9876543210");
        draft.lead_score = 101;
        assert!(draft.validate().is_err());
        draft.lead_score = 100;
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn farmer_patch_checks_only_present_fields() {
        let patch = FarmerPatch {
            phone: Some("abc".into()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
        assert!(FarmerPatch::default().validate().is_ok());
    }

    #[test]
    fn staff_email_needs_domain() {
        let draft = StaffDraft {
            employee_code: "E-7".into(),
            name: "Asha".into(),
            phone: None,
            email: Some("asha@localhost".into()),
            role: StaffRole::Tmo,
            zone_id: None,
            is_active: true,
        };
        assert!(draft.validate().is_err());
    }

    #[test]
    fn role_names_round_trip() {
        for role in [StaffRole::Tmo, StaffRole::FieldStaff, StaffRole::Manager, StaffRole::Admin] {
            assert_eq!(StaffRole::parse(role.as_str()).unwrap(), role);
        }
        assert!(LeadQuality::parse("lukewarm").is_err());
    }
}
