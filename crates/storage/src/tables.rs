//! Column mappings between typed records and their SQLite tables.
//!
//! Rows are parsed field by field into records here; nothing above the
//! storage layer sees an untyped row.

use rusqlite::Row;
use rusqlite::types::Value;

use agrodesk_core::{
    Activity, ActivityType, Area, DataSource, Dealer, Engagement, Farmer, Hlc, LeadQuality,
    LeadStage, Product, Record, Staff, StaffRole, Village, Zone,
    ids::RecordId,
};

use crate::error::StorageError;

pub type Column = (&'static str, Value);

/// How a [`Record`] maps onto its table.
///
/// Every table also carries `id`, `version`, `created_at` and `updated_at`,
/// which the generic gateway manages itself.
pub trait SqlTable: Record {
    const ORDER_BY: &'static str;

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError>;

    fn draft_columns(draft: &Self::Draft) -> Vec<Column>;

    fn patch_columns(patch: &Self::Patch) -> Vec<Column>;

    fn filter_columns(filter: &Self::Filter) -> Vec<Column>;
}

/// Accumulates `(column, value)` pairs, skipping absent optional ones.
#[derive(Default)]
pub(crate) struct Columns(Vec<Column>);

impl Columns {
    pub(crate) fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.0.push((column, value.into()));
        self
    }

    pub(crate) fn maybe(mut self, column: &'static str, value: Option<impl Into<Value>>) -> Self {
        if let Some(v) = value {
            self.0.push((column, v.into()));
        }
        self
    }

    pub(crate) fn into_vec(self) -> Vec<Column> {
        self.0
    }
}

// ============================================================================
// Value helpers
// ============================================================================

pub(crate) fn blob<I: RecordId>(id: &I) -> Value {
    Value::Blob(id.as_bytes().to_vec())
}

pub(crate) fn opt_blob<I: RecordId>(id: Option<I>) -> Value {
    id.map_or(Value::Null, |id| blob(&id))
}

pub(crate) fn opt_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

pub(crate) fn opt_real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

pub(crate) fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub(crate) fn label(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn hlc_value(hlc: &Hlc) -> Value {
    Value::Blob(hlc.to_bytes().to_vec())
}

/// Convert Vec<u8> to fixed-size array with proper error handling.
pub(crate) fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

// ============================================================================
// Row readers
// ============================================================================

pub(crate) fn read_id<I: RecordId>(row: &Row<'_>, column: &str) -> Result<I, StorageError> {
    let bytes: Vec<u8> = row.get(column)?;
    Ok(I::from_bytes(to_array::<16>(bytes, column)?))
}

pub(crate) fn read_opt_id<I: RecordId>(
    row: &Row<'_>,
    column: &str,
) -> Result<Option<I>, StorageError> {
    let bytes: Option<Vec<u8>> = row.get(column)?;
    bytes
        .map(|b| -> Result<I, StorageError> { Ok(I::from_bytes(to_array::<16>(b, column)?)) })
        .transpose()
}

pub(crate) fn read_hlc(row: &Row<'_>, column: &str) -> Result<Hlc, StorageError> {
    let bytes: Vec<u8> = row.get(column)?;
    Ok(Hlc::from_bytes(&to_array::<12>(bytes, column)?))
}

fn read_text(row: &Row<'_>, column: &str) -> Result<String, StorageError> {
    Ok(row.get(column)?)
}

fn read_opt_text(row: &Row<'_>, column: &str) -> Result<Option<String>, StorageError> {
    Ok(row.get(column)?)
}

fn read_flag(row: &Row<'_>, column: &str) -> Result<bool, StorageError> {
    Ok(row.get(column)?)
}

pub(crate) fn read_stage(row: &Row<'_>, column: &str) -> Result<LeadStage, StorageError> {
    Ok(LeadStage::parse(&read_text(row, column)?)?)
}

// ============================================================================
// Geography
// ============================================================================

impl SqlTable for Zone {
    const ORDER_BY: &'static str = "name, code";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Zone {
            id: read_id(row, "id")?,
            code: read_text(row, "code")?,
            name: read_text(row, "name")?,
            description: read_opt_text(row, "description")?,
            is_active: read_flag(row, "is_active")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("code", draft.code.trim().to_string())
            .set("name", draft.name.trim().to_string())
            .set("description", opt_text(draft.description.clone()))
            .set("is_active", draft.is_active)
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("code", patch.code.as_ref().map(|c| c.trim().to_string()))
            .maybe("name", patch.name.as_ref().map(|n| n.trim().to_string()))
            .maybe("description", patch.description.clone().map(opt_text))
            .maybe("is_active", patch.is_active)
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new().maybe("is_active", filter.is_active).into_vec()
    }
}

impl SqlTable for Area {
    const ORDER_BY: &'static str = "name, code";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Area {
            id: read_id(row, "id")?,
            zone_id: read_id(row, "zone_id")?,
            code: read_text(row, "code")?,
            name: read_text(row, "name")?,
            description: read_opt_text(row, "description")?,
            is_active: read_flag(row, "is_active")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("zone_id", blob(&draft.zone_id))
            .set("code", draft.code.trim().to_string())
            .set("name", draft.name.trim().to_string())
            .set("description", opt_text(draft.description.clone()))
            .set("is_active", draft.is_active)
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("zone_id", patch.zone_id.as_ref().map(blob))
            .maybe("code", patch.code.as_ref().map(|c| c.trim().to_string()))
            .maybe("name", patch.name.as_ref().map(|n| n.trim().to_string()))
            .maybe("description", patch.description.clone().map(opt_text))
            .maybe("is_active", patch.is_active)
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("zone_id", filter.zone_id.as_ref().map(blob))
            .maybe("is_active", filter.is_active)
            .into_vec()
    }
}

impl SqlTable for Village {
    const ORDER_BY: &'static str = "name, code";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Village {
            id: read_id(row, "id")?,
            area_id: read_id(row, "area_id")?,
            code: read_text(row, "code")?,
            name: read_text(row, "name")?,
            pincode: read_opt_text(row, "pincode")?,
            is_active: read_flag(row, "is_active")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("area_id", blob(&draft.area_id))
            .set("code", draft.code.trim().to_string())
            .set("name", draft.name.trim().to_string())
            .set("pincode", opt_text(draft.pincode.clone()))
            .set("is_active", draft.is_active)
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("area_id", patch.area_id.as_ref().map(blob))
            .maybe("code", patch.code.as_ref().map(|c| c.trim().to_string()))
            .maybe("name", patch.name.as_ref().map(|n| n.trim().to_string()))
            .maybe("pincode", patch.pincode.clone().map(opt_text))
            .maybe("is_active", patch.is_active)
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("area_id", filter.area_id.as_ref().map(blob))
            .maybe("is_active", filter.is_active)
            .into_vec()
    }
}

// ============================================================================
// People
// ============================================================================

impl SqlTable for Farmer {
    const ORDER_BY: &'static str = "name, created_at";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        let lead_score: i64 = row.get("lead_score")?;
        let lead_score = u8::try_from(lead_score)
            .map_err(|_| StorageError::Serialization(format!("lead_score out of range: {lead_score}")))?;
        let lead_quality = read_opt_text(row, "lead_quality")?
            .map(|q| LeadQuality::parse(&q))
            .transpose()?;
        Ok(Farmer {
            id: read_id(row, "id")?,
            name: read_text(row, "name")?,
            father_name: read_opt_text(row, "father_name")?,
            phone: read_text(row, "phone")?,
            alternate_phone: read_opt_text(row, "alternate_phone")?,
            village_id: read_opt_id(row, "village_id")?,
            area_id: read_opt_id(row, "area_id")?,
            zone_id: read_opt_id(row, "zone_id")?,
            land_acres: row.get("land_acres")?,
            primary_crops: read_opt_text(row, "primary_crops")?,
            lead_score,
            lead_quality,
            is_customer: read_flag(row, "is_customer")?,
            assigned_tmo_id: read_opt_id(row, "assigned_tmo_id")?,
            assigned_field_staff_id: read_opt_id(row, "assigned_field_staff_id")?,
            dealer_id: read_opt_id(row, "dealer_id")?,
            is_active: read_flag(row, "is_active")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("name", draft.name.trim().to_string())
            .set("father_name", opt_text(draft.father_name.clone()))
            .set("phone", draft.phone.trim().to_string())
            .set("alternate_phone", opt_text(draft.alternate_phone.clone()))
            .set("village_id", opt_blob(draft.village_id))
            .set("area_id", opt_blob(draft.area_id))
            .set("zone_id", opt_blob(draft.zone_id))
            .set("land_acres", opt_real(draft.land_acres))
            .set("primary_crops", opt_text(draft.primary_crops.clone()))
            .set("lead_score", i64::from(draft.lead_score))
            .set("lead_quality", opt_text(draft.lead_quality.map(|q| q.as_str().to_string())))
            .set("is_customer", draft.is_customer)
            .set("assigned_tmo_id", opt_blob(draft.assigned_tmo_id))
            .set("assigned_field_staff_id", opt_blob(draft.assigned_field_staff_id))
            .set("dealer_id", opt_blob(draft.dealer_id))
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("name", patch.name.as_ref().map(|n| n.trim().to_string()))
            .maybe("father_name", patch.father_name.clone().map(opt_text))
            .maybe("phone", patch.phone.as_ref().map(|p| p.trim().to_string()))
            .maybe("alternate_phone", patch.alternate_phone.clone().map(opt_text))
            .maybe("village_id", patch.village_id.map(opt_blob))
            .maybe("area_id", patch.area_id.map(opt_blob))
            .maybe("zone_id", patch.zone_id.map(opt_blob))
            .maybe("land_acres", patch.land_acres.map(opt_real))
            .maybe("primary_crops", patch.primary_crops.clone().map(opt_text))
            .maybe("lead_score", patch.lead_score.map(i64::from))
            .maybe(
                "lead_quality",
                patch
                    .lead_quality
                    .map(|q| opt_text(q.map(|q| q.as_str().to_string()))),
            )
            .maybe("is_customer", patch.is_customer)
            .maybe("assigned_tmo_id", patch.assigned_tmo_id.map(opt_blob))
            .maybe("assigned_field_staff_id", patch.assigned_field_staff_id.map(opt_blob))
            .maybe("dealer_id", patch.dealer_id.map(opt_blob))
            .maybe("is_active", patch.is_active)
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("zone_id", filter.zone_id.as_ref().map(blob))
            .maybe("area_id", filter.area_id.as_ref().map(blob))
            .maybe("village_id", filter.village_id.as_ref().map(blob))
            .maybe("assigned_tmo_id", filter.assigned_tmo_id.as_ref().map(blob))
            .maybe(
                "assigned_field_staff_id",
                filter.assigned_field_staff_id.as_ref().map(blob),
            )
            .maybe("dealer_id", filter.dealer_id.as_ref().map(blob))
            .maybe("is_customer", filter.is_customer)
            .maybe("lead_quality", filter.lead_quality.map(|q| label(q.as_str())))
            .maybe("is_active", filter.is_active)
            .into_vec()
    }
}

impl SqlTable for Dealer {
    const ORDER_BY: &'static str = "name, code";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Dealer {
            id: read_id(row, "id")?,
            code: read_text(row, "code")?,
            name: read_text(row, "name")?,
            contact_person: read_opt_text(row, "contact_person")?,
            phone: read_opt_text(row, "phone")?,
            zone_id: read_opt_id(row, "zone_id")?,
            area_id: read_opt_id(row, "area_id")?,
            is_active: read_flag(row, "is_active")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("code", draft.code.trim().to_string())
            .set("name", draft.name.trim().to_string())
            .set("contact_person", opt_text(draft.contact_person.clone()))
            .set("phone", opt_text(draft.phone.clone()))
            .set("zone_id", opt_blob(draft.zone_id))
            .set("area_id", opt_blob(draft.area_id))
            .set("is_active", draft.is_active)
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("code", patch.code.as_ref().map(|c| c.trim().to_string()))
            .maybe("name", patch.name.as_ref().map(|n| n.trim().to_string()))
            .maybe("contact_person", patch.contact_person.clone().map(opt_text))
            .maybe("phone", patch.phone.clone().map(opt_text))
            .maybe("zone_id", patch.zone_id.map(opt_blob))
            .maybe("area_id", patch.area_id.map(opt_blob))
            .maybe("is_active", patch.is_active)
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("zone_id", filter.zone_id.as_ref().map(blob))
            .maybe("area_id", filter.area_id.as_ref().map(blob))
            .maybe("is_active", filter.is_active)
            .into_vec()
    }
}

impl SqlTable for Staff {
    const ORDER_BY: &'static str = "name, employee_code";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Staff {
            id: read_id(row, "id")?,
            employee_code: read_text(row, "employee_code")?,
            name: read_text(row, "name")?,
            phone: read_opt_text(row, "phone")?,
            email: read_opt_text(row, "email")?,
            role: StaffRole::parse(&read_text(row, "role")?)?,
            zone_id: read_opt_id(row, "zone_id")?,
            is_active: read_flag(row, "is_active")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("employee_code", draft.employee_code.trim().to_string())
            .set("name", draft.name.trim().to_string())
            .set("phone", opt_text(draft.phone.clone()))
            .set("email", opt_text(draft.email.clone()))
            .set("role", label(draft.role.as_str()))
            .set("zone_id", opt_blob(draft.zone_id))
            .set("is_active", draft.is_active)
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe(
                "employee_code",
                patch.employee_code.as_ref().map(|c| c.trim().to_string()),
            )
            .maybe("name", patch.name.as_ref().map(|n| n.trim().to_string()))
            .maybe("phone", patch.phone.clone().map(opt_text))
            .maybe("email", patch.email.clone().map(opt_text))
            .maybe("role", patch.role.map(|r| label(r.as_str())))
            .maybe("zone_id", patch.zone_id.map(opt_blob))
            .maybe("is_active", patch.is_active)
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("role", filter.role.map(|r| label(r.as_str())))
            .maybe("zone_id", filter.zone_id.as_ref().map(blob))
            .maybe("is_active", filter.is_active)
            .into_vec()
    }
}

// ============================================================================
// Catalog and engagements
// ============================================================================

impl SqlTable for Product {
    const ORDER_BY: &'static str = "name, code";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Product {
            id: read_id(row, "id")?,
            code: read_text(row, "code")?,
            name: read_text(row, "name")?,
            category: read_opt_text(row, "category")?,
            unit: read_opt_text(row, "unit")?,
            is_active: read_flag(row, "is_active")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("code", draft.code.trim().to_string())
            .set("name", draft.name.trim().to_string())
            .set("category", opt_text(draft.category.clone()))
            .set("unit", opt_text(draft.unit.clone()))
            .set("is_active", draft.is_active)
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("code", patch.code.as_ref().map(|c| c.trim().to_string()))
            .maybe("name", patch.name.as_ref().map(|n| n.trim().to_string()))
            .maybe("category", patch.category.clone().map(opt_text))
            .maybe("unit", patch.unit.clone().map(opt_text))
            .maybe("is_active", patch.is_active)
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("category", filter.category.clone())
            .maybe("is_active", filter.is_active)
            .into_vec()
    }
}

impl SqlTable for Engagement {
    const ORDER_BY: &'static str = "created_at DESC";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Engagement {
            id: read_id(row, "id")?,
            farmer_id: read_id(row, "farmer_id")?,
            product_id: read_id(row, "product_id")?,
            season: read_text(row, "season")?,
            data_source: DataSource::parse(&read_text(row, "data_source")?)?,
            lead_stage: read_stage(row, "lead_stage")?,
            assigned_tmo_id: read_opt_id(row, "assigned_tmo_id")?,
            is_active: read_flag(row, "is_active")?,
            total_purchases: row.get("total_purchases")?,
            closure_reason: read_opt_text(row, "closure_reason")?,
            notes: read_opt_text(row, "notes")?,
            version: row.get("version")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        let stage = draft.initial_stage();
        Columns::new()
            .set("farmer_id", blob(&draft.farmer_id))
            .set("product_id", blob(&draft.product_id))
            .set("season", draft.season.trim().to_string())
            .set("data_source", label(draft.data_source.as_str()))
            .set("lead_stage", label(stage.as_str()))
            .set("assigned_tmo_id", opt_blob(draft.assigned_tmo_id))
            .set("is_active", !stage.is_terminal())
            .set("notes", opt_text(draft.notes.clone()))
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("season", patch.season.as_ref().map(|s| s.trim().to_string()))
            .maybe("data_source", patch.data_source.map(|s| label(s.as_str())))
            .maybe("assigned_tmo_id", patch.assigned_tmo_id.map(opt_blob))
            .maybe("notes", patch.notes.clone().map(opt_text))
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("farmer_id", filter.farmer_id.as_ref().map(blob))
            .maybe("product_id", filter.product_id.as_ref().map(blob))
            .maybe("season", filter.season.clone())
            .maybe("lead_stage", filter.lead_stage.map(|s| label(s.as_str())))
            .maybe("assigned_tmo_id", filter.assigned_tmo_id.as_ref().map(blob))
            .maybe("is_active", filter.is_active)
            .maybe("data_source", filter.data_source.map(|s| label(s.as_str())))
            .into_vec()
    }
}

impl SqlTable for Activity {
    const ORDER_BY: &'static str = "created_at DESC";

    fn from_row(row: &Row<'_>) -> Result<Self, StorageError> {
        Ok(Activity {
            id: read_id(row, "id")?,
            engagement_id: read_id(row, "engagement_id")?,
            farmer_id: read_id(row, "farmer_id")?,
            activity_type: ActivityType::parse(&read_text(row, "activity_type")?)?,
            outcome: read_opt_text(row, "outcome")?,
            performed_by: read_opt_id(row, "performed_by")?,
            follow_up_at: row.get("follow_up_at")?,
            created_at: read_hlc(row, "created_at")?,
            updated_at: read_hlc(row, "updated_at")?,
        })
    }

    fn draft_columns(draft: &Self::Draft) -> Vec<Column> {
        Columns::new()
            .set("engagement_id", blob(&draft.engagement_id))
            .set("farmer_id", blob(&draft.farmer_id))
            .set("activity_type", label(draft.activity_type.as_str()))
            .set("outcome", opt_text(draft.outcome.clone()))
            .set("performed_by", opt_blob(draft.performed_by))
            .set("follow_up_at", opt_int(draft.follow_up_at))
            .into_vec()
    }

    fn patch_columns(patch: &Self::Patch) -> Vec<Column> {
        Columns::new()
            .maybe("activity_type", patch.activity_type.map(|t| label(t.as_str())))
            .maybe("outcome", patch.outcome.clone().map(opt_text))
            .maybe("follow_up_at", patch.follow_up_at.map(opt_int))
            .into_vec()
    }

    fn filter_columns(filter: &Self::Filter) -> Vec<Column> {
        Columns::new()
            .maybe("engagement_id", filter.engagement_id.as_ref().map(blob))
            .maybe("farmer_id", filter.farmer_id.as_ref().map(blob))
            .maybe("performed_by", filter.performed_by.as_ref().map(blob))
            .maybe("activity_type", filter.activity_type.map(|t| label(t.as_str())))
            .into_vec()
    }
}
