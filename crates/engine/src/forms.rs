//! Select options and the area form.

use agrodesk_core::{
    Area, AreaDraft, AreaFilter, AreaId, Dealer, DealerFilter, DealerId, Product, ProductFilter,
    ProductId, Staff, StaffFilter, StaffId, StaffRole, Village, VillageFilter, VillageId, Zone,
    ZoneFilter, ZoneId,
};

use crate::client::Client;
use crate::error::EngineError;

/// One entry of a select input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption<I> {
    pub value: I,
    pub label: String,
}

impl<I> SelectOption<I> {
    fn new(value: I, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }
}

/// Active zones only; inactive zones cannot take new areas.
pub fn zone_options(client: &Client) -> Result<Vec<SelectOption<ZoneId>>, EngineError> {
    let zones: Vec<Zone> = client.get_all(&ZoneFilter {
        is_active: Some(true),
    })?;
    Ok(zones.into_iter().map(|z| SelectOption::new(z.id, z.name)).collect())
}

pub fn area_options(client: &Client, zone_id: ZoneId) -> Result<Vec<SelectOption<AreaId>>, EngineError> {
    let areas: Vec<Area> = client.get_all(&AreaFilter {
        zone_id: Some(zone_id),
        is_active: Some(true),
    })?;
    Ok(areas.into_iter().map(|a| SelectOption::new(a.id, a.name)).collect())
}

pub fn village_options(
    client: &Client,
    area_id: AreaId,
) -> Result<Vec<SelectOption<VillageId>>, EngineError> {
    let villages: Vec<Village> = client.get_all(&VillageFilter {
        area_id: Some(area_id),
        is_active: Some(true),
    })?;
    Ok(villages
        .into_iter()
        .map(|v| {
            let label = match &v.pincode {
                Some(pin) => format!("{} ({pin})", v.name),
                None => v.name.clone(),
            };
            SelectOption::new(v.id, label)
        })
        .collect())
}

/// Active staff, optionally narrowed to one role (e.g. TMOs for assignment).
pub fn staff_options(
    client: &Client,
    role: Option<StaffRole>,
) -> Result<Vec<SelectOption<StaffId>>, EngineError> {
    let staff: Vec<Staff> = client.get_all(&StaffFilter {
        role,
        zone_id: None,
        is_active: Some(true),
    })?;
    Ok(staff
        .into_iter()
        .map(|s| SelectOption::new(s.id, format!("{} ({})", s.name, s.employee_code)))
        .collect())
}

pub fn dealer_options(client: &Client) -> Result<Vec<SelectOption<DealerId>>, EngineError> {
    let dealers: Vec<Dealer> = client.get_all(&DealerFilter {
        is_active: Some(true),
        ..Default::default()
    })?;
    Ok(dealers.into_iter().map(|d| SelectOption::new(d.id, d.name)).collect())
}

pub fn product_options(client: &Client) -> Result<Vec<SelectOption<ProductId>>, EngineError> {
    let products: Vec<Product> = client.get_all(&ProductFilter {
        category: None,
        is_active: Some(true),
    })?;
    Ok(products
        .into_iter()
        .map(|p| SelectOption::new(p.id, p.name))
        .collect())
}

/// New-area form. The zone selector is filled from [`zone_options`] when the
/// form is opened, and submit re-checks the chosen zone against it.
#[derive(Debug, Clone)]
pub struct AreaForm {
    pub zones: Vec<SelectOption<ZoneId>>,
    pub zone_id: Option<ZoneId>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

impl AreaForm {
    pub fn open(client: &Client) -> Result<Self, EngineError> {
        Ok(Self {
            zones: zone_options(client)?,
            zone_id: None,
            code: String::new(),
            name: String::new(),
            description: None,
            is_active: true,
        })
    }

    pub fn submit(&self, client: &Client) -> Result<Area, EngineError> {
        let zone_id = self.zone_id.ok_or_else(|| EngineError::NotSelectable {
            field: "zone_id",
            reason: "select a zone".to_string(),
        })?;
        if !self.zones.iter().any(|o| o.value == zone_id) {
            return Err(EngineError::NotSelectable {
                field: "zone_id",
                reason: format!("zone {zone_id} is not active"),
            });
        }
        let area: Area = client.create(AreaDraft {
            zone_id,
            code: self.code.trim().to_string(),
            name: self.name.trim().to_string(),
            description: self.description.clone().filter(|d| !d.trim().is_empty()),
            is_active: self.is_active,
        })?;
        tracing::info!(area = %area.id, zone = %zone_id, "area created");
        Ok(area)
    }
}
