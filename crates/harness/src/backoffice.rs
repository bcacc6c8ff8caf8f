use agrodesk_core::{
    Area, AreaDraft, DataSource, Dealer, DealerDraft, Engagement, EngagementDraft, Farmer,
    FarmerDraft, LeadStage, Product, ProductDraft, Staff, StaffDraft, StaffRole, TransitionPolicy,
    Village, VillageDraft, Zone, ZoneDraft, ZoneId,
};
use agrodesk_engine::{Backoffice, BackofficeConfig, Client, EngagementManager, EngineError};
use tempfile::TempDir;

/// An in-memory back office with an isolated export directory, plus
/// shortcuts for seeding reference data.
pub struct TestBackoffice {
    pub backoffice: Backoffice,
    _export_dir: TempDir,
}

impl TestBackoffice {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_policy(TransitionPolicy::Strict)
    }

    pub fn with_policy(policy: TransitionPolicy) -> Result<Self, Box<dyn std::error::Error>> {
        let export_dir = tempfile::tempdir()?;
        let mut config = BackofficeConfig {
            transition_policy: policy,
            ..Default::default()
        };
        config.export.directory = export_dir.path().join("exports");
        Ok(Self {
            backoffice: Backoffice::open(config)?,
            _export_dir: export_dir,
        })
    }

    /// Attach to an existing client, e.g. a second handle on a shared file.
    pub fn attach(client: Client, policy: TransitionPolicy) -> Result<Self, Box<dyn std::error::Error>> {
        let export_dir = tempfile::tempdir()?;
        let mut config = BackofficeConfig {
            transition_policy: policy,
            ..Default::default()
        };
        config.export.directory = export_dir.path().join("exports");
        Ok(Self {
            backoffice: Backoffice::with_client(config, client),
            _export_dir: export_dir,
        })
    }

    pub fn client(&self) -> &Client {
        self.backoffice.client()
    }

    pub fn engagements(&self) -> EngagementManager {
        self.backoffice.engagements()
    }

    /// Files written by exports so far.
    pub fn exported_files(&self) -> Vec<std::path::PathBuf> {
        let dir = self.backoffice.config().export.directory.clone();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut files: Vec<_> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        files.sort();
        files
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    pub fn seed_zone(&self, code: &str, name: &str, is_active: bool) -> Result<Zone, EngineError> {
        self.client().create(ZoneDraft {
            code: code.into(),
            name: name.into(),
            description: None,
            is_active,
        })
    }

    pub fn seed_area(&self, zone: &Zone, code: &str, name: &str) -> Result<Area, EngineError> {
        self.client().create(AreaDraft {
            zone_id: zone.id,
            code: code.into(),
            name: name.into(),
            description: None,
            is_active: true,
        })
    }

    pub fn seed_village(&self, area: &Area, code: &str, name: &str) -> Result<Village, EngineError> {
        self.client().create(VillageDraft {
            area_id: area.id,
            code: code.into(),
            name: name.into(),
            pincode: None,
            is_active: true,
        })
    }

    pub fn seed_staff(
        &self,
        employee_code: &str,
        name: &str,
        role: StaffRole,
        zone_id: Option<ZoneId>,
    ) -> Result<Staff, EngineError> {
        self.client().create(StaffDraft {
            employee_code: employee_code.into(),
            name: name.into(),
            phone: None,
            email: None,
            role,
            zone_id,
            is_active: true,
        })
    }

    pub fn seed_dealer(&self, code: &str, name: &str) -> Result<Dealer, EngineError> {
        self.client().create(DealerDraft {
            code: code.into(),
            name: name.into(),
            contact_person: None,
            phone: None,
            zone_id: None,
            area_id: None,
            is_active: true,
        })
    }

    pub fn seed_product(&self, code: &str, name: &str) -> Result<Product, EngineError> {
        self.client().create(ProductDraft {
            code: code.into(),
            name: name.into(),
            category: None,
            unit: None,
            is_active: true,
        })
    }

    pub fn seed_farmer(&self, name: &str, phone: &str) -> Result<Farmer, EngineError> {
        self.client().create(FarmerDraft::new(name, phone))
    }

    /// A farmer placed in `village`, with geography filled in.
    pub fn seed_farmer_in(
        &self,
        name: &str,
        phone: &str,
        village: &Village,
        area: &Area,
    ) -> Result<Farmer, EngineError> {
        let mut draft = FarmerDraft::new(name, phone);
        draft.village_id = Some(village.id);
        draft.area_id = Some(area.id);
        draft.zone_id = Some(area.zone_id);
        self.client().create(draft)
    }

    /// A fresh `new`-stage engagement for a newly seeded farmer and product.
    pub fn seed_engagement(&self) -> Result<Engagement, EngineError> {
        let suffix = self.client().get_all::<Product>(&Default::default())?.len();
        let farmer = self.seed_farmer(&format!("Farmer {suffix}"), "9876543210")?;
        let product = self.seed_product(&format!("P-{suffix}"), &format!("Product {suffix}"))?;
        self.engagements().create(EngagementDraft::new(
            farmer.id,
            product.id,
            "Rabi 2026",
            DataSource::Manual,
        ))
    }

    /// Seed an engagement and force it into `stage` regardless of policy.
    pub fn seed_engagement_at(&self, stage: LeadStage) -> Result<Engagement, EngineError> {
        let engagement = self.seed_engagement()?;
        if stage == LeadStage::New {
            return Ok(engagement);
        }
        EngagementManager::new(self.client().clone(), TransitionPolicy::Permissive)
            .update_stage(engagement.id, stage, None, Some("seeded"))
    }
}
