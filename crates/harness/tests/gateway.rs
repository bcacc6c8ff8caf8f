use agrodesk_core::{
    Activity, ActivityDraft, ActivityFilter, ActivityType, Area, AreaFilter, Engagement,
    EngagementFilter, EngagementPatch, Farmer, FarmerFilter, FarmerPatch, LeadQuality, StaffRole,
    Zone, ZoneId,
};
use agrodesk_engine::ServiceError;
use agrodesk_harness::TestBackoffice;
use agrodesk_storage::{AuditAction, Storage};

type TestResult = Result<(), Box<dyn std::error::Error>>;

// ============================================================================
// Geography
// ============================================================================

#[test]
fn areas_filter_by_zone_and_activity() -> TestResult {
    let office = TestBackoffice::new()?;
    let north = office.seed_zone("N", "North", true)?;
    let south = office.seed_zone("S", "South", true)?;
    office.seed_area(&north, "N1", "Kota")?;
    office.seed_area(&north, "N2", "Bundi")?;
    office.seed_area(&south, "S1", "Madurai")?;

    let in_north: Vec<Area> = office.client().get_all(&AreaFilter {
        zone_id: Some(north.id),
        is_active: Some(true),
    })?;
    let names: Vec<_> = in_north.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["Bundi", "Kota"]);
    Ok(())
}

#[test]
fn zone_with_areas_cannot_be_deleted() -> TestResult {
    let office = TestBackoffice::new()?;
    let zone = office.seed_zone("N", "North", true)?;
    office.seed_area(&zone, "N1", "Kota")?;

    let err = office.client().delete::<Zone>(zone.id).unwrap_err();
    assert_eq!(err.code(), "constraint_violation");
    let shown = ServiceError::from(&err);
    assert!(shown.details.is_some());
    assert!(office.client().get_by_id::<Zone>(zone.id)?.is_some());
    Ok(())
}

#[test]
fn missing_record_update_is_not_found() -> TestResult {
    let office = TestBackoffice::new()?;
    let err = office
        .client()
        .update::<Zone>(ZoneId::new(), Default::default())
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
    Ok(())
}

// ============================================================================
// Farmers
// ============================================================================

#[test]
fn farmer_filters_combine() -> TestResult {
    let office = TestBackoffice::new()?;
    let zone = office.seed_zone("N", "North", true)?;
    let area = office.seed_area(&zone, "N1", "Kota")?;
    let village = office.seed_village(&area, "V1", "Rampur")?;
    let tmo = office.seed_staff("T-01", "Anil", StaffRole::Tmo, Some(zone.id))?;

    let hot = office.seed_farmer_in("Ramesh", "9000000001", &village, &area)?;
    office.seed_farmer_in("Suresh", "9000000002", &village, &area)?;
    office.seed_farmer("Outsider", "9000000003")?;

    office.client().update::<Farmer>(
        hot.id,
        FarmerPatch {
            lead_quality: Some(Some(LeadQuality::Hot)),
            lead_score: Some(85),
            assigned_tmo_id: Some(Some(tmo.id)),
            ..Default::default()
        },
    )?;

    let in_zone: Vec<Farmer> = office.client().get_all(&FarmerFilter {
        zone_id: Some(zone.id),
        ..Default::default()
    })?;
    assert_eq!(in_zone.len(), 2);

    let hot_for_tmo: Vec<Farmer> = office.client().get_all(&FarmerFilter {
        assigned_tmo_id: Some(tmo.id),
        lead_quality: Some(LeadQuality::Hot),
        ..Default::default()
    })?;
    assert_eq!(hot_for_tmo.len(), 1);
    assert_eq!(hot_for_tmo[0].lead_score, 85);
    Ok(())
}

#[test]
fn farmer_validation_rejects_bad_score_and_phone() -> TestResult {
    let office = TestBackoffice::new()?;
    let farmer = office.seed_farmer("Ramesh", "9000000001")?;

    let err = office
        .client()
        .update::<Farmer>(
            farmer.id,
            FarmerPatch {
                lead_score: Some(101),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let err = office.seed_farmer("Bad Phone", "12ab").unwrap_err();
    assert_eq!(err.code(), "validation");
    Ok(())
}

// ============================================================================
// Engagements and activities
// ============================================================================

#[test]
fn engagement_patch_bumps_version_and_clears_notes() -> TestResult {
    let office = TestBackoffice::new()?;
    let e = office.seed_engagement()?;

    let noted = office.client().update::<Engagement>(
        e.id,
        EngagementPatch {
            notes: Some(Some("call after harvest".into())),
            ..Default::default()
        },
    )?;
    assert_eq!(noted.notes.as_deref(), Some("call after harvest"));
    assert_eq!(noted.version, e.version + 1);

    let cleared = office.client().update::<Engagement>(
        e.id,
        EngagementPatch {
            notes: Some(None),
            ..Default::default()
        },
    )?;
    assert_eq!(cleared.notes, None);
    Ok(())
}

#[test]
fn engagements_list_newest_first() -> TestResult {
    let office = TestBackoffice::new()?;
    let first = office.seed_engagement()?;
    let second = office.seed_engagement()?;

    let all: Vec<Engagement> = office.client().get_all(&EngagementFilter::default())?;
    let ids: Vec<_> = all.iter().map(|e| e.id).collect();
    assert_eq!(ids, [second.id, first.id]);
    Ok(())
}

#[test]
fn activities_cascade_with_engagement() -> TestResult {
    let office = TestBackoffice::new()?;
    let e = office.seed_engagement()?;
    let activity: Activity = office.client().create(ActivityDraft {
        engagement_id: e.id,
        farmer_id: e.farmer_id,
        activity_type: ActivityType::Call,
        outcome: Some("interested in demo".into()),
        performed_by: None,
        follow_up_at: None,
    })?;
    assert_eq!(activity.activity_type, ActivityType::Call);

    office.client().delete::<Engagement>(e.id)?;
    let left: Vec<Activity> = office.client().get_all(&ActivityFilter {
        engagement_id: Some(e.id),
        ..Default::default()
    })?;
    assert!(left.is_empty());
    Ok(())
}

// ============================================================================
// Audit
// ============================================================================

#[test]
fn writes_are_audited_with_actor() -> TestResult {
    let office = TestBackoffice::new()?;
    let admin = office.seed_staff("A-01", "Meera", StaffRole::Admin, None)?;
    office.client().set_actor(Some(admin.id))?;

    let zone = office.seed_zone("N", "North", true)?;
    office.client().delete::<Zone>(zone.id)?;

    let entries = office
        .client()
        .call(|s| s.audit_entries("zones", zone.id.as_bytes()))?;
    let actions: Vec<_> = entries.iter().map(|a| a.action).collect();
    assert_eq!(actions, [AuditAction::Create, AuditAction::Delete]);
    assert!(entries.iter().all(|a| a.actor == Some(admin.id)));
    Ok(())
}
