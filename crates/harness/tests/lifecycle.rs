use agrodesk_core::{EngagementFilter, LeadStage, StaffRole, TransitionPolicy};
use agrodesk_engine::EngineError;
use agrodesk_harness::TestBackoffice;

type TestResult = Result<(), Box<dyn std::error::Error>>;

// ============================================================================
// Stage transitions
// ============================================================================

#[test]
fn new_engagement_starts_active_at_new() -> TestResult {
    let office = TestBackoffice::new()?;
    let e = office.seed_engagement()?;
    assert_eq!(e.lead_stage, LeadStage::New);
    assert!(e.is_active);
    assert_eq!(e.version, 1);
    Ok(())
}

#[test]
fn permissive_policy_allows_every_pair() -> TestResult {
    let office = TestBackoffice::with_policy(TransitionPolicy::Permissive)?;
    let manager = office.engagements();
    for from in LeadStage::ALL {
        for to in LeadStage::ALL {
            let e = office.seed_engagement_at(from)?;
            assert_eq!(e.lead_stage, from);
            manager.update_stage(e.id, to, None, None)?;
            let reread = manager.get(e.id)?;
            assert_eq!(reread.lead_stage, to, "{from} -> {to}");
            assert_eq!(reread.is_active, !to.is_terminal(), "{from} -> {to}");
        }
    }
    Ok(())
}

#[test]
fn strict_policy_rejects_illegal_moves_and_keeps_record() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement()?;

    let err = manager
        .update_stage(e.id, LeadStage::ActiveCustomer, None, None)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::IllegalTransition {
            from: LeadStage::New,
            to: LeadStage::ActiveCustomer
        }
    ));
    let reread = manager.get(e.id)?;
    assert_eq!(reread, e);
    assert!(manager.history(e.id)?.is_empty());
    Ok(())
}

#[test]
fn strict_policy_matches_transition_table() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    for from in LeadStage::ALL {
        for to in LeadStage::ALL {
            if from == to {
                continue;
            }
            let e = office.seed_engagement_at(from)?;
            let result = manager.update_stage(e.id, to, None, None);
            assert_eq!(result.is_ok(), from.can_transition_to(to), "{from} -> {to}");
        }
    }
    Ok(())
}

#[test]
fn stage_moves_are_recorded_with_actor_and_reason() -> TestResult {
    let office = TestBackoffice::new()?;
    let tmo = office.seed_staff("T-01", "Anil", StaffRole::Tmo, None)?;
    let manager = office.engagements();
    let e = office.seed_engagement()?;

    manager.update_stage(e.id, LeadStage::Contacted, Some(tmo.id), Some("first call"))?;
    manager.update_stage(e.id, LeadStage::Qualified, Some(tmo.id), None)?;

    let history = manager.history(e.id)?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].from_stage, LeadStage::New);
    assert_eq!(history[0].to_stage, LeadStage::Contacted);
    assert_eq!(history[0].actor, Some(tmo.id));
    assert_eq!(history[0].reason.as_deref(), Some("first call"));
    assert_eq!(history[1].to_stage, LeadStage::Qualified);
    assert!(history[0].at < history[1].at);
    Ok(())
}

// ============================================================================
// Convert / close / reopen
// ============================================================================

#[test]
fn mark_converted_records_purchases() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement()?;

    let converted = manager.mark_converted(e.id, Some(1000.0), None)?;
    assert_eq!(converted.lead_stage, LeadStage::Converted);
    assert_eq!(converted.total_purchases, Some(1000.0));
    assert!(!converted.is_active);
    assert_eq!(manager.get(e.id)?, converted);
    Ok(())
}

#[test]
fn mark_converted_rejects_negative_amount() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement()?;

    let err = manager.mark_converted(e.id, Some(-5.0), None).unwrap_err();
    assert_eq!(err.code(), "validation");
    assert_eq!(manager.get(e.id)?.lead_stage, LeadStage::New);
    Ok(())
}

#[test]
fn strict_policy_will_not_convert_a_lost_lead() -> TestResult {
    let office = TestBackoffice::new()?;
    let e = office.seed_engagement_at(LeadStage::Lost)?;
    let err = office.engagements().mark_converted(e.id, None, None).unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    Ok(())
}

#[test]
fn close_preserves_stage() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Interested)?;

    let closed = manager.close(e.id, "farmer moved away", None)?;
    assert!(!closed.is_active);
    assert_eq!(closed.lead_stage, LeadStage::Interested);
    assert_eq!(closed.closure_reason.as_deref(), Some("farmer moved away"));

    let err = manager.close(e.id, "again", None).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyClosed(_)));
    Ok(())
}

#[test]
fn close_requires_reason() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement()?;
    let err = manager.close(e.id, "   ", None).unwrap_err();
    assert_eq!(err.code(), "validation");
    assert!(manager.get(e.id)?.is_active);
    Ok(())
}

#[test]
fn reopen_clears_reason_and_keeps_open_stage() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Negotiation)?;
    manager.close(e.id, "season over", None)?;

    let reopened = manager.reopen(e.id, None)?;
    assert!(reopened.is_active);
    assert_eq!(reopened.closure_reason, None);
    assert_eq!(reopened.lead_stage, LeadStage::Negotiation);

    let err = manager.reopen(e.id, None).unwrap_err();
    assert!(matches!(err, EngineError::NotClosed(_)));
    Ok(())
}

#[test]
fn reopen_moves_terminal_stage_back_to_contacted() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Lost)?;
    assert!(!e.is_active);

    let reopened = manager.reopen(e.id, None)?;
    assert_eq!(reopened.lead_stage, LeadStage::REOPENED);
    assert!(reopened.is_active);
    let last = manager.history(e.id)?.pop().ok_or("missing transition")?;
    assert_eq!(last.from_stage, LeadStage::Lost);
    assert_eq!(last.to_stage, LeadStage::Contacted);
    Ok(())
}

#[test]
fn stage_edit_on_closed_engagement_clears_reason() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Contacted)?;
    manager.close(e.id, "farmer moved away", None)?;

    let moved = manager.update_stage(e.id, LeadStage::Qualified, None, None)?;
    assert_eq!(moved.lead_stage, LeadStage::Qualified);
    assert!(moved.is_active);
    assert_eq!(moved.closure_reason, None);
    Ok(())
}

#[test]
fn dropping_a_closed_engagement_keeps_reason() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Contacted)?;
    manager.close(e.id, "no response", None)?;

    let lost = manager.update_stage(e.id, LeadStage::Lost, None, None)?;
    assert!(!lost.is_active);
    assert_eq!(lost.closure_reason.as_deref(), Some("no response"));
    Ok(())
}

#[test]
fn reopened_conversion_loses_purchase_amount() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Negotiation)?;
    manager.mark_converted(e.id, Some(1000.0), None)?;

    let reopened = manager.reopen(e.id, None)?;
    assert_eq!(reopened.lead_stage, LeadStage::Contacted);
    assert_eq!(reopened.total_purchases, None);
    let stats = manager.get_stats(&EngagementFilter::default())?;
    assert!(stats.total_purchases.abs() < f64::EPSILON);
    Ok(())
}

#[test]
fn churned_customer_keeps_purchase_amount() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Negotiation)?;
    manager.mark_converted(e.id, Some(1000.0), None)?;
    manager.update_stage(e.id, LeadStage::ActiveCustomer, None, None)?;

    let lost = manager.update_stage(e.id, LeadStage::Lost, None, Some("switched brand"))?;
    assert_eq!(lost.total_purchases, Some(1000.0));
    Ok(())
}

#[test]
fn strict_policy_will_not_demote_active_customer() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::ActiveCustomer)?;

    let err = manager.mark_converted(e.id, Some(50.0), None).unwrap_err();
    assert!(matches!(
        err,
        EngineError::IllegalTransition {
            from: LeadStage::ActiveCustomer,
            to: LeadStage::Converted
        }
    ));
    assert_eq!(manager.get(e.id)?.lead_stage, LeadStage::ActiveCustomer);
    Ok(())
}

#[test]
fn converting_again_only_updates_amount() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();
    let e = office.seed_engagement_at(LeadStage::Interested)?;
    manager.mark_converted(e.id, Some(400.0), None)?;

    let again = manager.mark_converted(e.id, Some(650.0), None)?;
    assert_eq!(again.lead_stage, LeadStage::Converted);
    assert_eq!(again.total_purchases, Some(650.0));
    assert_eq!(manager.history(e.id)?.len(), 2);
    Ok(())
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn stats_count_by_stage_and_activity() -> TestResult {
    let office = TestBackoffice::new()?;
    let manager = office.engagements();

    office.seed_engagement()?;
    office.seed_engagement_at(LeadStage::Interested)?;
    let won = office.seed_engagement_at(LeadStage::Negotiation)?;
    manager.mark_converted(won.id, Some(2500.0), None)?;
    let lost = office.seed_engagement()?;
    manager.update_stage(lost.id, LeadStage::Rejected, None, Some("price"))?;

    let stats = manager.get_stats(&EngagementFilter::default())?;
    assert_eq!(stats.total, 4);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.inactive, 2);
    assert_eq!(stats.count(LeadStage::New), 1);
    assert_eq!(stats.count(LeadStage::Converted), 1);
    assert_eq!(stats.converted(), 1);
    assert!((stats.conversion_rate() - 0.25).abs() < f64::EPSILON);
    assert!((stats.total_purchases - 2500.0).abs() < f64::EPSILON);

    let active_only = manager.get_stats(&EngagementFilter {
        is_active: Some(true),
        ..Default::default()
    })?;
    assert_eq!(active_only.total, 2);
    assert_eq!(active_only.converted(), 0);
    Ok(())
}
