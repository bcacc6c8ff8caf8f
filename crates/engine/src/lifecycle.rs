//! Engagement lifecycle: stage changes, conversion, closing and reopening.
//!
//! Every write reads the current row, checks the requested move against the
//! configured [`TransitionPolicy`], and applies the result conditionally on
//! the version it read. A concurrent edit in between surfaces as
//! [`EngineError::ConcurrentModification`] instead of being overwritten.

use agrodesk_core::{
    Engagement, EngagementDraft, EngagementFilter, EngagementId, EngagementStats, LeadStage,
    StageChange, StageTransition, StaffId, TransitionPolicy,
};
use agrodesk_storage::Storage;

use crate::client::Client;
use crate::error::EngineError;

pub struct EngagementManager {
    client: Client,
    policy: TransitionPolicy,
}

impl EngagementManager {
    pub fn new(client: Client, policy: TransitionPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn create(&self, draft: EngagementDraft) -> Result<Engagement, EngineError> {
        let engagement: Engagement = self.client.create(draft)?;
        tracing::info!(
            engagement = %engagement.id,
            source = %engagement.data_source,
            stage = %engagement.lead_stage,
            "engagement created"
        );
        Ok(engagement)
    }

    pub fn get(&self, id: EngagementId) -> Result<Engagement, EngineError> {
        self.client
            .get_by_id::<Engagement>(id)?
            .ok_or_else(|| EngineError::NotFound(format!("engagements {id}")))
    }

    pub fn list(&self, filter: &EngagementFilter) -> Result<Vec<Engagement>, EngineError> {
        self.client.get_all(filter)
    }

    /// Move an engagement to `to`.
    ///
    /// Entering a terminal stage deactivates the engagement; entering an open
    /// stage activates it and clears any closure reason. Asking for the
    /// current stage is a no-op.
    pub fn update_stage(
        &self,
        id: EngagementId,
        to: LeadStage,
        actor: Option<StaffId>,
        reason: Option<&str>,
    ) -> Result<Engagement, EngineError> {
        let current = self.get(id)?;
        if current.lead_stage == to {
            tracing::debug!(engagement = %id, stage = %to, "stage unchanged");
            return Ok(current);
        }
        self.check(&current, to)?;
        self.apply(stage_change(&current, to, actor, reason))
    }

    /// Move to `converted` and record what the farmer bought.
    ///
    /// Any stage before conversion may convert directly. The strict policy
    /// refuses to convert a lead that was already dropped, and will not move
    /// an active customer back to `converted`. Converting again when already
    /// converted only updates the amount.
    pub fn mark_converted(
        &self,
        id: EngagementId,
        total_purchases: Option<f64>,
        actor: Option<StaffId>,
    ) -> Result<Engagement, EngineError> {
        let current = self.get(id)?;
        let blocked = match current.lead_stage {
            LeadStage::Converted => false,
            LeadStage::ActiveCustomer => true,
            other => other.is_terminal(),
        };
        if blocked && self.policy == TransitionPolicy::Strict {
            return Err(self.reject(&current, LeadStage::Converted));
        }
        let mut change = stage_change(&current, LeadStage::Converted, actor, Some("converted"));
        if total_purchases.is_some() {
            change.total_purchases = Some(total_purchases);
        }
        self.apply(change)
    }

    /// Deactivate the engagement and record why. The lead stage is kept.
    pub fn close(
        &self,
        id: EngagementId,
        reason: &str,
        actor: Option<StaffId>,
    ) -> Result<Engagement, EngineError> {
        let current = self.get(id)?;
        if !current.is_active {
            return Err(EngineError::AlreadyClosed(id.to_string()));
        }
        let change = StageChange {
            engagement_id: id,
            expected_version: current.version,
            from: current.lead_stage,
            to: current.lead_stage,
            is_active: false,
            total_purchases: None,
            closure_reason: Some(Some(reason.trim().to_string())),
            actor,
            reason: None,
        };
        self.apply(change)
    }

    /// Reactivate a closed engagement and clear its closure reason.
    ///
    /// A terminal stage is moved back to [`LeadStage::REOPENED`] so an active
    /// engagement never sits in a terminal stage; other stages are kept.
    /// A reopened conversion is back in the funnel and loses its purchase
    /// amount.
    pub fn reopen(&self, id: EngagementId, actor: Option<StaffId>) -> Result<Engagement, EngineError> {
        let current = self.get(id)?;
        if current.is_active {
            return Err(EngineError::NotClosed(id.to_string()));
        }
        let to = if current.lead_stage.is_terminal() {
            LeadStage::REOPENED
        } else {
            current.lead_stage
        };
        self.apply(stage_change(&current, to, actor, Some("reopened")))
    }

    pub fn get_stats(&self, filter: &EngagementFilter) -> Result<EngagementStats, EngineError> {
        self.client.call(|s| s.engagement_stats(filter))
    }

    pub fn history(&self, id: EngagementId) -> Result<Vec<StageTransition>, EngineError> {
        self.client.call(|s| s.stage_history(id))
    }

    fn check(&self, current: &Engagement, to: LeadStage) -> Result<(), EngineError> {
        self.policy
            .check(current.lead_stage, to)
            .map_err(|_| self.reject(current, to))
    }

    fn reject(&self, current: &Engagement, to: LeadStage) -> EngineError {
        tracing::warn!(
            engagement = %current.id,
            from = %current.lead_stage,
            to = %to,
            "stage transition rejected"
        );
        EngineError::IllegalTransition {
            from: current.lead_stage,
            to,
        }
    }

    fn apply(&self, change: StageChange) -> Result<Engagement, EngineError> {
        let result = self.client.call(|s| s.apply_stage_change(&change));
        match &result {
            Ok(engagement) => tracing::info!(
                engagement = %engagement.id,
                from = %change.from,
                to = %engagement.lead_stage,
                active = engagement.is_active,
                "engagement updated"
            ),
            Err(EngineError::ConcurrentModification(_)) => tracing::warn!(
                engagement = %change.engagement_id,
                expected_version = change.expected_version,
                "engagement changed concurrently"
            ),
            Err(_) => {}
        }
        result
    }
}

/// The write that moves `current` to `to`.
///
/// An engagement that becomes active drops its closure reason. One that
/// lands back in the open funnel drops its purchase amount; dropped and
/// customer stages keep it.
fn stage_change(
    current: &Engagement,
    to: LeadStage,
    actor: Option<StaffId>,
    reason: Option<&str>,
) -> StageChange {
    let is_active = !to.is_terminal();
    let back_in_funnel = is_active && !to.is_customer();
    StageChange {
        engagement_id: current.id,
        expected_version: current.version,
        from: current.lead_stage,
        to,
        is_active,
        total_purchases: (back_in_funnel && current.total_purchases.is_some()).then_some(None),
        closure_reason: (is_active && !current.is_active).then_some(None),
        actor,
        reason: reason.map(str::to_string),
    }
}
