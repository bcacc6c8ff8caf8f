//! Lead stages of an engagement and the transitions allowed between them.
//!
//! The funnel runs roughly left to right:
//!
//! ```text
//! new -> contacted -> qualified -> meeting_invited -> meeting_attended
//!     -> visit_scheduled -> visit_completed -> interested -> negotiation
//!     -> converted -> active_customer
//! ```
//!
//! `inactive`, `lost` and `rejected` can be reached from any open stage,
//! including `active_customer`. They have no outgoing edges; leaving them
//! goes through an explicit reopen. `converted` only moves on to
//! `active_customer` or `inactive`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStage {
    New,
    Contacted,
    Qualified,
    MeetingInvited,
    MeetingAttended,
    VisitScheduled,
    VisitCompleted,
    Interested,
    Negotiation,
    Converted,
    ActiveCustomer,
    Inactive,
    Lost,
    Rejected,
}

use LeadStage::*;

/// Exits available from every open stage.
const DROP_OUTS: [LeadStage; 3] = [Inactive, Lost, Rejected];

impl LeadStage {
    pub const ALL: [LeadStage; 14] = [
        New,
        Contacted,
        Qualified,
        MeetingInvited,
        MeetingAttended,
        VisitScheduled,
        VisitCompleted,
        Interested,
        Negotiation,
        Converted,
        ActiveCustomer,
        Inactive,
        Lost,
        Rejected,
    ];

    /// Stage a terminal engagement returns to when reopened.
    pub const REOPENED: LeadStage = Contacted;

    pub fn as_str(&self) -> &'static str {
        match self {
            New => "new",
            Contacted => "contacted",
            Qualified => "qualified",
            MeetingInvited => "meeting_invited",
            MeetingAttended => "meeting_attended",
            VisitScheduled => "visit_scheduled",
            VisitCompleted => "visit_completed",
            Interested => "interested",
            Negotiation => "negotiation",
            Converted => "converted",
            ActiveCustomer => "active_customer",
            Inactive => "inactive",
            Lost => "lost",
            Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "lead stage",
                value: s.to_string(),
            })
    }

    /// Human label used in select boxes and printed reports.
    pub fn label(&self) -> &'static str {
        match self {
            New => "New",
            Contacted => "Contacted",
            Qualified => "Qualified",
            MeetingInvited => "Meeting Invited",
            MeetingAttended => "Meeting Attended",
            VisitScheduled => "Visit Scheduled",
            VisitCompleted => "Visit Completed",
            Interested => "Interested",
            Negotiation => "Negotiation",
            Converted => "Converted",
            ActiveCustomer => "Active Customer",
            Inactive => "Inactive",
            Lost => "Lost",
            Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Converted || self.is_drop_out()
    }

    /// One of the dead ends a lead can fall into.
    pub fn is_drop_out(&self) -> bool {
        matches!(self, Inactive | Lost | Rejected)
    }

    /// The farmer has bought: `converted` or `active_customer`.
    pub fn is_customer(&self) -> bool {
        matches!(self, Converted | ActiveCustomer)
    }

    /// Stages reachable in one step from `self`.
    pub fn allowed_next(&self) -> &'static [LeadStage] {
        match self {
            New => &[Contacted, Qualified, Inactive, Lost, Rejected],
            Contacted => &[
                Qualified,
                MeetingInvited,
                VisitScheduled,
                Interested,
                Inactive,
                Lost,
                Rejected,
            ],
            Qualified => &[
                MeetingInvited,
                VisitScheduled,
                Interested,
                Negotiation,
                Inactive,
                Lost,
                Rejected,
            ],
            MeetingInvited => &[MeetingAttended, VisitScheduled, Inactive, Lost, Rejected],
            MeetingAttended => &[
                VisitScheduled,
                Interested,
                Negotiation,
                Inactive,
                Lost,
                Rejected,
            ],
            VisitScheduled => &[VisitCompleted, Inactive, Lost, Rejected],
            VisitCompleted => &[Interested, Negotiation, Converted, Inactive, Lost, Rejected],
            Interested => &[
                VisitScheduled,
                Negotiation,
                Converted,
                Inactive,
                Lost,
                Rejected,
            ],
            Negotiation => &[Converted, Inactive, Lost, Rejected],
            Converted => &[ActiveCustomer, Inactive],
            ActiveCustomer => &[Inactive, Lost, Rejected],
            Inactive | Lost | Rejected => &[],
        }
    }

    pub fn can_transition_to(&self, next: LeadStage) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Validate a single step; staying on the same stage is always allowed.
    pub fn ensure_transition(&self, next: LeadStage) -> Result<(), CoreError> {
        if *self == next || self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::IllegalTransition {
                from: *self,
                to: next,
            })
        }
    }
}

impl fmt::Display for LeadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How strictly stage writes are checked against the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Only edges in [`LeadStage::allowed_next`] are accepted.
    #[default]
    Strict,
    /// Any stage may be written over any other.
    Permissive,
}

impl TransitionPolicy {
    pub fn check(&self, from: LeadStage, to: LeadStage) -> Result<(), CoreError> {
        match self {
            Self::Strict => from.ensure_transition(to),
            Self::Permissive => Ok(()),
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(CoreError::UnknownVariant {
                kind: "transition policy",
                value: s.to_string(),
            }),
        }
    }
}
