// src/db/models/approval.rs
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of every booking request: pending at creation, then exactly one
/// terminal decision. There is no path back to pending.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "approval_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Declined,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// An approver's decision on a pending booking. Notes are optional either
/// way; the UI asks for a reason on decline but the API does not require it.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct ApprovalDecision {
    pub decision: ApprovalStatus,
    pub notes: Option<String>,
}

impl ApprovalDecision {
    /// A decision must name a terminal status; "deciding" a record back to
    /// pending is rejected before any query runs.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.decision.is_terminal() {
            Ok(())
        } else {
            Err("decision must be 'approved' or 'declined'")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_not_a_valid_decision() {
        let decision = ApprovalDecision {
            decision: ApprovalStatus::Pending,
            notes: None,
        };
        assert!(decision.validate().is_err());
    }

    #[test]
    fn approve_and_decline_are_valid_with_or_without_notes() {
        for status in [ApprovalStatus::Approved, ApprovalStatus::Declined] {
            for notes in [None, Some("room 12".to_string())] {
                let decision = ApprovalDecision {
                    decision: status,
                    notes: notes.clone(),
                };
                assert!(decision.validate().is_ok());
            }
        }
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Declined.is_terminal());
    }
}
