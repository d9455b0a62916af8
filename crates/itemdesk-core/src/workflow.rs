//! Record status state machine
//!
//! ```text
//! Active ↔ Pending → Completed
//!    ↓         ↓
//!  Cancelled  Cancelled
//! ```
//!
//! `Active` may also go straight to `Completed`; any non-terminal status may
//! move to any other. `Completed` and `Cancelled` are terminal. Entering `Completed` on a record
//! with `approvalRequired` additionally needs a recorded approval.

use crate::record::Status;

/// Workflow rule violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("status is terminal: cannot move from {from} to {to}")]
    TerminalState { from: Status, to: Status },

    #[error("approval required before completion")]
    ApprovalMissing,
}

impl Status {
    /// Check if a status transition is valid. Staying in the same status is
    /// always allowed, so edits to other fields of a terminal record pass.
    pub fn can_transition_to(&self, target: &Status) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (Status::Completed, _) | (Status::Cancelled, _) => false,
            (Status::Active, _) | (Status::Pending, _) => true,
        }
    }

    /// Statuses reachable from this one, excluding itself.
    pub fn valid_transitions(&self) -> Vec<Status> {
        Status::ALL
            .into_iter()
            .filter(|s| s != self && self.can_transition_to(s))
            .collect()
    }
}

/// What the workflow check needs to know about the candidate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Stored status; `None` when the record is being created.
    pub from: Option<Status>,
    pub to: Status,
    pub approval_required: bool,
    /// Whether an approval is on record after any approval reset.
    pub approved: bool,
}

impl Transition {
    /// Check status legality and approval gating.
    pub fn check(&self) -> Result<(), WorkflowError> {
        if let Some(from) = self.from {
            if !from.can_transition_to(&self.to) {
                return Err(WorkflowError::TerminalState { from, to: self.to });
            }
            if from == self.to {
                return Ok(());
            }
        }
        if self.to == Status::Completed && self.approval_required && !self.approved {
            return Err(WorkflowError::ApprovalMissing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(from: Option<Status>, to: Status) -> Transition {
        Transition {
            from,
            to,
            approval_required: false,
            approved: false,
        }
    }

    #[test]
    fn test_open_transitions() {
        assert!(Status::Active.can_transition_to(&Status::Pending));
        assert!(Status::Pending.can_transition_to(&Status::Active));
        assert!(Status::Active.can_transition_to(&Status::Completed));
        assert!(Status::Pending.can_transition_to(&Status::Cancelled));
        assert_eq!(
            Status::Active.valid_transitions(),
            vec![Status::Pending, Status::Completed, Status::Cancelled]
        );
    }

    #[test]
    fn test_terminal_states() {
        for terminal in [Status::Completed, Status::Cancelled] {
            assert!(terminal.can_transition_to(&terminal));
            assert!(!terminal.can_transition_to(&Status::Active));
            assert!(terminal.valid_transitions().is_empty());
        }
        assert!(!Status::Completed.can_transition_to(&Status::Cancelled));
    }

    #[test]
    fn terminal_rejects_status_change() {
        let err = transition(Some(Status::Completed), Status::Active)
            .check()
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::TerminalState {
                from: Status::Completed,
                to: Status::Active
            }
        );
        assert!(transition(Some(Status::Cancelled), Status::Cancelled)
            .check()
            .is_ok());
    }

    #[test]
    fn completion_gated_by_approval() {
        let mut t = transition(Some(Status::Active), Status::Completed);
        t.approval_required = true;
        assert_eq!(t.check(), Err(WorkflowError::ApprovalMissing));
        t.approved = true;
        assert!(t.check().is_ok());

        let mut create = transition(None, Status::Completed);
        create.approval_required = true;
        assert_eq!(create.check(), Err(WorkflowError::ApprovalMissing));
        create.approval_required = false;
        assert!(create.check().is_ok());
    }

    #[test]
    fn staying_completed_skips_approval_gate() {
        let t = Transition {
            from: Some(Status::Completed),
            to: Status::Completed,
            approval_required: true,
            approved: false,
        };
        assert!(t.check().is_ok());
    }
}
