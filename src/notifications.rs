//! Notification outbox.
//!
//! Operations collect [`Notification`] values while their transaction runs;
//! the facade dispatches them only after the transaction commits, so a
//! failing delivery can never roll back a status change.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::decimal::Money;
use crate::types::{GuarantorDecision, LoanId, MemberId, PeriodId};

/// why a loan ended up rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// every guarantor declined
    Guarantors,
    /// rejected by an administrator
    Admin,
}

/// pending notification produced by a core operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    // guarantor side
    GuaranteeRequested {
        loan_id: LoanId,
        guarantor_id: MemberId,
        requester_id: MemberId,
        amount: Money,
    },
    GuaranteedLoanSubmitted {
        loan_id: LoanId,
        guarantor_id: MemberId,
        requester_id: MemberId,
    },
    GuaranteedLoanCancelled {
        loan_id: LoanId,
        guarantor_id: MemberId,
        requester_id: MemberId,
    },

    // requester side
    GuarantorResponded {
        loan_id: LoanId,
        requester_id: MemberId,
        guarantor_id: MemberId,
        decision: GuarantorDecision,
    },
    LoanSubmitted {
        loan_id: LoanId,
        requester_id: MemberId,
        amount: Money,
    },
    LoanRejected {
        loan_id: LoanId,
        requester_id: MemberId,
        reason: RejectionReason,
    },
    PeriodLimitExceeded {
        loan_id: LoanId,
        requester_id: MemberId,
        period_id: PeriodId,
        limit: Money,
        current_total: Money,
        requested: Money,
    },
    LoanApproved {
        loan_id: LoanId,
        requester_id: MemberId,
        requested: Money,
        approved: Money,
        outstanding: Money,
    },
    OutstandingImported {
        source_loan_id: LoanId,
        loan_id: LoanId,
        requester_id: MemberId,
        period_id: PeriodId,
        amount: Money,
    },
}

impl Notification {
    /// member the message is addressed to
    pub fn recipient(&self) -> &str {
        match self {
            Notification::GuaranteeRequested { guarantor_id, .. }
            | Notification::GuaranteedLoanSubmitted { guarantor_id, .. }
            | Notification::GuaranteedLoanCancelled { guarantor_id, .. } => guarantor_id,
            Notification::GuarantorResponded { requester_id, .. }
            | Notification::LoanSubmitted { requester_id, .. }
            | Notification::LoanRejected { requester_id, .. }
            | Notification::PeriodLimitExceeded { requester_id, .. }
            | Notification::LoanApproved { requester_id, .. }
            | Notification::OutstandingImported { requester_id, .. } => requester_id,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notification::GuaranteeRequested { .. } => "Guarantor request",
            Notification::GuaranteedLoanSubmitted { .. } => "Guaranteed loan submitted",
            Notification::GuaranteedLoanCancelled { .. } => "Guaranteed loan cancelled",
            Notification::GuarantorResponded { .. } => "Guarantor response",
            Notification::LoanSubmitted { .. } => "Loan submitted",
            Notification::LoanRejected { .. } => "Loan rejected",
            Notification::PeriodLimitExceeded { .. } => "Loan limit exceeded",
            Notification::LoanApproved { .. } => "Loan approved",
            Notification::OutstandingImported { .. } => "Outstanding balance imported",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notification::GuaranteeRequested { requester_id, amount, .. } => format!(
                "{} has asked you to guarantee a loan of {}",
                requester_id, amount
            ),
            Notification::GuaranteedLoanSubmitted { requester_id, .. } => format!(
                "The loan you guaranteed for {} has been submitted for approval",
                requester_id
            ),
            Notification::GuaranteedLoanCancelled { requester_id, .. } => format!(
                "The loan request from {} has been cancelled",
                requester_id
            ),
            Notification::GuarantorResponded { guarantor_id, decision, .. } => {
                let verb = match decision {
                    GuarantorDecision::Approve => "approved",
                    GuarantorDecision::Reject => "rejected",
                };
                format!("{} has {} your guarantor request", guarantor_id, verb)
            }
            Notification::LoanSubmitted { amount, .. } => format!(
                "Your loan of {} has been submitted for approval",
                amount
            ),
            Notification::LoanRejected { reason, .. } => match reason {
                RejectionReason::Guarantors => "Your guarantors declined your loan request".to_string(),
                RejectionReason::Admin => "Your loan request was rejected by the loans desk".to_string(),
            },
            Notification::PeriodLimitExceeded { limit, current_total, requested, period_id, .. } => {
                format!(
                    "Your loan could not be submitted: period {} limit is {}, current total is {}, requested {}",
                    period_id, limit, current_total, requested
                )
            }
            Notification::LoanApproved { requested, approved, outstanding, .. } => {
                if outstanding.is_positive() {
                    format!(
                        "Your loan has been partially approved: {} of {} requested ({} outstanding)",
                        approved, requested, outstanding
                    )
                } else {
                    format!("Your loan of {} has been approved", approved)
                }
            }
            Notification::OutstandingImported { amount, period_id, .. } => format!(
                "Your outstanding balance of {} has been approved for period {}",
                amount, period_id
            ),
        }
    }
}

/// notifications collected during one operation
#[derive(Debug, Default, Clone)]
pub struct Outbox {
    pending: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    pub fn extend(&mut self, notifications: impl IntoIterator<Item = Notification>) {
        self.pending.extend(notifications);
    }

    pub fn pending(&self) -> &[Notification] {
        &self.pending
    }

    pub fn take(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("notification delivery failed: {message}")]
pub struct DispatchError {
    pub message: String,
}

/// Delivery channel for member notifications (push, sms, email).
pub trait NotificationDispatcher {
    fn notify(&self, member_id: &str, title: &str, message: &str) -> Result<(), DispatchError>;
}

/// outcome of dispatching an outbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// deliver every notification; failures are logged and swallowed
pub fn dispatch_all<D>(dispatcher: &D, notifications: &[Notification]) -> DispatchReport
where
    D: NotificationDispatcher + ?Sized,
{
    let mut report = DispatchReport::default();
    for notification in notifications {
        let recipient = notification.recipient();
        match dispatcher.notify(recipient, notification.title(), &notification.message()) {
            Ok(()) => {
                debug!(recipient, title = notification.title(), "Notification sent");
                report.sent += 1;
            }
            Err(e) => {
                warn!(
                    recipient,
                    title = notification.title(),
                    error = %e,
                    "Failed to deliver notification"
                );
                report.failed += 1;
            }
        }
    }
    report
}

/// a delivered message, as seen by [`MemoryDispatcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub member_id: String,
    pub title: String,
    pub message: String,
}

/// In-memory dispatcher that records deliveries.
///
/// Members listed in `unreachable` always fail, which lets callers observe
/// that delivery failures do not affect core state.
#[derive(Debug, Default)]
pub struct MemoryDispatcher {
    sent: RwLock<Vec<SentMessage>>,
    unreachable: Vec<String>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unreachable(members: &[&str]) -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            unreachable: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, member_id: &str) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.member_id == member_id)
            .collect()
    }
}

impl NotificationDispatcher for MemoryDispatcher {
    fn notify(&self, member_id: &str, title: &str, message: &str) -> Result<(), DispatchError> {
        if self.unreachable.iter().any(|m| m == member_id) {
            return Err(DispatchError {
                message: format!("no device registered for {}", member_id),
            });
        }
        let mut sent = self.sent.write().map_err(|_| DispatchError {
            message: "dispatcher lock poisoned".to_string(),
        })?;
        sent.push(SentMessage {
            member_id: member_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_partial_and_full_approval_wording() {
        let partial = Notification::LoanApproved {
            loan_id: Uuid::new_v4(),
            requester_id: "M-1".to_string(),
            requested: Money::from_major(100_000),
            approved: Money::from_major(70_000),
            outstanding: Money::from_major(30_000),
        };
        assert!(partial.message().contains("partially approved"));

        let full = Notification::LoanApproved {
            loan_id: Uuid::new_v4(),
            requester_id: "M-1".to_string(),
            requested: Money::from_major(100_000),
            approved: Money::from_major(100_000),
            outstanding: Money::ZERO,
        };
        assert!(!full.message().contains("partially"));
        assert_eq!(full.recipient(), "M-1");
    }

    #[test]
    fn test_dispatch_swallows_failures() {
        let loan_id = Uuid::new_v4();
        let notifications = vec![
            Notification::GuaranteeRequested {
                loan_id,
                guarantor_id: "G-1".to_string(),
                requester_id: "M-1".to_string(),
                amount: Money::from_major(10_000),
            },
            Notification::GuaranteeRequested {
                loan_id,
                guarantor_id: "G-2".to_string(),
                requester_id: "M-1".to_string(),
                amount: Money::from_major(10_000),
            },
        ];

        let dispatcher = MemoryDispatcher::with_unreachable(&["G-2"]);
        let report = dispatch_all(&dispatcher, &notifications);

        assert_eq!(report, DispatchReport { sent: 1, failed: 1 });
        assert_eq!(dispatcher.sent_to("G-1").len(), 1);
        assert!(dispatcher.sent_to("G-2").is_empty());
    }

    #[test]
    fn test_rejection_wording_follows_reason() {
        let by_guarantors = Notification::LoanRejected {
            loan_id: Uuid::new_v4(),
            requester_id: "M-1".to_string(),
            reason: RejectionReason::Guarantors,
        };
        let by_admin = Notification::LoanRejected {
            loan_id: Uuid::new_v4(),
            requester_id: "M-1".to_string(),
            reason: RejectionReason::Admin,
        };
        assert!(by_guarantors.message().contains("guarantors"));
        assert!(!by_admin.message().contains("guarantors"));
        assert!(serde_json::to_string(&by_admin).unwrap().contains("\"reason\":\"admin\""));
    }

    #[test]
    fn test_outbox_take_drains() {
        let mut outbox = Outbox::new();
        outbox.push(Notification::LoanRejected {
            loan_id: Uuid::new_v4(),
            requester_id: "M-1".to_string(),
            reason: RejectionReason::Guarantors,
        });
        assert_eq!(outbox.pending().len(), 1);
        assert_eq!(outbox.take().len(), 1);
        assert!(outbox.is_empty());
    }
}
