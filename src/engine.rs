//! Status transition engine.
//!
//! A loan's status is derived from the tally of its guarantor rows after
//! every guarantor insert or response:
//!
//! | approved | rejected | pending | status |
//! |---|---|---|---|
//! | 2 | 0 | 0 | submitted, gated by the period limit |
//! | 1 | 1 | 0 | partially guaranteed |
//! | 1 | 0 | 1 | partially guaranteed |
//! | 0 | 2 | 0 | rejected |
//! | anything else | | | pending guarantors |
//!
//! The limit gate re-reads the period limit and the committed total inside
//! the caller's transaction. A breach turns the would-be submission into a
//! rejection which is persisted like any other transition; the breach is
//! reported back alongside the transition rather than as an error so the
//! caller can commit first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LendingConfig;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::guarantor::{GuarantorRequest, GuarantorTally};
use crate::loan::LoanRequest;
use crate::notifications::{Notification, RejectionReason};
use crate::repository::Ledger;
use crate::types::{GuarantorDecision, GuarantorStatus, LoanId, LoanStatus, MemberId, PeriodId};

/// map a guarantor tally to the loan status it implies (before the limit gate)
///
/// `required` is the number of guarantors a loan needs, two by default.
pub fn derive_status(tally: GuarantorTally, required: usize) -> LoanStatus {
    if tally.approved == required && tally.total() == required {
        LoanStatus::Submitted
    } else if tally.rejected == required && tally.total() == required {
        LoanStatus::Rejected
    } else if tally.approved >= 1 && tally.total() == required {
        LoanStatus::PartiallyGuaranteed
    } else {
        LoanStatus::PendingGuarantors
    }
}

/// period limit breach details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitBreach {
    pub loan_id: LoanId,
    pub period_id: PeriodId,
    pub limit: Money,
    pub current_total: Money,
    pub requested: Money,
}

impl From<LimitBreach> for LendingError {
    fn from(breach: LimitBreach) -> Self {
        LendingError::LimitExceeded {
            loan_id: breach.loan_id,
            period_id: breach.period_id,
            limit: breach.limit,
            current_total: breach.current_total,
            requested: breach.requested,
        }
    }
}

/// outcome of the period limit gate
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    /// no limit configured for the period, or enforcement disabled
    Unlimited,
    Within { limit: Money, current_total: Money },
    Exceeded(LimitBreach),
}

/// compare a loan against its period limit, excluding the loan itself from the total
pub fn check_period_limit<L>(ledger: &L, loan: &LoanRequest, config: &LendingConfig) -> Result<LimitCheck>
where
    L: Ledger + ?Sized,
{
    if !config.enforce_period_limits {
        return Ok(LimitCheck::Unlimited);
    }
    let Some(limit) = ledger.find_period_limit(&loan.period_id)? else {
        return Ok(LimitCheck::Unlimited);
    };

    let current_total = ledger.committed_total(&loan.period_id, Some(loan.id))?;
    if limit.admits(current_total, loan.requested_amount)? {
        Ok(LimitCheck::Within {
            limit: limit.limit_amount,
            current_total,
        })
    } else {
        Ok(LimitCheck::Exceeded(LimitBreach {
            loan_id: loan.id,
            period_id: loan.period_id.clone(),
            limit: limit.limit_amount,
            current_total,
            requested: loan.requested_amount,
        }))
    }
}

/// what caused a recomputation
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    GuarantorRequested { guarantor_id: MemberId },
    GuarantorResponded { guarantor_id: MemberId, decision: GuarantorDecision },
}

/// result of one recomputation
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub loan: LoanRequest,
    pub from: LoanStatus,
    pub to: LoanStatus,
    pub tally: GuarantorTally,
    pub limit_breach: Option<LimitBreach>,
    pub notifications: Vec<Notification>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// recompute and persist the status of `loan_id` from its guarantor rows
pub fn recompute<L>(
    ledger: &mut L,
    loan_id: LoanId,
    trigger: Trigger,
    config: &LendingConfig,
    now: DateTime<Utc>,
) -> Result<Transition>
where
    L: Ledger + ?Sized,
{
    let mut loan = ledger
        .find_loan(loan_id)?
        .ok_or_else(|| LendingError::not_found("loan", loan_id))?;
    let guarantors = ledger.guarantors_for_loan(loan_id)?;
    let tally = GuarantorTally::from_requests(&guarantors);
    let from = loan.status;

    // a loan with no guarantor rows keeps its current status
    let mut to = if tally.total() == 0 { from } else { derive_status(tally, config.max_guarantors) };

    let mut limit_breach = None;
    if to == LoanStatus::Submitted && from != LoanStatus::Submitted {
        if let LimitCheck::Exceeded(breach) = check_period_limit(&*ledger, &loan, config)? {
            warn!(
                loan_id = %loan.id,
                period_id = %breach.period_id,
                limit = %breach.limit,
                current_total = %breach.current_total,
                requested = %breach.requested,
                "Period limit exceeded, rejecting loan instead of submitting"
            );
            to = LoanStatus::Rejected;
            limit_breach = Some(breach);
        }
    }

    if to != from {
        loan.set_status(to, now);
        ledger.update_loan(&loan)?;
        info!(loan_id = %loan.id, from = %from, to = %to, "Loan status changed");
    }

    let notifications = transition_notifications(&loan, &guarantors, &trigger, from, to, limit_breach.as_ref());

    Ok(Transition {
        loan,
        from,
        to,
        tally,
        limit_breach,
        notifications,
    })
}

fn transition_notifications(
    loan: &LoanRequest,
    guarantors: &[GuarantorRequest],
    trigger: &Trigger,
    from: LoanStatus,
    to: LoanStatus,
    breach: Option<&LimitBreach>,
) -> Vec<Notification> {
    let mut out = Vec::new();

    if let Some(breach) = breach {
        out.push(Notification::PeriodLimitExceeded {
            loan_id: loan.id,
            requester_id: loan.requester_id.clone(),
            period_id: breach.period_id.clone(),
            limit: breach.limit,
            current_total: breach.current_total,
            requested: breach.requested,
        });
        return out;
    }

    if from != to {
        match to {
            LoanStatus::Submitted => {
                out.push(Notification::LoanSubmitted {
                    loan_id: loan.id,
                    requester_id: loan.requester_id.clone(),
                    amount: loan.requested_amount,
                });
                for g in guarantors.iter().filter(|g| g.status == GuarantorStatus::Approved) {
                    out.push(Notification::GuaranteedLoanSubmitted {
                        loan_id: loan.id,
                        guarantor_id: g.guarantor_id.clone(),
                        requester_id: loan.requester_id.clone(),
                    });
                }
                return out;
            }
            LoanStatus::Rejected => {
                out.push(Notification::LoanRejected {
                    loan_id: loan.id,
                    requester_id: loan.requester_id.clone(),
                    reason: RejectionReason::Guarantors,
                });
                return out;
            }
            _ => {}
        }
    }

    if let Trigger::GuarantorResponded { guarantor_id, decision } = trigger {
        out.push(Notification::GuarantorResponded {
            loan_id: loan.id,
            requester_id: loan.requester_id.clone(),
            guarantor_id: guarantor_id.clone(),
            decision: *decision,
        });
    }
    out
}
