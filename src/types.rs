use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a loan request
pub type LoanId = Uuid;

/// unique identifier for a guarantor request
pub type GuarantorRequestId = Uuid;

/// member (staff) identifier as issued by the member directory
pub type MemberId = String;

/// payroll period identifier (e.g. "2024-06")
pub type PeriodId = String;

/// loan request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// created, no guarantors requested yet
    Draft,
    /// waiting on guarantor responses
    PendingGuarantors,
    /// one guarantor approved, the other slot is pending or rejected
    PartiallyGuaranteed,
    /// both guarantors approved and the period limit allowed it
    Submitted,
    /// approved by an admin
    Approved,
    /// rejected by guarantors or by the period limit
    Rejected,
    /// withdrawn before submission
    Cancelled,
}

impl LoanStatus {
    /// no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Rejected | LoanStatus::Cancelled)
    }

    /// counts against the one-loan-per-period rule
    pub fn is_active(&self) -> bool {
        !matches!(self, LoanStatus::Rejected | LoanStatus::Cancelled)
    }

    /// guarantors can no longer be added or respond
    pub fn is_locked(&self) -> bool {
        matches!(self, LoanStatus::Submitted) || self.is_terminal()
    }

    /// principal that counts towards the period limit
    pub fn commits_period_funds(&self) -> bool {
        matches!(self, LoanStatus::Submitted | LoanStatus::Approved)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Draft => "draft",
            LoanStatus::PendingGuarantors => "pending_guarantors",
            LoanStatus::PartiallyGuaranteed => "partially_guaranteed",
            LoanStatus::Submitted => "submitted",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// guarantor request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuarantorStatus {
    Pending,
    Approved,
    Rejected,
}

impl GuarantorStatus {
    /// pending and approved rows occupy a guarantor slot
    pub fn is_live(&self) -> bool {
        matches!(self, GuarantorStatus::Pending | GuarantorStatus::Approved)
    }
}

impl fmt::Display for GuarantorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuarantorStatus::Pending => write!(f, "pending"),
            GuarantorStatus::Approved => write!(f, "approved"),
            GuarantorStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// a guarantor's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuarantorDecision {
    Approve,
    Reject,
}

impl From<GuarantorDecision> for GuarantorStatus {
    fn from(decision: GuarantorDecision) -> Self {
        match decision {
            GuarantorDecision::Approve => GuarantorStatus::Approved,
            GuarantorDecision::Reject => GuarantorStatus::Rejected,
        }
    }
}

/// caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
}

/// explicit caller identity passed into every operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub id: MemberId,
    pub role: Role,
}

impl ActorContext {
    pub fn member(id: impl Into<MemberId>) -> Self {
        Self { id: id.into(), role: Role::Member }
    }

    pub fn admin(id: impl Into<MemberId>) -> Self {
        Self { id: id.into(), role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
