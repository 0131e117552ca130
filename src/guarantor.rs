use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{GuarantorDecision, GuarantorRequestId, GuarantorStatus, LoanId, MemberId};

/// one guarantor's co-signing record for a loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuarantorRequest {
    pub id: GuarantorRequestId,
    pub loan_request_id: LoanId,
    pub guarantor_id: MemberId,
    pub status: GuarantorStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_notes: Option<String>,
}

impl GuarantorRequest {
    pub fn pending(loan_request_id: LoanId, guarantor_id: MemberId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_request_id,
            guarantor_id,
            status: GuarantorStatus::Pending,
            requested_at: now,
            responded_at: None,
            response_notes: None,
        }
    }

    pub fn record_response(
        &mut self,
        decision: GuarantorDecision,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = decision.into();
        self.responded_at = Some(now);
        self.response_notes = notes;
    }
}

/// counts of guarantor statuses for one loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuarantorTally {
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
}

impl GuarantorTally {
    pub fn new(approved: usize, rejected: usize, pending: usize) -> Self {
        Self { approved, rejected, pending }
    }

    pub fn from_requests<'a, I>(requests: I) -> Self
    where
        I: IntoIterator<Item = &'a GuarantorRequest>,
    {
        requests.into_iter().fold(Self::default(), |mut tally, g| {
            match g.status {
                GuarantorStatus::Approved => tally.approved += 1,
                GuarantorStatus::Rejected => tally.rejected += 1,
                GuarantorStatus::Pending => tally.pending += 1,
            }
            tally
        })
    }

    pub fn total(&self) -> usize {
        self.approved + self.rejected + self.pending
    }

    pub fn live(&self) -> usize {
        self.approved + self.pending
    }
}
