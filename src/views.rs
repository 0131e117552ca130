/// serialization support for loan requests
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::directory::Member;
use crate::guarantor::{GuarantorRequest, GuarantorTally};
use crate::loan::LoanRequest;
use crate::types::{GuarantorRequestId, GuarantorStatus, LoanId, LoanStatus, MemberId, PeriodId};

/// serializable view of a loan request with its guarantors
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub requester_id: MemberId,
    pub requester_name: Option<String>,
    pub period_id: PeriodId,
    pub status: LoanStatus,
    pub amounts: AmountView,
    pub guarantors: Vec<GuarantorView>,
    pub tally: GuarantorTally,
    pub dates: DateView,
    pub imported_from: Option<LoanId>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AmountView {
    pub requested: Money,
    pub approved: Option<Money>,
    pub outstanding: Option<Money>,
    pub monthly_repayment: Money,
    pub partially_approved: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GuarantorView {
    pub id: GuarantorRequestId,
    pub guarantor_id: MemberId,
    pub status: GuarantorStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub response_notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DateView {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl From<&GuarantorRequest> for GuarantorView {
    fn from(g: &GuarantorRequest) -> Self {
        GuarantorView {
            id: g.id,
            guarantor_id: g.guarantor_id.clone(),
            status: g.status,
            requested_at: g.requested_at,
            responded_at: g.responded_at,
            response_notes: g.response_notes.clone(),
        }
    }
}

impl LoanView {
    pub fn new(loan: LoanRequest, guarantors: Vec<GuarantorRequest>, requester: Option<Member>) -> Self {
        let tally = GuarantorTally::from_requests(&guarantors);
        LoanView {
            id: loan.id,
            requester_name: requester.map(|m| m.name),
            period_id: loan.period_id.clone(),
            status: loan.status,
            amounts: AmountView {
                requested: loan.requested_amount,
                approved: loan.approved_amount,
                outstanding: loan.outstanding_amount,
                monthly_repayment: loan.monthly_repayment,
                partially_approved: loan.is_partially_approved(),
            },
            guarantors: guarantors.iter().map(GuarantorView::from).collect(),
            tally,
            dates: DateView {
                created_at: loan.created_at,
                updated_at: loan.updated_at,
                submitted_at: loan.submitted_at,
                approved_at: loan.approved_at,
            },
            imported_from: loan.imported_from,
            notes: loan.notes,
            requester_id: loan.requester_id,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LendingConfig;
    use crate::types::GuarantorDecision;
    use chrono::TimeZone;

    #[test]
    fn test_loan_view_json() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let loan = LoanRequest::draft(
            "M-1".to_string(),
            "2024-06".to_string(),
            Money::from_major(50_000),
            "M-1".to_string(),
            &LendingConfig::default(),
            now,
        );
        let mut g = GuarantorRequest::pending(loan.id, "G-1".to_string(), now);
        g.record_response(GuarantorDecision::Approve, Some("ok".to_string()), now);
        let pending = GuarantorRequest::pending(loan.id, "G-2".to_string(), now);

        let view = LoanView::new(loan, vec![g, pending], None);
        assert_eq!(view.tally, GuarantorTally::new(1, 0, 1));

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"status\": \"draft\""));
        assert!(json.contains("\"requested\": \"50000"));
        assert!(json.contains("\"guarantor_id\": \"G-2\""));
    }
}
