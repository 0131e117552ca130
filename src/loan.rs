use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LendingConfig;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::types::{LoanId, LoanStatus, MemberId, PeriodId};

/// salary-deduction loan request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: LoanId,
    pub requester_id: MemberId,
    pub period_id: PeriodId,

    // amounts
    pub requested_amount: Money,
    pub approved_amount: Option<Money>,
    pub outstanding_amount: Option<Money>,
    pub monthly_repayment: Money,

    // status
    pub status: LoanStatus,
    pub created_by: MemberId,
    pub approved_by: Option<MemberId>,
    pub imported_from: Option<LoanId>,
    pub notes: Option<String>,

    // dates
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl LoanRequest {
    /// create new draft loan
    pub fn draft(
        requester_id: MemberId,
        period_id: PeriodId,
        amount: Money,
        created_by: MemberId,
        config: &LendingConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            period_id,
            requested_amount: amount,
            approved_amount: None,
            outstanding_amount: None,
            monthly_repayment: config.monthly_repayment(amount),
            status: LoanStatus::Draft,
            created_by,
            approved_by: None,
            imported_from: None,
            notes: None,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: None,
        }
    }

    /// carry an approved loan's outstanding balance into another period
    pub fn carry_forward(
        source: &LoanRequest,
        target_period: PeriodId,
        approved_by: MemberId,
        config: &LendingConfig,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let amount = source
            .outstanding_amount
            .filter(|a| a.is_positive())
            .ok_or_else(|| {
                LendingError::validation(format!("loan {} has no outstanding balance", source.id))
            })?;

        Ok(Self {
            id: Uuid::new_v4(),
            requester_id: source.requester_id.clone(),
            period_id: target_period,
            requested_amount: amount,
            approved_amount: Some(amount),
            outstanding_amount: Some(Money::ZERO),
            monthly_repayment: config.monthly_repayment(amount),
            status: LoanStatus::Approved,
            created_by: approved_by.clone(),
            approved_by: Some(approved_by),
            imported_from: Some(source.id),
            notes: Some(format!("carried forward from {}", source.period_id)),
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approved_at: Some(now),
        })
    }

    /// amount repayment is currently based on
    pub fn effective_amount(&self) -> Money {
        match (self.status, self.approved_amount) {
            (LoanStatus::Approved, Some(approved)) => approved,
            _ => self.requested_amount,
        }
    }

    pub fn is_partially_approved(&self) -> bool {
        matches!(self.approved_amount, Some(a) if a < self.requested_amount)
    }

    pub fn has_outstanding(&self) -> bool {
        matches!(self.outstanding_amount, Some(o) if o.is_positive())
    }

    pub fn set_status(&mut self, status: LoanStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
        if status == LoanStatus::Submitted {
            self.submitted_at = Some(now);
        }
    }

    /// record admin approval; `approved_amount` of None or <= 0 means full amount
    pub fn approve(
        &mut self,
        approved_amount: Option<Money>,
        approved_by: MemberId,
        config: &LendingConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status == LoanStatus::Approved {
            return Err(LendingError::validation(format!("loan {} is already approved", self.id)));
        }
        if self.status.is_terminal() {
            return Err(LendingError::validation(format!(
                "loan {} is {} and cannot be approved",
                self.id, self.status
            )));
        }

        let approved = match approved_amount {
            Some(amount) if amount.is_positive() => amount,
            _ => self.requested_amount,
        };
        if approved > self.requested_amount {
            return Err(LendingError::validation(format!(
                "approved amount {} exceeds requested amount {}",
                approved, self.requested_amount
            )));
        }

        self.approved_amount = Some(approved);
        self.outstanding_amount = Some(self.requested_amount - approved);
        self.monthly_repayment = config.monthly_repayment(approved);
        self.approved_by = Some(approved_by);
        self.approved_at = Some(now);
        self.set_status(LoanStatus::Approved, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn draft(amount: i64) -> LoanRequest {
        LoanRequest::draft(
            "M-001".to_string(),
            "2024-06".to_string(),
            Money::from_major(amount),
            "M-001".to_string(),
            &LendingConfig::default(),
            now(),
        )
    }

    #[test]
    fn test_draft_repayment_uses_requested_amount() {
        let loan = draft(100_000);
        assert_eq!(loan.status, LoanStatus::Draft);
        assert_eq!(loan.monthly_repayment, Money::from_major(10_000));
        assert!(loan.approved_amount.is_none());
    }

    #[test]
    fn test_partial_approval() {
        let mut loan = draft(100_000);
        loan.approve(Some(Money::from_major(70_000)), "ADMIN".to_string(), &LendingConfig::default(), now())
            .unwrap();

        assert_eq!(loan.status, LoanStatus::Approved);
        assert_eq!(loan.outstanding_amount, Some(Money::from_major(30_000)));
        assert_eq!(loan.monthly_repayment, Money::from_major(7_000));
        assert_eq!(loan.effective_amount(), Money::from_major(70_000));
        assert!(loan.is_partially_approved());
    }

    #[test]
    fn test_non_positive_amount_means_full_approval() {
        let mut loan = draft(50_000);
        loan.approve(Some(Money::ZERO), "ADMIN".to_string(), &LendingConfig::default(), now())
            .unwrap();

        assert_eq!(loan.approved_amount, Some(Money::from_major(50_000)));
        assert_eq!(loan.outstanding_amount, Some(Money::ZERO));
        assert!(!loan.has_outstanding());
    }

    #[test]
    fn test_approve_rejects_excess_and_double_approval() {
        let config = LendingConfig::default();
        let mut loan = draft(50_000);
        let err = loan
            .approve(Some(Money::from_major(60_000)), "ADMIN".to_string(), &config, now())
            .unwrap_err();
        assert!(matches!(err, LendingError::Validation { .. }));
        assert_eq!(loan.status, LoanStatus::Draft);

        loan.approve(None, "ADMIN".to_string(), &config, now()).unwrap();
        assert!(loan.approve(None, "ADMIN".to_string(), &config, now()).is_err());
    }

    #[test]
    fn test_carry_forward_requires_outstanding() {
        let config = LendingConfig::default();
        let mut loan = draft(100_000);
        assert!(LoanRequest::carry_forward(&loan, "2024-07".to_string(), "ADMIN".to_string(), &config, now()).is_err());

        loan.approve(Some(Money::from_major(60_000)), "ADMIN".to_string(), &config, now()).unwrap();
        let carried =
            LoanRequest::carry_forward(&loan, "2024-07".to_string(), "ADMIN".to_string(), &config, now())
                .unwrap();

        assert_eq!(carried.requested_amount, Money::from_major(40_000));
        assert_eq!(carried.approved_amount, Some(Money::from_major(40_000)));
        assert_eq!(carried.monthly_repayment, Money::from_major(4_000));
        assert_eq!(carried.status, LoanStatus::Approved);
        assert_eq!(carried.imported_from, Some(loan.id));
    }
}
