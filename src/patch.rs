//! typed partial updates for admin edits
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LendingConfig;
use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::loan::LoanRequest;
use crate::period::PeriodLimit;
use crate::types::{MemberId, PeriodId};

/// editable loan fields; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanPatch {
    pub requested_amount: Option<Money>,
    pub notes: Option<String>,
}

impl LoanPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requested_amount(mut self, amount: Money) -> Self {
        self.requested_amount = Some(amount);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requested_amount.is_none() && self.notes.is_none()
    }

    /// apply onto a loan that is still editable
    pub fn apply(&self, loan: &mut LoanRequest, config: &LendingConfig, now: DateTime<Utc>) -> Result<()> {
        if self.is_empty() {
            return Err(LendingError::validation("no fields to update"));
        }
        if loan.status.is_locked() {
            return Err(LendingError::validation(format!(
                "loan {} is {} and can no longer be edited",
                loan.id, loan.status
            )));
        }

        if let Some(amount) = self.requested_amount {
            if !amount.is_positive() {
                return Err(LendingError::validation("requested amount must be positive"));
            }
            loan.requested_amount = amount;
            loan.monthly_repayment = config.monthly_repayment(amount);
        }
        if let Some(notes) = &self.notes {
            loan.notes = Some(notes.clone());
        }
        loan.updated_at = now;
        Ok(())
    }
}

/// editable period limit fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodLimitPatch {
    pub limit_amount: Option<Money>,
    pub notes: Option<String>,
}

impl PeriodLimitPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit_amount(mut self, amount: Money) -> Self {
        self.limit_amount = Some(amount);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// build a new limit row, or update `existing` with the present fields
    pub fn apply(
        &self,
        existing: Option<PeriodLimit>,
        period_id: PeriodId,
        set_by: MemberId,
        now: DateTime<Utc>,
    ) -> Result<PeriodLimit> {
        if let Some(amount) = self.limit_amount {
            if !amount.is_positive() {
                return Err(LendingError::validation("limit amount must be positive"));
            }
        }

        match existing {
            Some(mut limit) => {
                if let Some(amount) = self.limit_amount {
                    limit.limit_amount = amount;
                }
                if let Some(notes) = &self.notes {
                    limit.notes = Some(notes.clone());
                }
                limit.set_by = set_by;
                limit.updated_at = now;
                Ok(limit)
            }
            None => {
                let limit_amount = self.limit_amount.ok_or_else(|| {
                    LendingError::validation(format!(
                        "period {} has no limit yet; limit_amount is required",
                        period_id
                    ))
                })?;
                Ok(PeriodLimit {
                    period_id,
                    limit_amount,
                    set_by,
                    notes: self.notes.clone(),
                    updated_at: now,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LoanStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_loan_patch_recomputes_repayment() {
        let config = LendingConfig::default();
        let mut loan = LoanRequest::draft(
            "M-1".to_string(),
            "2024-06".to_string(),
            Money::from_major(20_000),
            "M-1".to_string(),
            &config,
            now(),
        );

        LoanPatch::new()
            .requested_amount(Money::from_major(35_000))
            .notes("school fees")
            .apply(&mut loan, &config, now())
            .unwrap();

        assert_eq!(loan.monthly_repayment, Money::from_major(3_500));
        assert_eq!(loan.notes.as_deref(), Some("school fees"));

        loan.status = LoanStatus::Submitted;
        assert!(LoanPatch::new().notes("late").apply(&mut loan, &config, now()).is_err());
        assert!(LoanPatch::new().apply(&mut loan, &config, now()).is_err());
    }

    #[test]
    fn test_period_patch_create_and_update() {
        let err = PeriodLimitPatch::new()
            .notes("no amount")
            .apply(None, "2024-06".to_string(), "ADMIN".to_string(), now())
            .unwrap_err();
        assert!(matches!(err, LendingError::Validation { .. }));

        let created = PeriodLimitPatch::new()
            .limit_amount(Money::from_major(500_000))
            .apply(None, "2024-06".to_string(), "ADMIN".to_string(), now())
            .unwrap();

        let updated = PeriodLimitPatch::new()
            .notes("board resolution 12")
            .apply(Some(created), "2024-06".to_string(), "ADMIN-2".to_string(), now())
            .unwrap();

        assert_eq!(updated.limit_amount, Money::from_major(500_000));
        assert_eq!(updated.set_by, "ADMIN-2");
        assert_eq!(updated.notes.as_deref(), Some("board resolution 12"));
    }
}
