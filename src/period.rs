use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::types::{MemberId, PeriodId};

/// ceiling on submitted + approved principal within a payroll period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodLimit {
    pub period_id: PeriodId,
    pub limit_amount: Money,
    pub set_by: MemberId,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PeriodLimit {
    /// true when adding `requested` on top of `committed` stays within the limit
    pub fn admits(&self, committed: Money, requested: Money) -> Result<bool> {
        let total = committed
            .checked_add(requested)
            .ok_or_else(|| LendingError::overflow("period total"))?;
        Ok(total <= self.limit_amount)
    }
}

/// limit usage summary for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodUsage {
    pub period_id: PeriodId,
    pub limit: Option<Money>,
    pub committed: Money,
    pub remaining: Option<Money>,
}

impl PeriodUsage {
    pub fn new(period_id: PeriodId, limit: Option<&PeriodLimit>, committed: Money) -> Self {
        let limit = limit.map(|l| l.limit_amount);
        Self {
            period_id,
            limit,
            committed,
            remaining: limit.map(|l| l.saturating_sub(committed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn limit(amount: i64) -> PeriodLimit {
        PeriodLimit {
            period_id: "2024-06".to_string(),
            limit_amount: Money::from_major(amount),
            set_by: "ADMIN".to_string(),
            notes: None,
            updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_admits_up_to_and_including_limit() {
        let l = limit(500_000);
        assert!(l.admits(Money::from_major(400_000), Money::from_major(100_000)).unwrap());
        assert!(!l.admits(Money::from_major(450_000), Money::from_major(100_000)).unwrap());
    }

    #[test]
    fn test_admits_reports_overflow() {
        let half = Money::from_decimal(rust_decimal::Decimal::MAX / rust_decimal::Decimal::from(2));
        let err = limit(500_000).admits(half, half).unwrap_err();
        assert!(matches!(err, LendingError::Calculation { .. }));
    }

    #[test]
    fn test_usage_remaining() {
        let l = limit(500_000);
        let usage = PeriodUsage::new("2024-06".to_string(), Some(&l), Money::from_major(620_000));
        assert_eq!(usage.remaining, Some(Money::ZERO));

        let unlimited = PeriodUsage::new("2024-06".to_string(), None, Money::from_major(1));
        assert!(unlimited.remaining.is_none());
    }
}
