use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};

/// lending configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingConfig {
    /// live (pending + approved) guarantors allowed per loan
    pub max_guarantors: usize,
    /// share of the effective amount deducted monthly
    pub repayment_rate: Rate,
    /// share of net pay that may go to deductions
    pub max_deduction_ratio: Rate,
    /// gate the submitted transition on the period limit
    pub enforce_period_limits: bool,
    /// smallest amount a member may request
    pub minimum_request: Option<Money>,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            max_guarantors: 2,
            repayment_rate: Rate::from_percentage(10),
            max_deduction_ratio: Rate::ONE,
            enforce_period_limits: true,
            minimum_request: None,
        }
    }
}

impl LendingConfig {
    /// parse from json, missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LendingConfig = serde_json::from_str(json).map_err(|e| {
            LendingError::InvalidConfiguration {
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_guarantors == 0 {
            return Err(LendingError::InvalidConfiguration {
                message: "max_guarantors must be at least 1".to_string(),
            });
        }

        let rate = self.repayment_rate.as_decimal();
        if rate <= dec!(0) || rate > dec!(1) {
            return Err(LendingError::InvalidConfiguration {
                message: format!("repayment_rate must be in (0, 1], got {}", rate),
            });
        }

        let ratio = self.max_deduction_ratio.as_decimal();
        if ratio <= dec!(0) || ratio > dec!(1) {
            return Err(LendingError::InvalidConfiguration {
                message: format!("max_deduction_ratio must be in (0, 1], got {}", ratio),
            });
        }

        if let Some(min) = self.minimum_request {
            if !min.is_positive() {
                return Err(LendingError::InvalidConfiguration {
                    message: "minimum_request must be positive".to_string(),
                });
            }
        }

        Ok(())
    }

    /// monthly deduction for an effective amount
    pub fn monthly_repayment(&self, effective_amount: Money) -> Money {
        effective_amount * self.repayment_rate
    }
}
