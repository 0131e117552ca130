//! External collaborators: member directory and salary capacity oracle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::PeriodId;

/// contact details for a coop member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub email: String,
    pub mobile: String,
}

/// Lookup of coop members.
pub trait MemberDirectory {
    fn is_active_member(&self, id: &str) -> bool;

    fn get_member(&self, id: &str) -> Option<Member>;
}

/// In-memory directory keyed by member id.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    members: HashMap<String, (Member, bool)>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// add an active member
    pub fn with_member(mut self, id: &str, name: &str) -> Self {
        self.insert(id, name, true);
        self
    }

    /// add a member whose membership has lapsed
    pub fn with_inactive_member(mut self, id: &str, name: &str) -> Self {
        self.insert(id, name, false);
        self
    }

    fn insert(&mut self, id: &str, name: &str, active: bool) {
        let member = Member {
            name: name.to_string(),
            email: format!("{}@coop.local", id.to_lowercase()),
            mobile: String::new(),
        };
        self.members.insert(id.to_string(), (member, active));
    }
}

impl MemberDirectory for StaticDirectory {
    fn is_active_member(&self, id: &str) -> bool {
        self.members.get(id).map(|(_, active)| *active).unwrap_or(false)
    }

    fn get_member(&self, id: &str) -> Option<Member> {
        self.members.get(id).map(|(member, _)| member.clone())
    }
}

/// payroll figures for a staff member in a period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeductionCapacity {
    pub net_pay: Money,
    pub current_deduction: Money,
}

impl DeductionCapacity {
    /// headroom left under `max_ratio` of net pay
    pub fn headroom(&self, max_ratio: Rate) -> Money {
        (self.net_pay * max_ratio).saturating_sub(self.current_deduction)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("salary oracle error: {message}")]
pub struct OracleError {
    pub message: String,
}

/// Remote payroll service answering deduction capacity questions.
pub trait SalaryCapacityOracle {
    fn deduction_capacity(
        &self,
        staff_id: &str,
        period_id: &PeriodId,
    ) -> std::result::Result<DeductionCapacity, OracleError>;
}

/// result of an affordability pre-check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affordability {
    pub net_pay: Money,
    pub current_deduction: Money,
    pub monthly_repayment: Money,
    pub headroom: Money,
    pub affordable: bool,
}

impl Affordability {
    pub fn assess(capacity: DeductionCapacity, monthly_repayment: Money, max_ratio: Rate) -> Self {
        let headroom = capacity.headroom(max_ratio);
        Self {
            net_pay: capacity.net_pay,
            current_deduction: capacity.current_deduction,
            monthly_repayment,
            headroom,
            affordable: capacity
                .current_deduction
                .checked_add(monthly_repayment)
                .is_some_and(|total| total <= capacity.net_pay * max_ratio),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_directory() {
        let directory = StaticDirectory::new()
            .with_member("M-1", "Ada")
            .with_inactive_member("M-2", "Bola");

        assert!(directory.is_active_member("M-1"));
        assert!(!directory.is_active_member("M-2"));
        assert!(!directory.is_active_member("M-3"));
        assert_eq!(directory.get_member("M-2").map(|m| m.name), Some("Bola".to_string()));
    }

    #[test]
    fn test_assess_affordability() {
        let capacity = DeductionCapacity {
            net_pay: Money::from_major(200_000),
            current_deduction: Money::from_major(80_000),
        };

        let ok = Affordability::assess(capacity, Money::from_major(20_000), Rate::ONE);
        assert!(ok.affordable);
        assert_eq!(ok.headroom, Money::from_major(120_000));

        // half of net pay is 100,000; 80,000 + 30,000 crosses it
        let tight = Affordability::assess(capacity, Money::from_major(30_000), Rate::from_percentage(50));
        assert!(!tight.affordable);
        assert_eq!(tight.headroom, Money::from_major(20_000));
    }
}
