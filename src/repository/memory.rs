use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::errors::{LendingError, Result};
use crate::guarantor::GuarantorRequest;
use crate::loan::LoanRequest;
use crate::period::PeriodLimit;
use crate::repository::{GuarantorRepository, LoanRepository, PeriodLimitRepository, Store};
use crate::types::{GuarantorRequestId, GuarantorStatus, LoanId, PeriodId};

/// in-memory tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLedger {
    loans: HashMap<LoanId, LoanRequest>,
    guarantors: HashMap<GuarantorRequestId, GuarantorRequest>,
    limits: HashMap<PeriodId, PeriodLimit>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_loans<P>(&self, predicate: P) -> Vec<LoanRequest>
    where
        P: Fn(&LoanRequest) -> bool,
    {
        let mut loans: Vec<LoanRequest> = self.loans.values().filter(|l| predicate(l)).cloned().collect();
        loans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        loans
    }
}

impl LoanRepository for MemoryLedger {
    fn insert_loan(&mut self, loan: LoanRequest) -> Result<()> {
        if self.loans.contains_key(&loan.id) {
            return Err(LendingError::conflict(format!("loan {} already exists", loan.id)));
        }
        self.loans.insert(loan.id, loan);
        Ok(())
    }

    fn find_loan(&self, id: LoanId) -> Result<Option<LoanRequest>> {
        Ok(self.loans.get(&id).cloned())
    }

    fn update_loan(&mut self, loan: &LoanRequest) -> Result<()> {
        match self.loans.get_mut(&loan.id) {
            Some(row) => {
                *row = loan.clone();
                Ok(())
            }
            None => Err(LendingError::not_found("loan", loan.id)),
        }
    }

    fn loans_by_requester(&self, requester_id: &str) -> Result<Vec<LoanRequest>> {
        Ok(self.sorted_loans(|l| l.requester_id == requester_id))
    }

    fn loans_in_period(&self, period_id: &str) -> Result<Vec<LoanRequest>> {
        Ok(self.sorted_loans(|l| l.period_id == period_id))
    }
}

impl GuarantorRepository for MemoryLedger {
    fn insert_guarantor(&mut self, request: GuarantorRequest) -> Result<()> {
        if !self.loans.contains_key(&request.loan_request_id) {
            return Err(LendingError::not_found("loan", request.loan_request_id));
        }
        if self.guarantors.contains_key(&request.id) {
            return Err(LendingError::conflict(format!(
                "guarantor request {} already exists",
                request.id
            )));
        }
        self.guarantors.insert(request.id, request);
        Ok(())
    }

    fn find_guarantor(&self, id: GuarantorRequestId) -> Result<Option<GuarantorRequest>> {
        Ok(self.guarantors.get(&id).cloned())
    }

    fn update_guarantor(&mut self, request: &GuarantorRequest) -> Result<()> {
        match self.guarantors.get_mut(&request.id) {
            Some(row) => {
                *row = request.clone();
                Ok(())
            }
            None => Err(LendingError::not_found("guarantor request", request.id)),
        }
    }

    fn delete_guarantor(&mut self, id: GuarantorRequestId) -> Result<()> {
        match self.guarantors.get(&id) {
            None => Err(LendingError::not_found("guarantor request", id)),
            Some(row) if row.status == GuarantorStatus::Approved => Err(LendingError::conflict(
                format!("guarantor request {} is approved and cannot be removed", id),
            )),
            Some(_) => {
                self.guarantors.remove(&id);
                Ok(())
            }
        }
    }

    fn guarantors_for_loan(&self, loan_id: LoanId) -> Result<Vec<GuarantorRequest>> {
        let mut rows: Vec<GuarantorRequest> = self
            .guarantors
            .values()
            .filter(|g| g.loan_request_id == loan_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.requested_at.cmp(&b.requested_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

impl PeriodLimitRepository for MemoryLedger {
    fn find_period_limit(&self, period_id: &str) -> Result<Option<PeriodLimit>> {
        Ok(self.limits.get(period_id).cloned())
    }

    fn upsert_period_limit(&mut self, limit: PeriodLimit) -> Result<()> {
        self.limits.insert(limit.period_id.clone(), limit);
        Ok(())
    }
}

/// Store backed by a [`MemoryLedger`] behind a lock.
///
/// A transaction holds the write lock for its whole duration and works on a
/// staged copy that replaces the tables only when the closure succeeds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<MemoryLedger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: MemoryLedger) -> Self {
        Self {
            ledger: RwLock::new(ledger),
        }
    }

    /// copy of the current committed tables
    pub fn snapshot(&self) -> Result<MemoryLedger> {
        self.read(|ledger| Ok(ledger.clone()))
    }
}

impl Store for MemoryStore {
    type Ledger = MemoryLedger;

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryLedger) -> Result<T>,
    {
        let mut committed = self.ledger.write().map_err(|_| LendingError::Store {
            message: "ledger lock poisoned".to_string(),
        })?;
        let mut staged = committed.clone();
        let out = f(&mut staged)?;
        *committed = staged;
        Ok(out)
    }

    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&MemoryLedger) -> Result<T>,
    {
        let ledger = self.ledger.read().map_err(|_| LendingError::Store {
            message: "ledger lock poisoned".to_string(),
        })?;
        f(&ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LendingConfig;
    use crate::decimal::Money;
    use crate::types::{GuarantorDecision, LoanStatus};
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn loan(requester: &str, amount: i64) -> LoanRequest {
        LoanRequest::draft(
            requester.to_string(),
            "2024-06".to_string(),
            Money::from_major(amount),
            requester.to_string(),
            &LendingConfig::default(),
            now(),
        )
    }

    #[test]
    fn test_failed_transaction_leaves_no_trace() {
        let store = MemoryStore::new();
        let l = loan("M-1", 1_000);
        let id = l.id;

        let result: Result<()> = store.transaction(|ledger| {
            ledger.insert_loan(l)?;
            Err(LendingError::validation("abort"))
        });

        assert!(result.is_err());
        assert!(store.read(|ledger| ledger.find_loan(id)).unwrap().is_none());
    }

    #[test]
    fn test_committed_total_counts_submitted_and_approved() {
        let mut ledger = MemoryLedger::new();
        let mut a = loan("M-1", 300_000);
        a.status = LoanStatus::Submitted;
        let mut b = loan("M-2", 100_000);
        b.status = LoanStatus::Approved;
        let c = loan("M-3", 900_000);
        let mut d = loan("M-4", 50_000);
        d.status = LoanStatus::Rejected;
        let a_id = a.id;
        for l in [a, b, c, d] {
            ledger.insert_loan(l).unwrap();
        }

        assert_eq!(ledger.committed_total("2024-06", None).unwrap(), Money::from_major(400_000));
        assert_eq!(ledger.committed_total("2024-06", Some(a_id)).unwrap(), Money::from_major(100_000));
        assert_eq!(ledger.committed_total("2024-07", None).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_active_loan_ignores_rejected() {
        let mut ledger = MemoryLedger::new();
        let mut old = loan("M-1", 1_000);
        old.status = LoanStatus::Rejected;
        ledger.insert_loan(old).unwrap();
        assert!(ledger.active_loan_for("M-1", "2024-06").unwrap().is_none());

        let current = loan("M-1", 2_000);
        let current_id = current.id;
        ledger.insert_loan(current).unwrap();
        assert_eq!(ledger.active_loan_for("M-1", "2024-06").unwrap().map(|l| l.id), Some(current_id));
    }

    #[test]
    fn test_approved_guarantor_cannot_be_deleted() {
        let mut ledger = MemoryLedger::new();
        let l = loan("M-1", 1_000);
        let mut g = GuarantorRequest::pending(l.id, "G-1".to_string(), now());
        g.record_response(GuarantorDecision::Approve, None, now());
        let g_id = g.id;
        ledger.insert_loan(l).unwrap();
        ledger.insert_guarantor(g).unwrap();

        let err = ledger.delete_guarantor(g_id).unwrap_err();
        assert!(matches!(err, LendingError::Conflict { .. }));
        assert!(ledger.find_guarantor(g_id).unwrap().is_some());
    }

    #[test]
    fn test_guarantor_requires_existing_loan() {
        let mut ledger = MemoryLedger::new();
        let orphan = GuarantorRequest::pending(uuid::Uuid::new_v4(), "G-1".to_string(), now());
        assert!(matches!(
            ledger.insert_guarantor(orphan),
            Err(LendingError::NotFound { .. })
        ));
    }
}
