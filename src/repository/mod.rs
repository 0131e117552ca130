//! Repository contracts and the transactional store seam.
//!
//! Core operations never touch storage directly: they receive a `&mut L`
//! where `L: Ledger` inside [`Store::transaction`], so every read of the
//! guarantor aggregate and the period totals happens in the same atomic unit
//! as the writes that depend on it.

pub mod memory;

use crate::decimal::Money;
use crate::errors::{LendingError, Result};
use crate::guarantor::GuarantorRequest;
use crate::loan::LoanRequest;
use crate::period::PeriodLimit;
use crate::types::{GuarantorRequestId, LoanId};

pub use memory::{MemoryLedger, MemoryStore};

pub trait LoanRepository {
    fn insert_loan(&mut self, loan: LoanRequest) -> Result<()>;

    fn find_loan(&self, id: LoanId) -> Result<Option<LoanRequest>>;

    fn update_loan(&mut self, loan: &LoanRequest) -> Result<()>;

    /// loans of one member, oldest first
    fn loans_by_requester(&self, requester_id: &str) -> Result<Vec<LoanRequest>>;

    /// loans scoped to one payroll period, oldest first
    fn loans_in_period(&self, period_id: &str) -> Result<Vec<LoanRequest>>;

    /// the member's non-rejected, non-cancelled loan in a period, if any
    fn active_loan_for(&self, requester_id: &str, period_id: &str) -> Result<Option<LoanRequest>> {
        Ok(self
            .loans_by_requester(requester_id)?
            .into_iter()
            .find(|l| l.period_id == period_id && l.status.is_active()))
    }

    /// requested principal of submitted + approved loans in a period
    fn committed_total(&self, period_id: &str, excluding: Option<LoanId>) -> Result<Money> {
        let committed = self
            .loans_in_period(period_id)?
            .into_iter()
            .filter(|l| l.status.commits_period_funds() && Some(l.id) != excluding)
            .map(|l| l.requested_amount);
        Money::checked_sum(committed).ok_or_else(|| LendingError::overflow("committed period total"))
    }
}

pub trait GuarantorRepository {
    fn insert_guarantor(&mut self, request: GuarantorRequest) -> Result<()>;

    fn find_guarantor(&self, id: GuarantorRequestId) -> Result<Option<GuarantorRequest>>;

    fn update_guarantor(&mut self, request: &GuarantorRequest) -> Result<()>;

    /// hard delete; approved rows are refused
    fn delete_guarantor(&mut self, id: GuarantorRequestId) -> Result<()>;

    /// guarantor rows for a loan, in request order
    fn guarantors_for_loan(&self, loan_id: LoanId) -> Result<Vec<GuarantorRequest>>;
}

pub trait PeriodLimitRepository {
    fn find_period_limit(&self, period_id: &str) -> Result<Option<PeriodLimit>>;

    fn upsert_period_limit(&mut self, limit: PeriodLimit) -> Result<()>;
}

/// everything a core operation can read or write within one transaction
pub trait Ledger: LoanRepository + GuarantorRepository + PeriodLimitRepository {}

impl<T> Ledger for T where T: LoanRepository + GuarantorRepository + PeriodLimitRepository {}

/// Transactional access to the ledger.
///
/// `transaction` must be all-or-nothing: when the closure returns `Err`, no
/// write it made may become visible. Implementations must also serialize
/// transactions touching the same loan (a row lock or serializable
/// isolation).
pub trait Store {
    type Ledger: Ledger;

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Ledger) -> Result<T>;

    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self::Ledger) -> Result<T>;
}
