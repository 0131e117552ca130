//! Loan desk: the operation facade.
//!
//! Every operation authorizes the caller, runs its reads and writes inside a
//! single [`Store::transaction`], and only after commit hands the collected
//! notifications to the dispatcher.

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info};

use crate::auth::{authorize, Access};
use crate::config::LendingConfig;
use crate::decimal::Money;
use crate::directory::{Affordability, MemberDirectory, SalaryCapacityOracle};
use crate::engine::{self, LimitCheck, Trigger};
use crate::errors::{LendingError, Result};
use crate::guarantor::GuarantorRequest;
use crate::loan::LoanRequest;
use crate::notifications::{dispatch_all, Notification, NotificationDispatcher, Outbox, RejectionReason};
use crate::patch::{LoanPatch, PeriodLimitPatch};
use crate::period::{PeriodLimit, PeriodUsage};
use crate::repository::{GuarantorRepository, LoanRepository, PeriodLimitRepository, Store};
use crate::types::{
    ActorContext, GuarantorDecision, GuarantorRequestId, GuarantorStatus, LoanId, LoanStatus,
};
use crate::views::LoanView;

/// cooperative loan desk
pub struct LoanDesk<'t, S, D, N> {
    store: S,
    directory: D,
    dispatcher: N,
    config: LendingConfig,
    time: &'t SafeTimeProvider,
}

impl<'t, S, D, N> LoanDesk<'t, S, D, N>
where
    S: Store,
    D: MemberDirectory,
    N: NotificationDispatcher,
{
    /// create a desk with the default configuration
    pub fn new(store: S, directory: D, dispatcher: N, time: &'t SafeTimeProvider) -> Self {
        Self {
            store,
            directory,
            dispatcher,
            config: LendingConfig::default(),
            time,
        }
    }

    /// replace the configuration after validating it
    pub fn with_config(mut self, config: LendingConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &N {
        &self.dispatcher
    }

    fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// run `f` in one transaction, then deliver whatever it queued
    fn commit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut S::Ledger, &mut Outbox) -> Result<T>,
    {
        let mut outbox = Outbox::new();
        let value = self.store.transaction(|ledger| f(ledger, &mut outbox))?;
        self.deliver(outbox.take());
        Ok(value)
    }

    fn deliver(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        let report = dispatch_all(&self.dispatcher, &notifications);
        debug!(sent = report.sent, failed = report.failed, "Notifications dispatched");
    }

    fn require_member(&self, member_id: &str, role: &str) -> Result<()> {
        if self.directory.get_member(member_id).is_none() {
            return Err(LendingError::not_found("member", member_id));
        }
        if !self.directory.is_active_member(member_id) {
            return Err(LendingError::validation(format!(
                "{} {} is not an active member",
                role, member_id
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // loan requests
    // ---------------------------------------------------------------

    /// create a draft loan for `requester_id`; admins may act as proxy
    pub fn create_loan(
        &self,
        actor: &ActorContext,
        requester_id: &str,
        period_id: &str,
        amount: Money,
    ) -> Result<LoanRequest> {
        authorize(actor, "create_loan", Access::OwnerOrAdmin(requester_id))?;

        if !amount.is_positive() {
            return Err(LendingError::validation("loan amount must be greater than zero"));
        }
        if let Some(minimum) = self.config.minimum_request {
            if amount < minimum {
                return Err(LendingError::validation(format!(
                    "loan amount {} is below the minimum of {}",
                    amount, minimum
                )));
            }
        }
        if period_id.trim().is_empty() {
            return Err(LendingError::validation("period is required"));
        }
        self.require_member(requester_id, "requester")?;

        let now = self.now();
        let loan = self.commit(|ledger, _| {
            if let Some(existing) = ledger.active_loan_for(requester_id, period_id)? {
                return Err(LendingError::conflict(format!(
                    "{} already has an active loan request {} for period {}",
                    requester_id, existing.id, period_id
                )));
            }
            let loan = LoanRequest::draft(
                requester_id.to_string(),
                period_id.to_string(),
                amount,
                actor.id.clone(),
                &self.config,
                now,
            );
            ledger.insert_loan(loan.clone())?;
            Ok(loan)
        })?;

        info!(
            loan_id = %loan.id,
            requester = %loan.requester_id,
            period = %loan.period_id,
            amount = %loan.requested_amount,
            "Loan request created"
        );
        Ok(loan)
    }

    /// fetch a loan; visible to its requester, its guarantors and admins
    pub fn get_loan(&self, actor: &ActorContext, loan_id: LoanId) -> Result<LoanRequest> {
        let (loan, guarantors) = self.load(loan_id)?;
        self.authorize_viewer(actor, "view_loan", &loan, &guarantors)?;
        Ok(loan)
    }

    /// loans of one member, oldest first
    pub fn list_by_requester(&self, actor: &ActorContext, requester_id: &str) -> Result<Vec<LoanRequest>> {
        authorize(actor, "list_loans", Access::OwnerOrAdmin(requester_id))?;
        self.store.read(|ledger| ledger.loans_by_requester(requester_id))
    }

    /// every loan in a period (admin listing)
    pub fn list_by_period(&self, actor: &ActorContext, period_id: &str) -> Result<Vec<LoanRequest>> {
        authorize(actor, "list_period_loans", Access::Admin)?;
        self.store.read(|ledger| ledger.loans_in_period(period_id))
    }

    /// admin edit of a loan that has not been submitted yet
    pub fn update_loan(&self, actor: &ActorContext, loan_id: LoanId, patch: &LoanPatch) -> Result<LoanRequest> {
        authorize(actor, "update_loan", Access::Admin)?;
        let now = self.now();
        self.commit(|ledger, _| {
            let mut loan = find_loan(ledger, loan_id)?;
            patch.apply(&mut loan, &self.config, now)?;
            ledger.update_loan(&loan)?;
            Ok(loan)
        })
    }

    /// withdraw a loan before it is submitted
    pub fn cancel_loan(&self, actor: &ActorContext, loan_id: LoanId) -> Result<LoanRequest> {
        let now = self.now();
        let loan = self.commit(|ledger, outbox| {
            let mut loan = find_loan(ledger, loan_id)?;
            authorize(actor, "cancel_loan", Access::OwnerOrAdmin(&loan.requester_id))?;

            if !matches!(
                loan.status,
                LoanStatus::Draft | LoanStatus::PendingGuarantors | LoanStatus::PartiallyGuaranteed
            ) {
                return Err(LendingError::validation(format!(
                    "loan {} is {} and can no longer be cancelled",
                    loan.id, loan.status
                )));
            }

            loan.set_status(LoanStatus::Cancelled, now);
            ledger.update_loan(&loan)?;

            for g in ledger.guarantors_for_loan(loan_id)? {
                if g.status.is_live() {
                    outbox.push(Notification::GuaranteedLoanCancelled {
                        loan_id,
                        guarantor_id: g.guarantor_id,
                        requester_id: loan.requester_id.clone(),
                    });
                }
            }
            Ok(loan)
        })?;

        info!(loan_id = %loan.id, actor = %actor.id, "Loan request cancelled");
        Ok(loan)
    }

    /// mark a loan submitted outside the guarantor flow; still bound by the period limit
    pub fn mark_submitted(&self, actor: &ActorContext, loan_id: LoanId) -> Result<LoanRequest> {
        authorize(actor, "mark_submitted", Access::Admin)?;
        let now = self.now();
        self.commit(|ledger, outbox| {
            let mut loan = find_loan(ledger, loan_id)?;
            if loan.status.is_locked() {
                return Err(LendingError::validation(format!(
                    "loan {} is {} and cannot be submitted",
                    loan.id, loan.status
                )));
            }
            if let LimitCheck::Exceeded(breach) = engine::check_period_limit(&*ledger, &loan, &self.config)? {
                return Err(breach.into());
            }

            loan.set_status(LoanStatus::Submitted, now);
            ledger.update_loan(&loan)?;
            outbox.push(Notification::LoanSubmitted {
                loan_id: loan.id,
                requester_id: loan.requester_id.clone(),
                amount: loan.requested_amount,
            });
            info!(loan_id = %loan.id, actor = %actor.id, "Loan marked submitted");
            Ok(loan)
        })
    }

    /// reject a loan that has not been approved
    pub fn mark_rejected(&self, actor: &ActorContext, loan_id: LoanId) -> Result<LoanRequest> {
        authorize(actor, "mark_rejected", Access::Admin)?;
        let now = self.now();
        self.commit(|ledger, outbox| {
            let mut loan = find_loan(ledger, loan_id)?;
            if loan.status.is_terminal() {
                return Err(LendingError::validation(format!(
                    "loan {} is {} and cannot be rejected",
                    loan.id, loan.status
                )));
            }

            loan.set_status(LoanStatus::Rejected, now);
            ledger.update_loan(&loan)?;
            outbox.push(Notification::LoanRejected {
                loan_id: loan.id,
                requester_id: loan.requester_id.clone(),
                reason: RejectionReason::Admin,
            });
            info!(loan_id = %loan.id, actor = %actor.id, "Loan marked rejected");
            Ok(loan)
        })
    }

    // ---------------------------------------------------------------
    // guarantors
    // ---------------------------------------------------------------

    /// ask `guarantor_id` to co-sign a loan
    pub fn request_guarantor(
        &self,
        actor: &ActorContext,
        loan_id: LoanId,
        guarantor_id: &str,
    ) -> Result<GuarantorRequest> {
        let now = self.now();
        let max = self.config.max_guarantors;

        let request = self.commit(|ledger, outbox| {
            let loan = find_loan(ledger, loan_id)?;
            authorize(actor, "request_guarantor", Access::OwnerOrAdmin(&loan.requester_id))?;

            if loan.status.is_locked() {
                return Err(LendingError::validation(format!(
                    "loan {} is {} and no longer accepts guarantors",
                    loan.id, loan.status
                )));
            }
            if guarantor_id == loan.requester_id {
                return Err(LendingError::validation("a member cannot guarantee their own loan"));
            }
            if !self.directory.is_active_member(guarantor_id) {
                return Err(LendingError::validation(format!(
                    "guarantor {} is not an active member",
                    guarantor_id
                )));
            }

            let rows = ledger.guarantors_for_loan(loan_id)?;
            let same: Vec<&GuarantorRequest> = rows.iter().filter(|g| g.guarantor_id == guarantor_id).collect();
            if same.iter().any(|g| g.status == GuarantorStatus::Approved) {
                return Err(LendingError::conflict(format!(
                    "{} has already approved this loan",
                    guarantor_id
                )));
            }
            if same.iter().any(|g| g.status == GuarantorStatus::Pending) {
                return Err(LendingError::conflict(format!(
                    "a request to {} is already pending",
                    guarantor_id
                )));
            }
            for rejected in same.iter().filter(|g| g.status == GuarantorStatus::Rejected) {
                ledger.delete_guarantor(rejected.id)?;
            }

            let rows = ledger.guarantors_for_loan(loan_id)?;
            let live = rows.iter().filter(|g| g.status.is_live()).count();
            if live >= max {
                return Err(LendingError::conflict(format!("maximum {} guarantors", max)));
            }
            // a free slot held by another member's rejection is taken over
            if rows.len() >= max {
                if let Some(oldest) = rows.iter().find(|g| g.status == GuarantorStatus::Rejected) {
                    ledger.delete_guarantor(oldest.id)?;
                }
            }

            let request = GuarantorRequest::pending(loan_id, guarantor_id.to_string(), now);
            ledger.insert_guarantor(request.clone())?;

            outbox.push(Notification::GuaranteeRequested {
                loan_id,
                guarantor_id: guarantor_id.to_string(),
                requester_id: loan.requester_id.clone(),
                amount: loan.requested_amount,
            });
            let transition = engine::recompute(
                ledger,
                loan_id,
                Trigger::GuarantorRequested {
                    guarantor_id: guarantor_id.to_string(),
                },
                &self.config,
                now,
            )?;
            outbox.extend(transition.notifications);
            Ok(request)
        })?;

        info!(
            loan_id = %loan_id,
            guarantor = %guarantor_id,
            request_id = %request.id,
            "Guarantor requested"
        );
        Ok(request)
    }

    /// record a guarantor's decision and recompute the loan status
    ///
    /// When the second approval would push the period over its limit the
    /// response is still committed, the loan is rejected, and the call
    /// returns [`LendingError::LimitExceeded`].
    pub fn respond(
        &self,
        actor: &ActorContext,
        request_id: GuarantorRequestId,
        decision: GuarantorDecision,
        notes: Option<String>,
    ) -> Result<GuarantorRequest> {
        let now = self.now();
        let (request, transition) = self.commit(|ledger, outbox| {
            let mut request = ledger
                .find_guarantor(request_id)?
                .ok_or_else(|| LendingError::not_found("guarantor request", request_id))?;
            authorize(actor, "respond_guarantor", Access::OwnerOrAdmin(&request.guarantor_id))?;

            if request.status != GuarantorStatus::Pending {
                return Err(LendingError::validation(format!(
                    "guarantor request {} was already {}",
                    request.id, request.status
                )));
            }
            let loan = find_loan(ledger, request.loan_request_id)?;
            if loan.status.is_locked() {
                return Err(LendingError::validation(format!(
                    "loan {} is {} and no longer accepts responses",
                    loan.id, loan.status
                )));
            }

            request.record_response(decision, notes, now);
            ledger.update_guarantor(&request)?;

            let transition = engine::recompute(
                ledger,
                request.loan_request_id,
                Trigger::GuarantorResponded {
                    guarantor_id: request.guarantor_id.clone(),
                    decision,
                },
                &self.config,
                now,
            )?;
            outbox.extend(transition.notifications.iter().cloned());
            Ok((request, transition))
        })?;

        info!(
            request_id = %request.id,
            loan_id = %request.loan_request_id,
            decision = ?decision,
            loan_status = %transition.to,
            "Guarantor responded"
        );

        match transition.limit_breach {
            Some(breach) => Err(breach.into()),
            None => Ok(request),
        }
    }

    /// guarantor rows of a loan
    pub fn list_guarantors(&self, actor: &ActorContext, loan_id: LoanId) -> Result<Vec<GuarantorRequest>> {
        let (loan, guarantors) = self.load(loan_id)?;
        self.authorize_viewer(actor, "list_guarantors", &loan, &guarantors)?;
        Ok(guarantors)
    }

    // ---------------------------------------------------------------
    // admin approval and carry-forward
    // ---------------------------------------------------------------

    /// approve a loan fully or partially
    ///
    /// Without `skip_guarantor` the loan must have been submitted through the
    /// guarantor flow. Pending guarantor rows are left as they are.
    pub fn approve(
        &self,
        actor: &ActorContext,
        loan_id: LoanId,
        approved_amount: Option<Money>,
        skip_guarantor: bool,
    ) -> Result<LoanRequest> {
        authorize(actor, "approve_loan", Access::Admin)?;
        let now = self.now();

        let loan = self.commit(|ledger, outbox| {
            let mut loan = find_loan(ledger, loan_id)?;
            if loan.status == LoanStatus::Approved {
                return Err(LendingError::validation(format!("loan {} is already approved", loan.id)));
            }
            if !skip_guarantor && loan.status != LoanStatus::Submitted && !loan.status.is_terminal() {
                return Err(LendingError::validation(format!(
                    "loan {} is {}; guarantors must complete first or skip_guarantor must be set",
                    loan.id, loan.status
                )));
            }

            // a loan approved outside the guarantor flow joins the committed total here
            if loan.status != LoanStatus::Submitted && !loan.status.is_terminal() {
                if let LimitCheck::Exceeded(breach) = engine::check_period_limit(&*ledger, &loan, &self.config)? {
                    return Err(breach.into());
                }
            }

            loan.approve(approved_amount, actor.id.clone(), &self.config, now)?;
            ledger.update_loan(&loan)?;

            let approved = loan.approved_amount.unwrap_or(loan.requested_amount);
            outbox.push(Notification::LoanApproved {
                loan_id: loan.id,
                requester_id: loan.requester_id.clone(),
                requested: loan.requested_amount,
                approved,
                outstanding: loan.outstanding_amount.unwrap_or(Money::ZERO),
            });
            Ok(loan)
        })?;

        info!(
            loan_id = %loan.id,
            approved_by = %actor.id,
            requested = %loan.requested_amount,
            approved = %loan.effective_amount(),
            skip_guarantor,
            "Loan approved"
        );
        Ok(loan)
    }

    /// carry an approved loan's outstanding balance into `target_period`
    pub fn reimport_outstanding(
        &self,
        actor: &ActorContext,
        loan_id: LoanId,
        target_period: &str,
    ) -> Result<LoanRequest> {
        authorize(actor, "reimport_outstanding", Access::Admin)?;
        let now = self.now();

        let (source, imported) = self.commit(|ledger, outbox| {
            let mut source = find_loan(ledger, loan_id)?;
            if source.status != LoanStatus::Approved || !source.has_outstanding() {
                return Err(LendingError::validation(format!(
                    "loan {} has no approved outstanding balance to import",
                    source.id
                )));
            }
            if source.period_id == target_period {
                return Err(LendingError::validation(format!(
                    "outstanding balance must move to a different period than {}",
                    target_period
                )));
            }
            if let Some(existing) = ledger.active_loan_for(&source.requester_id, target_period)? {
                return Err(LendingError::conflict(format!(
                    "{} already has an active loan request {} for period {}",
                    source.requester_id, existing.id, target_period
                )));
            }

            let imported =
                LoanRequest::carry_forward(&source, target_period.to_string(), actor.id.clone(), &self.config, now)?;
            source.outstanding_amount = Some(Money::ZERO);
            source.updated_at = now;
            ledger.update_loan(&source)?;
            ledger.insert_loan(imported.clone())?;

            outbox.push(Notification::OutstandingImported {
                source_loan_id: source.id,
                loan_id: imported.id,
                requester_id: imported.requester_id.clone(),
                period_id: imported.period_id.clone(),
                amount: imported.requested_amount,
            });
            Ok((source, imported))
        })?;

        info!(
            source_loan_id = %source.id,
            loan_id = %imported.id,
            period = %imported.period_id,
            amount = %imported.requested_amount,
            "Outstanding balance imported"
        );
        Ok(imported)
    }

    // ---------------------------------------------------------------
    // period limits
    // ---------------------------------------------------------------

    /// create or edit the limit of a period
    pub fn set_period_limit(
        &self,
        actor: &ActorContext,
        period_id: &str,
        patch: &PeriodLimitPatch,
    ) -> Result<PeriodLimit> {
        authorize(actor, "set_period_limit", Access::Admin)?;
        let now = self.now();
        let limit = self.commit(|ledger, _| {
            let existing = ledger.find_period_limit(period_id)?;
            let limit = patch.apply(existing, period_id.to_string(), actor.id.clone(), now)?;
            ledger.upsert_period_limit(limit.clone())?;
            Ok(limit)
        })?;

        info!(period = %limit.period_id, limit = %limit.limit_amount, set_by = %limit.set_by, "Period limit set");
        Ok(limit)
    }

    pub fn period_limit(&self, actor: &ActorContext, period_id: &str) -> Result<Option<PeriodLimit>> {
        authorize(actor, "view_period_limit", Access::Member)?;
        self.store.read(|ledger| ledger.find_period_limit(period_id))
    }

    /// committed principal against the period's limit
    pub fn period_usage(&self, actor: &ActorContext, period_id: &str) -> Result<PeriodUsage> {
        authorize(actor, "view_period_usage", Access::Admin)?;
        self.store.read(|ledger| {
            let limit = ledger.find_period_limit(period_id)?;
            let committed = ledger.committed_total(period_id, None)?;
            Ok(PeriodUsage::new(period_id.to_string(), limit.as_ref(), committed))
        })
    }

    // ---------------------------------------------------------------
    // read models and pre-checks
    // ---------------------------------------------------------------

    /// loan with its guarantors and requester details
    pub fn loan_view(&self, actor: &ActorContext, loan_id: LoanId) -> Result<LoanView> {
        let (loan, guarantors) = self.load(loan_id)?;
        self.authorize_viewer(actor, "view_loan", &loan, &guarantors)?;
        let requester = self.directory.get_member(&loan.requester_id);
        Ok(LoanView::new(loan, guarantors, requester))
    }

    /// salary-capacity pre-check, made before a loan is created
    pub fn check_affordability<O>(
        &self,
        actor: &ActorContext,
        oracle: &O,
        requester_id: &str,
        period_id: &str,
        amount: Money,
    ) -> Result<Affordability>
    where
        O: SalaryCapacityOracle + ?Sized,
    {
        authorize(actor, "check_affordability", Access::OwnerOrAdmin(requester_id))?;
        if !amount.is_positive() {
            return Err(LendingError::validation("loan amount must be greater than zero"));
        }

        let capacity = oracle
            .deduction_capacity(requester_id, &period_id.to_string())
            .map_err(|e| LendingError::Oracle { message: e.message })?;
        let assessment = Affordability::assess(
            capacity,
            self.config.monthly_repayment(amount),
            self.config.max_deduction_ratio,
        );

        debug!(
            requester = %requester_id,
            period = %period_id,
            repayment = %assessment.monthly_repayment,
            affordable = assessment.affordable,
            "Affordability checked"
        );
        Ok(assessment)
    }

    fn load(&self, loan_id: LoanId) -> Result<(LoanRequest, Vec<GuarantorRequest>)> {
        self.store.read(|ledger| {
            let loan = find_loan(ledger, loan_id)?;
            let guarantors = ledger.guarantors_for_loan(loan_id)?;
            Ok((loan, guarantors))
        })
    }

    fn authorize_viewer(
        &self,
        actor: &ActorContext,
        operation: &'static str,
        loan: &LoanRequest,
        guarantors: &[GuarantorRequest],
    ) -> Result<()> {
        if guarantors.iter().any(|g| g.guarantor_id == actor.id) {
            authorize(actor, operation, Access::Member)
        } else {
            authorize(actor, operation, Access::OwnerOrAdmin(&loan.requester_id))
        }
    }
}

fn find_loan<L>(ledger: &L, loan_id: LoanId) -> Result<LoanRequest>
where
    L: LoanRepository + ?Sized,
{
    ledger
        .find_loan(loan_id)?
        .ok_or_else(|| LendingError::not_found("loan", loan_id))
}
