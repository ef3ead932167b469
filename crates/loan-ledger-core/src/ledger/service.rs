use chrono::NaiveDate;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::store::LedgerStore;
use crate::amortization::verify::{self, ScheduleVerification};
use crate::config::EngineConfig;
use crate::loan::{BorrowerId, Installment, Loan, LoanId, LoanStatus, LoanTerms};
use crate::session::{Capability, Session};
use crate::types::{Money, Rate};
use crate::error::LoanLedgerError;
use crate::LedgerResult;

/// Runs ledger mutations against a store.
///
/// Every mutation checks the session's capability, loads the loan fresh,
/// applies the change and saves it under the store's version check. On a
/// version conflict the whole load-mutate-save cycle is retried against the
/// new state, up to `ledger.max_conflict_retries` times.
pub struct LedgerService<S: LedgerStore> {
    store: S,
    config: EngineConfig,
    clock: Box<dyn Clock>,
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Generate the schedule and store the new loan. Without an id the store
    /// allocates one; if another writer takes it first a fresh id is tried,
    /// up to `ledger.max_conflict_retries` times.
    pub fn open_loan(
        &self,
        session: &Session,
        id: Option<LoanId>,
        borrower_id: BorrowerId,
        terms: LoanTerms,
    ) -> LedgerResult<Loan> {
        session.require(Capability::OpenLoan)?;
        let retries = self.config.ledger.max_conflict_retries;
        let mut attempt = 0;
        let stored = loop {
            let loan_id = match id {
                Some(id) => id,
                None => self.store.allocate_id()?,
            };
            let loan = Loan::new(loan_id, borrower_id, terms.clone(), &self.config.schedule)?;
            match self.store.insert(loan) {
                Ok(stored) => break stored,
                Err(LoanLedgerError::LoanExists(taken)) if id.is_none() && attempt < retries => {
                    attempt += 1;
                    warn!(loan_id = %taken, attempt, "Allocated id taken, retrying");
                }
                Err(e) => return Err(e),
            }
        };
        info!(
            loan_id = %stored.id,
            borrower_id = %stored.borrower_id,
            user = %session.user,
            principal = %stored.terms.principal,
            installments = stored.installments.len(),
            "Loan opened"
        );
        Ok(stored)
    }

    /// Record a payment; `date` defaults to today.
    pub fn record_payment(
        &self,
        session: &Session,
        loan_id: LoanId,
        sequence: u32,
        amount: Money,
        date: Option<NaiveDate>,
    ) -> LedgerResult<Installment> {
        session.require(Capability::RecordPayment)?;
        let date = date.unwrap_or_else(|| self.today());
        let matching = self.config.ledger.payment_matching;
        let (_, inst) = self.mutate(loan_id, |loan| {
            loan.record_payment(sequence, amount, date, matching)
        })?;
        info!(
            loan_id = %loan_id,
            sequence,
            amount = %amount,
            status = ?inst.status,
            user = %session.user,
            "Payment recorded"
        );
        Ok(inst)
    }

    pub fn cancel_installment(
        &self,
        session: &Session,
        loan_id: LoanId,
        sequence: u32,
    ) -> LedgerResult<Installment> {
        session.require(Capability::CancelInstallment)?;
        let (_, inst) = self.mutate(loan_id, |loan| loan.cancel_installment(sequence))?;
        info!(loan_id = %loan_id, sequence, user = %session.user, "Installment cancelled");
        Ok(inst)
    }

    /// Apply a late fee as of today; `rate` defaults to the loan's late rate.
    pub fn apply_late_fee(
        &self,
        session: &Session,
        loan_id: LoanId,
        sequence: u32,
        rate: Option<Rate>,
    ) -> LedgerResult<Installment> {
        session.require(Capability::ApplyLateFee)?;
        let as_of = self.today();
        let (_, inst) = self.mutate(loan_id, |loan| loan.apply_late_fee(sequence, rate, as_of))?;
        info!(
            loan_id = %loan_id,
            sequence,
            late_fee = %inst.late_fee,
            user = %session.user,
            "Late fee applied"
        );
        Ok(inst)
    }

    pub fn reschedule(
        &self,
        session: &Session,
        loan_id: LoanId,
        terms: LoanTerms,
    ) -> LedgerResult<Loan> {
        session.require(Capability::Reschedule)?;
        let (loan, _) = self.mutate(loan_id, |loan| loan.reschedule(terms.clone()))?;
        info!(loan_id = %loan_id, user = %session.user, "Loan rescheduled");
        Ok(loan)
    }

    pub fn delete_loan(&self, session: &Session, loan_id: LoanId) -> LedgerResult<()> {
        session.require(Capability::DeleteLoan)?;
        let mut attempt = 0;
        loop {
            let loan = self.store.load(loan_id)?;
            match self.store.remove(loan_id, loan.version) {
                Ok(()) => {
                    info!(loan_id = %loan_id, user = %session.user, "Loan deleted");
                    return Ok(());
                }
                Err(e) if e.is_conflict() && attempt < self.config.ledger.max_conflict_retries => {
                    attempt += 1;
                    warn!(loan_id = %loan_id, attempt, "Version conflict on delete, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn loan(&self, loan_id: LoanId) -> LedgerResult<Loan> {
        self.store.load(loan_id)
    }

    pub fn loans(&self) -> LedgerResult<Vec<Loan>> {
        self.store.list()
    }

    /// Loans made to `borrower_id`, ordered by id.
    pub fn loans_for_borrower(&self, borrower_id: BorrowerId) -> LedgerResult<Vec<Loan>> {
        let mut loans = self.store.list()?;
        loans.retain(|l| l.borrower_id == borrower_id);
        Ok(loans)
    }

    pub fn loan_status(&self, loan_id: LoanId) -> LedgerResult<LoanStatus> {
        Ok(self.store.load(loan_id)?.status())
    }

    /// Overdue installments across all loans as of `as_of` (default today).
    pub fn overdue(&self, as_of: Option<NaiveDate>) -> LedgerResult<Vec<Installment>> {
        let as_of = as_of.unwrap_or_else(|| self.today());
        Ok(self
            .store
            .list()?
            .iter()
            .flat_map(|l| l.overdue_installments(as_of).cloned().collect::<Vec<_>>())
            .collect())
    }

    /// Recompute every stored schedule under its own snapshotted
    /// conventions and compare.
    pub fn verify(&self) -> LedgerResult<Vec<ScheduleVerification>> {
        let loans = self.store.list()?;
        Ok(verify::verify_all(&loans))
    }

    #[cfg(feature = "portfolio")]
    pub fn summary(
        &self,
        as_of: Option<NaiveDate>,
    ) -> LedgerResult<crate::portfolio::PortfolioSummary> {
        let as_of = as_of.unwrap_or_else(|| self.today());
        Ok(crate::portfolio::summarize(&self.store.list()?, as_of))
    }

    fn mutate<T>(
        &self,
        loan_id: LoanId,
        op: impl Fn(&mut Loan) -> LedgerResult<T>,
    ) -> LedgerResult<(Loan, T)> {
        let retries = self.config.ledger.max_conflict_retries;
        let mut attempt = 0;
        loop {
            let mut loan = self.store.load(loan_id)?;
            let out = op(&mut loan)?;
            match self.store.save(&loan) {
                Ok(saved) => return Ok((saved, out)),
                Err(e) if e.is_conflict() && attempt < retries => {
                    attempt += 1;
                    warn!(loan_id = %loan_id, attempt, "Version conflict, reloading");
                }
                Err(e) => {
                    if e.is_conflict() {
                        warn!(loan_id = %loan_id, retries, "Giving up after version conflicts");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentMatching;
    use crate::ledger::clock::FixedClock;
    use crate::ledger::store::InMemoryLedgerStore;
    use crate::loan::{InstallmentStatus, InterestMode};
    use crate::session::Role;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn terms() -> LoanTerms {
        LoanTerms::new(
            dec!(1200.00),
            dec!(0.12),
            12,
            InterestMode::Simple,
            date(2024, 1, 1),
        )
        .with_late_rate(dec!(0.10))
    }

    fn service() -> LedgerService<InMemoryLedgerStore> {
        LedgerService::new(InMemoryLedgerStore::new(), EngineConfig::default())
            .with_clock(FixedClock(date(2024, 3, 15)))
    }

    fn admin() -> Session {
        Session::new("admin", Role::Admin)
    }

    #[test]
    fn test_open_assigns_next_id() {
        let svc = service();
        let a = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        let b = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        assert_eq!(a.id, LoanId(1));
        assert_eq!(b.id, LoanId(2));
        assert_eq!(a.version, 1);
    }

    #[test]
    fn test_deleted_id_not_reused() {
        let svc = service();
        svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        let b = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        svc.delete_loan(&admin(), b.id).unwrap();
        let c = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        assert_eq!(c.id, LoanId(3));
    }

    #[test]
    fn test_explicit_id_collision_not_retried() {
        let svc = service();
        svc.open_loan(&admin(), Some(LoanId(9)), BorrowerId(1), terms()).unwrap();
        let err = svc
            .open_loan(&admin(), Some(LoanId(9)), BorrowerId(2), terms())
            .unwrap_err();
        assert_eq!(err, LoanLedgerError::LoanExists(LoanId(9)));
    }

    #[test]
    fn test_loans_for_borrower() {
        let svc = service();
        svc.open_loan(&admin(), None, BorrowerId(7), terms()).unwrap();
        svc.open_loan(&admin(), None, BorrowerId(8), terms()).unwrap();
        svc.open_loan(&admin(), None, BorrowerId(7), terms()).unwrap();
        let ids: Vec<LoanId> = svc
            .loans_for_borrower(BorrowerId(7))
            .unwrap()
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![LoanId(1), LoanId(3)]);
        assert!(svc.loans_for_borrower(BorrowerId(9)).unwrap().is_empty());
    }

    #[test]
    fn test_payment_defaults_to_today_and_bumps_version() {
        let svc = service();
        let loan = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        let inst = svc
            .record_payment(&admin(), loan.id, 1, dec!(111.84), None)
            .unwrap();
        assert_eq!(inst.paid_date, Some(date(2024, 3, 15)));
        assert_eq!(svc.loan(loan.id).unwrap().version, 2);
    }

    #[test]
    fn test_failed_payment_leaves_store_untouched() {
        let svc = service();
        let loan = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        svc.record_payment(&admin(), loan.id, 1, dec!(111.84), None)
            .unwrap();
        let before = svc.loan(loan.id).unwrap();
        let err = svc
            .record_payment(&admin(), loan.id, 1, dec!(111.84), None)
            .unwrap_err();
        assert!(matches!(err, LoanLedgerError::AlreadyPaid { .. }));
        assert_eq!(svc.loan(loan.id).unwrap(), before);
    }

    #[test]
    fn test_capability_checked_before_mutation() {
        let svc = service();
        let loan = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        let operator = Session::new("op", Role::Operator);
        let err = svc.cancel_installment(&operator, loan.id, 1).unwrap_err();
        assert!(matches!(err, LoanLedgerError::PermissionDenied { .. }));
        assert_eq!(svc.loan(loan.id).unwrap().version, 1);
    }

    #[test]
    fn test_overdue_as_of_clock() {
        let svc = service();
        svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        // due 2024-01-31 and 2024-03-01 are past 2024-03-15
        let overdue = svc.overdue(None).unwrap();
        assert_eq!(overdue.len(), 2);
        assert_eq!(overdue[0].sequence, 1);
    }

    #[test]
    fn test_late_fee_then_exact_payment() {
        let svc = service();
        let loan = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        let inst = svc.apply_late_fee(&admin(), loan.id, 1, None).unwrap();
        assert_eq!(inst.late_fee, dec!(11.18));
        let paid = svc
            .record_payment(&admin(), loan.id, 1, dec!(123.02), None)
            .unwrap();
        assert_eq!(paid.status, InstallmentStatus::Paid);
    }

    #[test]
    fn test_partial_matching_from_config() {
        let mut config = EngineConfig::default();
        config.ledger.payment_matching = PaymentMatching::PartialAllowed;
        let svc = LedgerService::new(InMemoryLedgerStore::new(), config)
            .with_clock(FixedClock(date(2024, 1, 10)));
        let loan = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        let inst = svc
            .record_payment(&admin(), loan.id, 1, dec!(11.84), None)
            .unwrap();
        assert_eq!(inst.status, InstallmentStatus::Pending);
        assert_eq!(inst.outstanding(), dec!(100.00));
    }

    #[test]
    fn test_delete_and_status() {
        let svc = service();
        let loan = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        assert_eq!(svc.loan_status(loan.id).unwrap(), LoanStatus::Active);
        svc.delete_loan(&admin(), loan.id).unwrap();
        assert_eq!(
            svc.loan(loan.id).unwrap_err(),
            LoanLedgerError::LoanNotFound(loan.id)
        );
    }

    #[test]
    fn test_reschedule_through_service() {
        let svc = service();
        let loan = svc.open_loan(&admin(), None, BorrowerId(1), terms()).unwrap();
        let mut new_terms = terms();
        new_terms.interest_mode = InterestMode::Compound;
        let updated = svc.reschedule(&admin(), loan.id, new_terms).unwrap();
        assert_eq!(updated.terms.interest_mode, InterestMode::Compound);
        assert_eq!(updated.version, 2);
        assert!(svc.verify().unwrap().iter().all(|v| v.consistent));
    }
}
