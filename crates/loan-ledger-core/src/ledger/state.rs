//! Installment state machine.
//!
//! PENDING -> PAID via a payment, PENDING -> CANCELLED administratively.
//! PAID and CANCELLED are terminal. OVERDUE is only ever a projection of a
//! PENDING installment past its due date. A failed transition leaves the
//! installment untouched.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{PaymentMatching, ScheduleConfig};
use crate::error::LoanLedgerError;
use crate::loan::{Installment, InstallmentStatus, Loan, LoanStatus, LoanTerms, PaymentRecord};
use crate::types::{Money, Rate};
use crate::LedgerResult;

/// as_of is past the due date and the installment is still unsettled.
pub fn is_overdue(installment: &Installment, as_of: NaiveDate) -> bool {
    installment.is_overdue(as_of)
}

/// CLOSED exactly when every installment is PAID or CANCELLED.
pub fn loan_status(loan: &Loan) -> LoanStatus {
    loan.status()
}

impl Installment {
    fn ensure_open(&self) -> LedgerResult<()> {
        match self.status {
            InstallmentStatus::Paid => Err(LoanLedgerError::AlreadyPaid {
                loan_id: self.loan_id,
                sequence: self.sequence,
            }),
            InstallmentStatus::Cancelled => Err(LoanLedgerError::AlreadyCancelled {
                loan_id: self.loan_id,
                sequence: self.sequence,
            }),
            InstallmentStatus::Pending | InstallmentStatus::Overdue => Ok(()),
        }
    }

    /// Apply a payment. Under `PartialAllowed` amounts accumulate and the
    /// installment settles once they cover what is owed.
    pub fn record_payment(
        &mut self,
        amount: Money,
        date: NaiveDate,
        matching: PaymentMatching,
    ) -> LedgerResult<&Installment> {
        self.ensure_open()?;
        if amount <= Decimal::ZERO {
            return Err(LoanLedgerError::InvalidPayment(format!(
                "Payment amount must be positive, got {amount}"
            )));
        }

        let owed = self.outstanding();
        if matching == PaymentMatching::Exact && amount != owed {
            return Err(LoanLedgerError::AmountMismatch {
                expected: owed,
                received: amount,
            });
        }

        let paid = self
            .paid_so_far()
            .checked_add(amount)
            .ok_or_else(|| {
                LoanLedgerError::InvalidPayment(format!("Payment total overflows, got {amount}"))
            })?;
        self.paid_amount = Some(paid);
        self.paid_date = Some(date);
        self.payments.push(PaymentRecord { date, amount });
        if paid >= self.amount_owed() {
            self.status = InstallmentStatus::Paid;
        } else {
            self.status = InstallmentStatus::Pending;
        }
        Ok(self)
    }

    pub fn cancel(&mut self) -> LedgerResult<&Installment> {
        self.ensure_open()?;
        self.status = InstallmentStatus::Cancelled;
        Ok(self)
    }

    /// Surcharge an overdue installment: fee = total due × rate. Replaces any
    /// earlier fee.
    pub fn apply_late_fee(
        &mut self,
        rate: Rate,
        as_of: NaiveDate,
        config: &ScheduleConfig,
    ) -> LedgerResult<Money> {
        self.ensure_open()?;
        if rate < Decimal::ZERO {
            return Err(LoanLedgerError::InvalidPayment(format!(
                "Late rate cannot be negative, got {rate}"
            )));
        }
        if !self.is_overdue(as_of) {
            return Err(LoanLedgerError::NotOverdue {
                loan_id: self.loan_id,
                sequence: self.sequence,
            });
        }
        let fee = self
            .total_due
            .checked_mul(rate)
            .map(|x| config.round(x))
            .filter(|fee| self.total_due.checked_add(*fee).is_some())
            .ok_or_else(|| {
                LoanLedgerError::InvalidPayment(format!("Late fee overflows at rate {rate}"))
            })?;
        self.late_fee = fee;
        Ok(fee)
    }
}

impl Loan {
    pub fn record_payment(
        &mut self,
        sequence: u32,
        amount: Money,
        date: NaiveDate,
        matching: PaymentMatching,
    ) -> LedgerResult<Installment> {
        let inst = self.installment_mut(sequence)?;
        inst.record_payment(amount, date, matching).cloned()
    }

    pub fn cancel_installment(&mut self, sequence: u32) -> LedgerResult<Installment> {
        self.installment_mut(sequence)?.cancel().cloned()
    }

    /// `rate` defaults to the late rate snapshotted in the terms. The fee is
    /// rounded with the loan's own schedule conventions.
    pub fn apply_late_fee(
        &mut self,
        sequence: u32,
        rate: Option<Rate>,
        as_of: NaiveDate,
    ) -> LedgerResult<Installment> {
        let rate = rate.unwrap_or(self.terms.late_rate);
        let config = self.schedule.clone();
        let inst = self.installment_mut(sequence)?;
        inst.apply_late_fee(rate, as_of, &config)?;
        Ok(inst.clone())
    }

    /// Replace the terms and regenerate the whole schedule under the loan's
    /// snapshotted conventions. Refused once any installment has received
    /// money or been cancelled.
    pub fn reschedule(&mut self, terms: LoanTerms) -> LedgerResult<()> {
        if self.has_activity() {
            return Err(LoanLedgerError::ScheduleLocked(self.id));
        }
        let installments =
            crate::amortization::generate_schedule(self.id, &terms, &self.schedule)?;
        self.terms = terms;
        self.installments = installments;
        Ok(())
    }
}
