use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BorrowerId, Installment, LoanId, LoanTerms};
use crate::amortization;
use crate::config::ScheduleConfig;
use crate::error::LoanLedgerError;
use crate::types::Money;
use crate::LedgerResult;

/// Aggregate status, derived from the installments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Closed,
}

/// A loan and the installments it exclusively owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub terms: LoanTerms,
    /// Conventions the schedule was generated with, snapshotted at opening
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub installments: Vec<Installment>,
    /// Optimistic-lock counter, bumped by the store on every save
    #[serde(default)]
    pub version: u64,
}

impl Loan {
    /// Create a loan with its freshly generated schedule.
    pub fn new(
        id: LoanId,
        borrower_id: BorrowerId,
        terms: LoanTerms,
        config: &ScheduleConfig,
    ) -> LedgerResult<Self> {
        let installments = amortization::generate_schedule(id, &terms, config)?;
        Ok(Self {
            id,
            borrower_id,
            terms,
            schedule: config.clone(),
            installments,
            version: 0,
        })
    }

    pub fn status(&self) -> LoanStatus {
        if self.installments.iter().all(Installment::is_settled) {
            LoanStatus::Closed
        } else {
            LoanStatus::Active
        }
    }

    pub fn installment(&self, sequence: u32) -> LedgerResult<&Installment> {
        self.installments
            .iter()
            .find(|i| i.sequence == sequence)
            .ok_or(LoanLedgerError::InstallmentNotFound {
                loan_id: self.id,
                sequence,
            })
    }

    pub(crate) fn installment_mut(&mut self, sequence: u32) -> LedgerResult<&mut Installment> {
        let loan_id = self.id;
        self.installments
            .iter_mut()
            .find(|i| i.sequence == sequence)
            .ok_or(LoanLedgerError::InstallmentNotFound { loan_id, sequence })
    }

    pub fn overdue_installments(&self, as_of: NaiveDate) -> impl Iterator<Item = &Installment> {
        self.installments.iter().filter(move |i| i.is_overdue(as_of))
    }

    /// True once any money was received or any installment cancelled.
    pub fn has_activity(&self) -> bool {
        self.installments
            .iter()
            .any(|i| i.is_settled() || i.paid_amount.is_some())
    }

    pub fn outstanding(&self) -> Money {
        self.installments.iter().map(Installment::outstanding).sum()
    }

    pub fn total_received(&self) -> Money {
        self.installments
            .iter()
            .map(Installment::paid_so_far)
            .sum::<Decimal>()
    }
}
