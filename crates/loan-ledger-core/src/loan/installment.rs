use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LoanId;
use crate::types::Money;

/// Payment state of an installment.
///
/// `Overdue` is a projection computed from the due date; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

/// Money received against an installment on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub date: NaiveDate,
    pub amount: Money,
}

/// One scheduled payment of a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub loan_id: LoanId,
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub total_due: Money,
    pub status: InstallmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<Money>,
    #[serde(default)]
    pub late_fee: Money,
    /// Every payment received, oldest first; `paid_amount` is their sum
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payments: Vec<PaymentRecord>,
}

impl Installment {
    pub(crate) fn scheduled(
        loan_id: LoanId,
        sequence: u32,
        due_date: NaiveDate,
        principal_portion: Money,
        interest_portion: Money,
    ) -> Self {
        Self {
            loan_id,
            sequence,
            due_date,
            principal_portion,
            interest_portion,
            total_due: principal_portion + interest_portion,
            status: InstallmentStatus::Pending,
            paid_date: None,
            paid_amount: None,
            late_fee: Decimal::ZERO,
            payments: Vec::new(),
        }
    }

    /// PAID or CANCELLED
    pub fn is_settled(&self) -> bool {
        matches!(
            self.status,
            InstallmentStatus::Paid | InstallmentStatus::Cancelled
        )
    }

    /// Scheduled amount plus any late fee
    pub fn amount_owed(&self) -> Money {
        self.total_due + self.late_fee
    }

    pub fn paid_so_far(&self) -> Money {
        self.paid_amount.unwrap_or(Decimal::ZERO)
    }

    /// What is still owed; zero once settled.
    pub fn outstanding(&self) -> Money {
        if self.is_settled() {
            return Decimal::ZERO;
        }
        (self.amount_owed() - self.paid_so_far()).max(Decimal::ZERO)
    }

    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        !self.is_settled() && as_of > self.due_date
    }

    /// Status with the OVERDUE projection applied for `as_of`.
    pub fn effective_status(&self, as_of: NaiveDate) -> InstallmentStatus {
        if self.is_settled() {
            self.status
        } else if self.is_overdue(as_of) {
            InstallmentStatus::Overdue
        } else {
            InstallmentStatus::Pending
        }
    }

    /// Days elapsed past the due date (zero when not overdue).
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        if self.is_overdue(as_of) {
            (as_of - self.due_date).num_days()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn installment() -> Installment {
        Installment::scheduled(
            LoanId(1),
            1,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            dec!(100),
            dec!(12.50),
        )
    }

    #[test]
    fn test_total_due_is_sum_of_portions() {
        assert_eq!(installment().total_due, dec!(112.50));
    }

    #[test]
    fn test_overdue_projection() {
        let inst = installment();
        let due = inst.due_date;
        assert_eq!(inst.effective_status(due), InstallmentStatus::Pending);
        assert_eq!(
            inst.effective_status(due.succ_opt().unwrap()),
            InstallmentStatus::Overdue
        );
        assert_eq!(inst.status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_settled_is_never_overdue() {
        let mut inst = installment();
        inst.status = InstallmentStatus::Cancelled;
        let later = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert!(!inst.is_overdue(later));
        assert_eq!(inst.effective_status(later), InstallmentStatus::Cancelled);
        assert_eq!(inst.outstanding(), Decimal::ZERO);
    }

    #[test]
    fn test_days_overdue() {
        let inst = installment();
        let as_of = NaiveDate::from_ymd_opt(2024, 2, 11).unwrap();
        assert_eq!(inst.days_overdue(as_of), 10);
        assert_eq!(inst.days_overdue(inst.due_date), 0);
    }
}
