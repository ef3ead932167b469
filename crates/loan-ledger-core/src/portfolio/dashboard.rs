use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loan::{Installment, Loan, LoanStatus};
use crate::types::Money;

/// Headline indicators across a set of loans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub as_of: NaiveDate,
    pub loan_count: usize,
    /// Loans with at least one unsettled installment
    pub active_loans: usize,
    pub closed_loans: usize,
    pub total_lent: Money,
    pub overdue_installments: usize,
    pub overdue_amount: Money,
    /// Still owed on unsettled installments
    pub receivable: Money,
    pub total_received: Money,
    /// Interest portion of unsettled installments
    pub future_interest: Money,
}

pub fn summarize(loans: &[Loan], as_of: NaiveDate) -> PortfolioSummary {
    let mut summary = PortfolioSummary {
        as_of,
        loan_count: loans.len(),
        active_loans: 0,
        closed_loans: 0,
        total_lent: Decimal::ZERO,
        overdue_installments: 0,
        overdue_amount: Decimal::ZERO,
        receivable: Decimal::ZERO,
        total_received: Decimal::ZERO,
        future_interest: Decimal::ZERO,
    };

    for loan in loans {
        match loan.status() {
            LoanStatus::Active => summary.active_loans += 1,
            LoanStatus::Closed => summary.closed_loans += 1,
        }
        summary.total_lent += loan.terms.principal;
        summary.total_received += loan.total_received();

        for inst in loan.installments.iter().filter(|i| !i.is_settled()) {
            summary.receivable += inst.outstanding();
            summary.future_interest += inst.interest_portion;
            if inst.is_overdue(as_of) {
                summary.overdue_installments += 1;
                summary.overdue_amount += inst.outstanding();
            }
        }
    }

    summary
}

/// Cash movement for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    /// Payments received during the month
    pub paid: Money,
    /// Still owed on unsettled installments due in the month
    pub pending: Money,
    pub installments_due: usize,
}

pub fn monthly_summary(loans: &[Loan], year: i32, month: u32) -> MonthlySummary {
    let in_month = |d: NaiveDate| d.year() == year && d.month() == month;
    let all = || loans.iter().flat_map(|l| l.installments.iter());

    let paid: Money = all()
        .flat_map(|i| i.payments.iter())
        .filter(|p| in_month(p.date))
        .map(|p| p.amount)
        .sum();
    let due: Vec<&Installment> = all().filter(|i| in_month(i.due_date)).collect();
    let pending: Money = due.iter().map(|i| i.outstanding()).sum();

    MonthlySummary {
        year,
        month,
        paid,
        pending,
        installments_due: due.len(),
    }
}
