use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::loan::{BorrowerId, Loan, LoanId};
use crate::types::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingInstallment {
    pub loan_id: LoanId,
    pub borrower_id: BorrowerId,
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount_owed: Money,
    pub days_until_due: i64,
}

/// Next unsettled installments due on or after `as_of`, soonest first.
pub fn upcoming_due(loans: &[Loan], as_of: NaiveDate, limit: usize) -> Vec<UpcomingInstallment> {
    let mut upcoming: Vec<UpcomingInstallment> = loans
        .iter()
        .flat_map(|l| l.installments.iter().map(move |i| (l.borrower_id, i)))
        .filter(|(_, i)| !i.is_settled() && i.due_date >= as_of)
        .map(|(borrower_id, i)| UpcomingInstallment {
            loan_id: i.loan_id,
            borrower_id,
            sequence: i.sequence,
            due_date: i.due_date,
            amount_owed: i.outstanding(),
            days_until_due: (i.due_date - as_of).num_days(),
        })
        .collect();
    upcoming.sort_by_key(|u| (u.due_date, u.loan_id, u.sequence));
    upcoming.truncate(limit);
    upcoming
}
