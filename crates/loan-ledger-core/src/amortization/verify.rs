//! Integrity check of stored installments against a fresh recomputation.
//!
//! After a datastore restore, regenerating each loan's schedule from its
//! stored terms and snapshotted conventions must reproduce the stored
//! principal/interest splits exactly.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::generate_schedule;
use crate::loan::{Installment, Loan, LoanId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentMismatch {
    /// 0 for loan-level problems
    pub sequence: u32,
    pub field: String,
    pub stored: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleVerification {
    pub loan_id: LoanId,
    pub consistent: bool,
    pub stored_count: usize,
    pub expected_count: usize,
    pub mismatches: Vec<InstallmentMismatch>,
}

pub fn verify_loan(loan: &Loan) -> ScheduleVerification {
    let stored_count = loan.installments.len();
    let mut mismatches = Vec::new();

    let expected = match generate_schedule(loan.id, &loan.terms, &loan.schedule) {
        Ok(expected) => expected,
        Err(e) => {
            mismatches.push(InstallmentMismatch {
                sequence: 0,
                field: "terms".into(),
                stored: serde_json::to_string(&loan.terms).unwrap_or_default(),
                expected: e.to_string(),
            });
            Vec::new()
        }
    };

    if !expected.is_empty() && expected.len() != stored_count {
        mismatches.push(InstallmentMismatch {
            sequence: 0,
            field: "installment_count".into(),
            stored: stored_count.to_string(),
            expected: expected.len().to_string(),
        });
    }

    for exp in &expected {
        match loan.installments.iter().find(|i| i.sequence == exp.sequence) {
            Some(stored) => compare(stored, exp, &mut mismatches),
            None => mismatches.push(InstallmentMismatch {
                sequence: exp.sequence,
                field: "sequence".into(),
                stored: "missing".into(),
                expected: exp.sequence.to_string(),
            }),
        }
    }

    let consistent = mismatches.is_empty();
    if !consistent {
        warn!(
            loan_id = %loan.id,
            mismatches = mismatches.len(),
            "Stored schedule diverges from recomputation"
        );
    }

    ScheduleVerification {
        loan_id: loan.id,
        consistent,
        stored_count,
        expected_count: expected.len(),
        mismatches,
    }
}

pub fn verify_all<'a>(loans: impl IntoIterator<Item = &'a Loan>) -> Vec<ScheduleVerification> {
    loans.into_iter().map(verify_loan).collect()
}

fn compare(stored: &Installment, expected: &Installment, out: &mut Vec<InstallmentMismatch>) {
    let mut check = |field: &str, s: String, e: String| {
        if s != e {
            out.push(InstallmentMismatch {
                sequence: expected.sequence,
                field: field.into(),
                stored: s,
                expected: e,
            });
        }
    };
    check(
        "due_date",
        stored.due_date.to_string(),
        expected.due_date.to_string(),
    );
    check(
        "principal_portion",
        stored.principal_portion.to_string(),
        expected.principal_portion.to_string(),
    );
    check(
        "interest_portion",
        stored.interest_portion.to_string(),
        expected.interest_portion.to_string(),
    );
    check(
        "total_due",
        stored.total_due.to_string(),
        expected.total_due.to_string(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DayCount, ScheduleConfig};
    use crate::loan::{BorrowerId, InterestMode, LoanTerms};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn loan() -> Loan {
        let terms = LoanTerms::new(
            dec!(2500.00),
            dec!(0.09),
            10,
            InterestMode::Compound,
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        );
        Loan::new(LoanId(3), BorrowerId(1), terms, &ScheduleConfig::default()).unwrap()
    }

    #[test]
    fn test_fresh_loan_is_consistent() {
        let v = verify_loan(&loan());
        assert!(v.consistent);
        assert_eq!(v.stored_count, 10);
        assert_eq!(v.expected_count, 10);
    }

    #[test]
    fn test_tampered_split_is_reported() {
        let mut l = loan();
        l.installments[4].interest_portion += dec!(0.01);
        let v = verify_loan(&l);
        assert!(!v.consistent);
        assert_eq!(v.mismatches.len(), 1);
        assert_eq!(v.mismatches[0].sequence, 5);
        assert_eq!(v.mismatches[0].field, "interest_portion");
    }

    #[test]
    fn test_missing_installment_is_reported() {
        let mut l = loan();
        l.installments.pop();
        let v = verify_loan(&l);
        assert!(!v.consistent);
        assert!(v.mismatches.iter().any(|m| m.field == "installment_count"));
        assert!(v.mismatches.iter().any(|m| m.sequence == 10 && m.field == "sequence"));
    }

    #[test]
    fn test_payment_state_does_not_affect_verification() {
        let mut l = loan();
        let owed = l.installments[0].total_due;
        let date = l.installments[0].due_date;
        l.record_payment(1, owed, date, crate::config::PaymentMatching::Exact)
            .unwrap();
        assert!(verify_loan(&l).consistent);
    }

    #[test]
    fn test_checked_against_snapshotted_conventions() {
        let cfg = ScheduleConfig {
            day_count: DayCount::Thirty360,
            ..Default::default()
        };
        let mut l = Loan::new(LoanId(4), BorrowerId(2), loan().terms, &cfg).unwrap();
        assert!(verify_loan(&l).consistent);

        // the same stored splits under the default conventions diverge
        l.schedule = ScheduleConfig::default();
        assert!(!verify_loan(&l).consistent);
    }

    #[test]
    fn test_invalid_stored_terms_reported() {
        let mut l = loan();
        l.terms.number_of_installments = 0;
        let v = verify_loan(&l);
        assert!(!v.consistent);
        assert_eq!(v.mismatches[0].field, "terms");
    }
}
