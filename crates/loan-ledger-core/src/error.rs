use rust_decimal::Decimal;
use thiserror::Error;

use crate::loan::LoanId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanLedgerError {
    #[error("Invalid terms: {field}: {reason}")]
    InvalidTerms { field: String, reason: String },

    #[error("Installment {sequence} of loan {loan_id} is already paid")]
    AlreadyPaid { loan_id: LoanId, sequence: u32 },

    #[error("Installment {sequence} of loan {loan_id} is cancelled")]
    AlreadyCancelled { loan_id: LoanId, sequence: u32 },

    #[error("Payment amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: Decimal, received: Decimal },

    #[error("Invalid payment: {0}")]
    InvalidPayment(String),

    #[error("Concurrent modification of loan {loan_id}: expected version {expected}, found {found}")]
    ConcurrentModification {
        loan_id: LoanId,
        expected: u64,
        found: u64,
    },

    #[error("Loan {0} not found")]
    LoanNotFound(LoanId),

    #[error("Loan {0} already exists")]
    LoanExists(LoanId),

    #[error("Installment {sequence} not found on loan {loan_id}")]
    InstallmentNotFound { loan_id: LoanId, sequence: u32 },

    #[error("Schedule of loan {0} is locked: payments or cancellations already recorded")]
    ScheduleLocked(LoanId),

    #[error("Installment {sequence} of loan {loan_id} is not overdue")]
    NotOverdue { loan_id: LoanId, sequence: u32 },

    #[error("Permission denied: {user} may not {action}")]
    PermissionDenied { user: String, action: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LoanLedgerError {
    /// True for the two "installment already settled" errors.
    pub fn is_already_settled(&self) -> bool {
        matches!(
            self,
            LoanLedgerError::AlreadyPaid { .. } | LoanLedgerError::AlreadyCancelled { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LoanLedgerError::ConcurrentModification { .. })
    }

    pub(crate) fn invalid_terms(field: &str, reason: &str) -> Self {
        LoanLedgerError::InvalidTerms {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LoanLedgerError {
    fn from(e: serde_json::Error) -> Self {
        LoanLedgerError::Serialization(e.to_string())
    }
}
