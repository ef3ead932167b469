pub mod installment;
pub mod record;
pub mod terms;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use installment::{Installment, InstallmentStatus, PaymentRecord};
pub use record::{Loan, LoanStatus};
pub use terms::{InterestMode, LoanTerms};

/// Identifier of a loan record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub u64);

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LoanId {
    fn from(id: u64) -> Self {
        LoanId(id)
    }
}

/// Identifier of the borrower a loan was made to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BorrowerId(pub u64);

impl fmt::Display for BorrowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
