pub mod amortization;
pub mod config;
pub mod error;
pub mod ledger;
pub mod loan;
pub mod session;
pub mod types;

#[cfg(feature = "portfolio")]
pub mod portfolio;

pub use config::EngineConfig;
pub use error::LoanLedgerError;
pub use loan::{
    BorrowerId, Installment, InstallmentStatus, InterestMode, Loan, LoanId, LoanStatus, LoanTerms,
};
pub use types::*;

/// Standard result type for all loan-ledger operations
pub type LedgerResult<T> = Result<T, LoanLedgerError>;
