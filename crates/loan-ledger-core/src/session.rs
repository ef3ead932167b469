//! Caller context for ledger mutations.
//!
//! The schedule engine never sees a session. Capability checks happen in the
//! collaborators that mutate the ledger, against the session they were handed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LoanLedgerError;
use crate::LedgerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Operator,
}

/// Ledger actions that require permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    OpenLoan,
    RecordPayment,
    CancelInstallment,
    ApplyLateFee,
    Reschedule,
    DeleteLoan,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::OpenLoan => "open loans",
            Capability::RecordPayment => "record payments",
            Capability::CancelInstallment => "cancel installments",
            Capability::ApplyLateFee => "apply late fees",
            Capability::Reschedule => "reschedule loans",
            Capability::DeleteLoan => "delete loans",
        };
        f.write_str(s)
    }
}

impl Role {
    pub fn grants(&self, capability: Capability) -> bool {
        match self {
            Role::Admin => true,
            Role::Operator => matches!(
                capability,
                Capability::OpenLoan | Capability::RecordPayment
            ),
            Role::Manager => matches!(
                capability,
                Capability::OpenLoan | Capability::ApplyLateFee | Capability::Reschedule
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: String,
    pub role: Role,
}

impl Session {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
        }
    }

    pub fn require(&self, capability: Capability) -> LedgerResult<()> {
        if self.role.grants(capability) {
            Ok(())
        } else {
            Err(LoanLedgerError::PermissionDenied {
                user: self.user.clone(),
                action: capability.to_string(),
            })
        }
    }
}
