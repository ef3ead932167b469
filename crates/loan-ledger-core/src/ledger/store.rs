use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::LoanLedgerError;
use crate::loan::{Loan, LoanId};
use crate::LedgerResult;

/// Persistence seam for loans.
///
/// `save` and `remove` are compare-and-swap on [`Loan::version`]: they only
/// succeed when the stored version equals the caller's, and `save` bumps the
/// stored version by one. A mismatch is reported as
/// [`LoanLedgerError::ConcurrentModification`] and nothing is written.
pub trait LedgerStore: Send + Sync {
    /// Store a new loan at version 1.
    fn insert(&self, loan: Loan) -> LedgerResult<Loan>;

    fn load(&self, id: LoanId) -> LedgerResult<Loan>;

    /// Returns the stored copy with its new version.
    fn save(&self, loan: &Loan) -> LedgerResult<Loan>;

    fn remove(&self, id: LoanId, expected_version: u64) -> LedgerResult<()>;

    /// All loans ordered by id.
    fn list(&self) -> LedgerResult<Vec<Loan>>;

    /// Reserve an id above every id handed out or inserted so far. An id is
    /// never returned twice, even after its loan is removed.
    fn allocate_id(&self) -> LedgerResult<LoanId>;
}

/// Process-local store; each loan is guarded by its map shard during a save.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    loans: DashMap<LoanId, Loan>,
    last_id: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with loans exactly as given (versions untouched).
    pub fn from_loans(loans: impl IntoIterator<Item = Loan>) -> Self {
        let store = Self::new();
        for loan in loans {
            store.last_id.fetch_max(loan.id.0, Ordering::SeqCst);
            store.loans.insert(loan.id, loan);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert(&self, mut loan: Loan) -> LedgerResult<Loan> {
        match self.loans.entry(loan.id) {
            Entry::Occupied(_) => Err(LoanLedgerError::LoanExists(loan.id)),
            Entry::Vacant(slot) => {
                loan.version = 1;
                self.last_id.fetch_max(loan.id.0, Ordering::SeqCst);
                slot.insert(loan.clone());
                Ok(loan)
            }
        }
    }

    fn load(&self, id: LoanId) -> LedgerResult<Loan> {
        self.loans
            .get(&id)
            .map(|l| l.value().clone())
            .ok_or(LoanLedgerError::LoanNotFound(id))
    }

    fn save(&self, loan: &Loan) -> LedgerResult<Loan> {
        let mut current = self
            .loans
            .get_mut(&loan.id)
            .ok_or(LoanLedgerError::LoanNotFound(loan.id))?;
        if current.version != loan.version {
            return Err(LoanLedgerError::ConcurrentModification {
                loan_id: loan.id,
                expected: loan.version,
                found: current.version,
            });
        }
        let mut stored = loan.clone();
        stored.version += 1;
        *current = stored.clone();
        Ok(stored)
    }

    fn remove(&self, id: LoanId, expected_version: u64) -> LedgerResult<()> {
        if self
            .loans
            .remove_if(&id, |_, l| l.version == expected_version)
            .is_some()
        {
            return Ok(());
        }
        match self.loans.get(&id) {
            Some(l) => Err(LoanLedgerError::ConcurrentModification {
                loan_id: id,
                expected: expected_version,
                found: l.version,
            }),
            None => Err(LoanLedgerError::LoanNotFound(id)),
        }
    }

    fn list(&self) -> LedgerResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self.loans.iter().map(|e| e.value().clone()).collect();
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    fn allocate_id(&self) -> LedgerResult<LoanId> {
        Ok(LoanId(self.last_id.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use crate::loan::{BorrowerId, InterestMode, LoanTerms};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn loan(id: u64) -> Loan {
        let terms = LoanTerms::new(
            dec!(600.00),
            dec!(0.10),
            6,
            InterestMode::Simple,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        );
        Loan::new(LoanId(id), BorrowerId(1), terms, &ScheduleConfig::default()).unwrap()
    }

    #[test]
    fn test_insert_sets_version_one() {
        let store = InMemoryLedgerStore::new();
        let stored = store.insert(loan(1)).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(store.load(LoanId(1)).unwrap().version, 1);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = InMemoryLedgerStore::new();
        store.insert(loan(1)).unwrap();
        assert_eq!(
            store.insert(loan(1)).unwrap_err(),
            LoanLedgerError::LoanExists(LoanId(1))
        );
    }

    #[test]
    fn test_stale_save_rejected() {
        let store = InMemoryLedgerStore::new();
        store.insert(loan(1)).unwrap();
        let a = store.load(LoanId(1)).unwrap();
        let b = store.load(LoanId(1)).unwrap();

        assert_eq!(store.save(&a).unwrap().version, 2);
        let err = store.save(&b).unwrap_err();
        assert_eq!(
            err,
            LoanLedgerError::ConcurrentModification {
                loan_id: LoanId(1),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_remove_checks_version() {
        let store = InMemoryLedgerStore::new();
        store.insert(loan(1)).unwrap();
        assert!(store.remove(LoanId(1), 7).unwrap_err().is_conflict());
        store.remove(LoanId(1), 1).unwrap();
        assert!(store.is_empty());
        assert_eq!(
            store.remove(LoanId(1), 1).unwrap_err(),
            LoanLedgerError::LoanNotFound(LoanId(1))
        );
    }

    #[test]
    fn test_list_ordered_and_allocation_above_inserted() {
        let store = InMemoryLedgerStore::new();
        store.insert(loan(5)).unwrap();
        store.insert(loan(2)).unwrap();
        let ids: Vec<u64> = store.list().unwrap().iter().map(|l| l.id.0).collect();
        assert_eq!(ids, vec![2, 5]);
        assert_eq!(store.allocate_id().unwrap(), LoanId(6));
        assert_eq!(store.allocate_id().unwrap(), LoanId(7));
    }

    #[test]
    fn test_removed_id_not_reallocated() {
        let store = InMemoryLedgerStore::from_loans([loan(3)]);
        store.remove(LoanId(3), 0).unwrap();
        assert_eq!(store.allocate_id().unwrap(), LoanId(4));
    }
}
