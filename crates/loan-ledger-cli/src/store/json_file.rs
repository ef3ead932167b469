use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use loan_ledger_core::ledger::LedgerStore;
use loan_ledger_core::{LedgerResult, Loan, LoanId, LoanLedgerError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    /// Highest id ever allocated or inserted
    #[serde(default)]
    last_id: u64,
    loans: Vec<Loan>,
}

impl LedgerFile {
    fn high_water(&self) -> u64 {
        let stored = self.loans.iter().map(|l| l.id.0).max().unwrap_or(0);
        self.last_id.max(stored)
    }
}

/// Ledger persisted as one JSON document.
///
/// Every read-check-write runs under an exclusive OS lock on a sibling
/// `<file>.lock`, so the version check in `save` and `remove` holds across
/// processes. Writes go to a fresh temp file in the same directory that is
/// then renamed over the ledger, and plain reads never see a partial file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Blocks until no other handle holds the ledger lock. Released when the
    /// returned file is dropped.
    fn lock(&self) -> LedgerResult<File> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| storage_error(&lock_path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| storage_error(&lock_path, e))?;
        Ok(file)
    }

    fn read(&self) -> LedgerResult<LedgerFile> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(LedgerFile::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LedgerFile::default()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }

    fn write(&self, mut file: LedgerFile) -> LedgerResult<()> {
        file.loans.sort_by_key(|l| l.id);
        let dir = self.dir();
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| storage_error(dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, &file)?;
        tmp.flush().map_err(|e| storage_error(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| storage_error(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| storage_error(&self.path, e.error))?;
        debug!(path = %self.path.display(), loans = file.loans.len(), "Ledger written");
        Ok(())
    }

    /// Read-modify-write under the ledger lock. Nothing is written when `op`
    /// fails.
    fn update<T>(&self, op: impl FnOnce(&mut LedgerFile) -> LedgerResult<T>) -> LedgerResult<T> {
        let _lock = self.lock()?;
        let mut file = self.read()?;
        let out = op(&mut file)?;
        self.write(file)?;
        Ok(out)
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> LoanLedgerError {
    LoanLedgerError::Storage(format!("{}: {}", path.display(), e))
}

fn conflict(loan_id: LoanId, expected: u64, found: u64) -> LoanLedgerError {
    LoanLedgerError::ConcurrentModification {
        loan_id,
        expected,
        found,
    }
}

impl LedgerStore for JsonFileStore {
    fn insert(&self, mut loan: Loan) -> LedgerResult<Loan> {
        self.update(|file| {
            if file.loans.iter().any(|l| l.id == loan.id) {
                return Err(LoanLedgerError::LoanExists(loan.id));
            }
            loan.version = 1;
            file.last_id = file.high_water().max(loan.id.0);
            file.loans.push(loan.clone());
            Ok(loan)
        })
    }

    fn load(&self, id: LoanId) -> LedgerResult<Loan> {
        self.read()?
            .loans
            .into_iter()
            .find(|l| l.id == id)
            .ok_or(LoanLedgerError::LoanNotFound(id))
    }

    fn save(&self, loan: &Loan) -> LedgerResult<Loan> {
        self.update(|file| {
            let current = file
                .loans
                .iter_mut()
                .find(|l| l.id == loan.id)
                .ok_or(LoanLedgerError::LoanNotFound(loan.id))?;
            if current.version != loan.version {
                return Err(conflict(loan.id, loan.version, current.version));
            }
            let mut stored = loan.clone();
            stored.version += 1;
            *current = stored.clone();
            Ok(stored)
        })
    }

    fn remove(&self, id: LoanId, expected_version: u64) -> LedgerResult<()> {
        self.update(|file| {
            let idx = file
                .loans
                .iter()
                .position(|l| l.id == id)
                .ok_or(LoanLedgerError::LoanNotFound(id))?;
            let found = file.loans[idx].version;
            if found != expected_version {
                return Err(conflict(id, expected_version, found));
            }
            file.last_id = file.high_water();
            file.loans.remove(idx);
            Ok(())
        })
    }

    fn list(&self) -> LedgerResult<Vec<Loan>> {
        let mut loans = self.read()?.loans;
        loans.sort_by_key(|l| l.id);
        Ok(loans)
    }

    fn allocate_id(&self) -> LedgerResult<LoanId> {
        self.update(|file| {
            file.last_id = file.high_water() + 1;
            Ok(LoanId(file.last_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use loan_ledger_core::config::{EngineConfig, ScheduleConfig};
    use loan_ledger_core::ledger::LedgerService;
    use loan_ledger_core::session::{Role, Session};
    use loan_ledger_core::{BorrowerId, InterestMode, LoanTerms};
    use rust_decimal_macros::dec;
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("loans.json"));
        (dir, store)
    }

    fn terms() -> LoanTerms {
        LoanTerms::new(
            dec!(600.00),
            dec!(0.10),
            6,
            InterestMode::Compound,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    fn loan(id: u64) -> Loan {
        Loan::new(LoanId(id), BorrowerId(1), terms(), &ScheduleConfig::default()).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_ledger() {
        let (_dir, store) = temp_store();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.allocate_id().unwrap(), LoanId(1));
    }

    #[test]
    fn test_insert_then_reload_from_disk() {
        let (_dir, store) = temp_store();
        store.insert(loan(2)).unwrap();
        store.insert(loan(1)).unwrap();

        let reopened = JsonFileStore::new(store.path().to_path_buf());
        let ids: Vec<LoanId> = reopened.list().unwrap().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![LoanId(1), LoanId(2)]);
        assert_eq!(reopened.load(LoanId(2)).unwrap(), store.load(LoanId(2)).unwrap());
        assert_eq!(reopened.allocate_id().unwrap(), LoanId(3));
    }

    #[test]
    fn test_stale_save_is_rejected() {
        let (_dir, store) = temp_store();
        let stored = store.insert(loan(1)).unwrap();

        // another process saves first
        let other = JsonFileStore::new(store.path().to_path_buf());
        other.save(&stored).unwrap();

        let err = store.save(&stored).unwrap_err();
        assert_eq!(err, conflict(LoanId(1), 1, 2));
        assert_eq!(store.load(LoanId(1)).unwrap().version, 2);
    }

    #[test]
    fn test_duplicate_insert_and_remove() {
        let (_dir, store) = temp_store();
        store.insert(loan(1)).unwrap();
        assert_eq!(
            store.insert(loan(1)).unwrap_err(),
            LoanLedgerError::LoanExists(LoanId(1))
        );
        assert!(store.remove(LoanId(1), 7).unwrap_err().is_conflict());
        store.remove(LoanId(1), 1).unwrap();
        assert_eq!(
            store.load(LoanId(1)).unwrap_err(),
            LoanLedgerError::LoanNotFound(LoanId(1))
        );
    }

    #[test]
    fn test_removed_id_not_reallocated_after_reopen() {
        let (_dir, store) = temp_store();
        let id = store.allocate_id().unwrap();
        store.insert(loan(id.0)).unwrap();
        store.remove(id, 1).unwrap();

        let reopened = JsonFileStore::new(store.path().to_path_buf());
        assert_eq!(reopened.allocate_id().unwrap(), LoanId(2));
    }

    #[test]
    fn test_only_ledger_and_lock_left_on_disk() {
        let (dir, store) = temp_store();
        store.insert(loan(1)).unwrap();
        store.save(&store.load(LoanId(1)).unwrap()).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["loans.json", "loans.json.lock"]);
    }

    #[test]
    fn test_separate_handles_allocate_distinct_ids() {
        let (_dir, store) = temp_store();
        let path = store.path().to_path_buf();
        let barrier = Barrier::new(4);

        let mut ids: Vec<LoanId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let (path, barrier) = (path.clone(), &barrier);
                    s.spawn(move || {
                        let own = JsonFileStore::new(path);
                        barrier.wait();
                        (0..5).map(|_| own.allocate_id().unwrap()).collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        ids.sort();
        assert_eq!(ids, (1..=20).map(LoanId).collect::<Vec<_>>());
    }

    #[test]
    fn test_payments_through_separate_handles_settle_once() {
        let admin = Session::new("admin", Role::Admin);
        for _ in 0..50 {
            let (_dir, store) = temp_store();
            let path = store.path().to_path_buf();
            let opened = LedgerService::new(store, EngineConfig::default())
                .open_loan(&admin, None, BorrowerId(1), terms())
                .unwrap();
            let (loan_id, owed) = (opened.id, opened.installments[0].total_due);
            let barrier = Barrier::new(2);

            let results: Vec<LedgerResult<_>> = std::thread::scope(|s| {
                let handles: Vec<_> = (0..2)
                    .map(|_| {
                        let (path, barrier, admin) = (path.clone(), &barrier, &admin);
                        s.spawn(move || {
                            let svc = LedgerService::new(
                                JsonFileStore::new(path),
                                EngineConfig::default(),
                            );
                            barrier.wait();
                            svc.record_payment(admin, loan_id, 1, owed, None)
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            let err = results.into_iter().find_map(Result::err).unwrap();
            assert!(err.is_already_settled() || err.is_conflict(), "unexpected {err:?}");

            let stored = JsonFileStore::new(path).load(loan_id).unwrap();
            assert_eq!(stored.version, 2);
            assert_eq!(stored.installments[0].payments.len(), 1);
        }
    }
}
