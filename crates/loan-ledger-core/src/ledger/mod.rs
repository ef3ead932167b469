pub mod clock;
pub mod service;
pub mod state;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use service::LedgerService;
pub use state::{is_overdue, loan_status};
pub use store::{InMemoryLedgerStore, LedgerStore};
