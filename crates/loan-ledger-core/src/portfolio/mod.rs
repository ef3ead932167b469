//! Read-only aggregates over many loans, for dashboards and statements.

pub mod dashboard;
pub mod upcoming;

pub use dashboard::{monthly_summary, summarize, MonthlySummary, PortfolioSummary};
pub use upcoming::{upcoming_due, UpcomingInstallment};
