mod commands;
mod input;
mod logging;
mod output;
mod settings;
mod store;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use loan_ledger_core::ledger::LedgerService;
use loan_ledger_core::session::{Role, Session};

use commands::loans::{DeleteArgs, OpenArgs, RescheduleArgs, StatusArgs};
use commands::payments::{CancelArgs, LateFeeArgs, PayArgs};
use commands::reports::{AsOfArgs, SummaryArgs, UpcomingArgs};
use commands::schedule::ScheduleArgs;
use commands::Context;
use settings::Settings;
use store::JsonFileStore;

/// Loan schedules and installment payment tracking
#[derive(Parser)]
#[command(
    name = "loans",
    version,
    about = "Loan schedules and installment payment tracking",
    long_about = "Generate simple or compound amortization schedules with exact decimal \
                  arithmetic, and track installment payments, cancellations and late fees \
                  in a JSON ledger file."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Configuration file layered over loans.toml
    #[arg(long, global = true)]
    config: Option<String>,

    /// User recorded against ledger changes
    #[arg(long, default_value = "admin", global = true)]
    user: String,

    /// Role of the user
    #[arg(long, value_enum, default_value = "admin", global = true)]
    role: RoleArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview an amortization schedule
    Schedule(ScheduleArgs),
    /// Open a loan and store its schedule
    Open(OpenArgs),
    /// Record a payment against an installment
    Pay(PayArgs),
    /// Cancel an installment
    Cancel(CancelArgs),
    /// Apply a late fee to an overdue installment
    LateFee(LateFeeArgs),
    /// Regenerate the schedule of a loan with no payments
    Reschedule(RescheduleArgs),
    /// Delete a loan and its installments
    Delete(DeleteArgs),
    /// Show one loan, or list all loans
    Status(StatusArgs),
    /// List overdue installments
    Overdue(AsOfArgs),
    /// List the next installments falling due
    Upcoming(UpcomingArgs),
    /// Portfolio indicators and a monthly cash summary
    Summary(SummaryArgs),
    /// Recompute every stored schedule and report differences
    Verify,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Manager,
    Operator,
}

impl From<RoleArg> for Role {
    fn from(r: RoleArg) -> Self {
        match r {
            RoleArg::Admin => Role::Admin,
            RoleArg::Manager => Role::Manager,
            RoleArg::Operator => Role::Operator,
        }
    }
}

fn context(
    config: Option<&str>,
    user: &str,
    role: RoleArg,
) -> Result<Context, Box<dyn std::error::Error>> {
    let settings = Settings::load(config)?;
    let service = LedgerService::new(
        JsonFileStore::new(settings.store.path.clone()),
        settings.engine(),
    );
    tracing::debug!(store = %service.store().path().display(), "Settings loaded");
    Ok(Context {
        service,
        session: Session::new(user, role.into()),
    })
}

fn main() {
    logging::init();
    let Cli {
        command,
        output: format,
        config,
        user,
        role,
    } = Cli::parse();
    let ctx = || context(config.as_deref(), &user, role);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match command {
        Commands::Schedule(args) => ctx().and_then(|c| commands::schedule::run_schedule(args, &c)),
        Commands::Open(args) => ctx().and_then(|c| commands::loans::run_open(args, &c)),
        Commands::Pay(args) => ctx().and_then(|c| commands::payments::run_pay(args, &c)),
        Commands::Cancel(args) => ctx().and_then(|c| commands::payments::run_cancel(args, &c)),
        Commands::LateFee(args) => ctx().and_then(|c| commands::payments::run_late_fee(args, &c)),
        Commands::Reschedule(args) => {
            ctx().and_then(|c| commands::loans::run_reschedule(args, &c))
        }
        Commands::Delete(args) => ctx().and_then(|c| commands::loans::run_delete(args, &c)),
        Commands::Status(args) => ctx().and_then(|c| commands::loans::run_status(args, &c)),
        Commands::Overdue(args) => ctx().and_then(|c| commands::reports::run_overdue(args, &c)),
        Commands::Upcoming(args) => ctx().and_then(|c| commands::reports::run_upcoming(args, &c)),
        Commands::Summary(args) => ctx().and_then(|c| commands::reports::run_summary(args, &c)),
        Commands::Verify => ctx().and_then(|c| commands::reports::run_verify(&c)),
        Commands::Version => {
            println!("loans {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&format, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "loans", "status", "--borrower", "7", "--role", "operator", "--output", "table",
        ])
        .unwrap();
        assert!(matches!(cli.role, RoleArg::Operator));
        assert!(matches!(cli.output, OutputFormat::Table));
        match cli.command {
            Commands::Status(args) => assert_eq!(args.borrower, Some(7)),
            _ => panic!("expected status"),
        }
    }

    #[test]
    fn test_open_requires_borrower() {
        let missing = Cli::try_parse_from(["loans", "open", "--principal", "100", "--installments", "2"]);
        assert!(missing.is_err());
        assert!(Cli::try_parse_from([
            "loans", "open", "--borrower", "3", "--principal", "100", "--installments", "2",
        ])
        .is_ok());
    }
}
