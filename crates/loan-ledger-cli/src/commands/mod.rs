pub mod loans;
pub mod payments;
pub mod reports;
pub mod schedule;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use loan_ledger_core::config::RateCard;
use loan_ledger_core::ledger::LedgerService;
use loan_ledger_core::loan::terms::DEFAULT_PERIOD_DAYS;
use loan_ledger_core::session::Session;
use loan_ledger_core::{InterestMode, LoanTerms};

use crate::input;
use crate::store::JsonFileStore;

pub type CommandResult = Result<Value, Box<dyn std::error::Error>>;

/// What every ledger command runs against.
pub struct Context {
    pub service: LedgerService<JsonFileStore>,
    pub session: Session,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Simple,
    Compound,
}

impl From<ModeArg> for InterestMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Simple => InterestMode::Simple,
            ModeArg::Compound => InterestMode::Compound,
        }
    }
}

/// Loan terms, from a JSON document or individual flags
#[derive(Args, Debug, Clone)]
pub struct TermsArgs {
    /// Path to a JSON terms document (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount lent
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate as a decimal (0.12 = 12%); defaults to the rate card
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Number of installments
    #[arg(long)]
    pub installments: Option<u32>,

    /// Interest mode
    #[arg(long, value_enum, default_value = "simple")]
    pub mode: ModeArg,

    /// Start date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Days between installments
    #[arg(long, default_value_t = DEFAULT_PERIOD_DAYS)]
    pub period_days: u32,

    /// Late-payment rate; defaults to the rate card
    #[arg(long)]
    pub late_rate: Option<Decimal>,
}

impl TermsArgs {
    /// Terms from `--input`, piped stdin, or the flags, in that order.
    pub fn resolve(
        &self,
        card: &RateCard,
        today: NaiveDate,
    ) -> Result<LoanTerms, Box<dyn std::error::Error>> {
        if let Some(terms) = input::document::<LoanTerms>(self.input.as_deref())? {
            return Ok(terms);
        }
        self.flag_terms(card, today)
    }

    pub fn flag_terms(
        &self,
        card: &RateCard,
        today: NaiveDate,
    ) -> Result<LoanTerms, Box<dyn std::error::Error>> {
        let principal = self
            .principal
            .ok_or("--principal is required (or provide --input)")?;
        let installments = self
            .installments
            .ok_or("--installments is required (or provide --input)")?;
        let start = self.start_date.unwrap_or(today);

        let mut terms =
            LoanTerms::from_rate_card(principal, installments, self.mode.into(), start, card)
                .with_period_days(self.period_days);
        if let Some(rate) = self.rate {
            terms.annual_rate = rate;
        }
        if let Some(late) = self.late_rate {
            terms.late_rate = late;
        }
        Ok(terms)
    }
}
