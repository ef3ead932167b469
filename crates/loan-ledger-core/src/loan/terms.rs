use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::RateCard;
use crate::error::LoanLedgerError;
use crate::types::{Money, Rate};
use crate::LedgerResult;

pub const DEFAULT_PERIOD_DAYS: u32 = 30;

/// How interest accrues over the life of the loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestMode {
    /// Interest computed once on the original principal over the full term
    Simple,
    /// Interest on the outstanding balance each period, level payments
    Compound,
}

/// Immutable terms of a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    pub annual_rate: Rate,
    pub number_of_installments: u32,
    pub interest_mode: InterestMode,
    pub start_date: NaiveDate,
    #[serde(default = "default_period_days")]
    pub installment_period_days: u32,
    /// Late-payment rate snapshotted when the loan was opened
    #[serde(default)]
    pub late_rate: Rate,
}

fn default_period_days() -> u32 {
    DEFAULT_PERIOD_DAYS
}

impl LoanTerms {
    pub fn new(
        principal: Money,
        annual_rate: Rate,
        number_of_installments: u32,
        interest_mode: InterestMode,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            principal,
            annual_rate,
            number_of_installments,
            interest_mode,
            start_date,
            installment_period_days: DEFAULT_PERIOD_DAYS,
            late_rate: Decimal::ZERO,
        }
    }

    /// Build terms with the rates currently offered on the rate card.
    pub fn from_rate_card(
        principal: Money,
        number_of_installments: u32,
        interest_mode: InterestMode,
        start_date: NaiveDate,
        card: &RateCard,
    ) -> Self {
        let annual_rate = match interest_mode {
            InterestMode::Simple => card.simple_rate,
            InterestMode::Compound => card.compound_rate,
        };
        Self {
            late_rate: card.late_rate,
            ..Self::new(principal, annual_rate, number_of_installments, interest_mode, start_date)
        }
    }

    pub fn with_period_days(mut self, days: u32) -> Self {
        self.installment_period_days = days;
        self
    }

    pub fn with_late_rate(mut self, rate: Rate) -> Self {
        self.late_rate = rate;
        self
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.principal <= Decimal::ZERO {
            return Err(LoanLedgerError::invalid_terms(
                "principal",
                "Principal must be positive",
            ));
        }
        if self.annual_rate < Decimal::ZERO {
            return Err(LoanLedgerError::invalid_terms(
                "annual_rate",
                "Annual rate cannot be negative",
            ));
        }
        if self.number_of_installments == 0 {
            return Err(LoanLedgerError::invalid_terms(
                "number_of_installments",
                "At least one installment is required",
            ));
        }
        if self.installment_period_days == 0 {
            return Err(LoanLedgerError::invalid_terms(
                "installment_period_days",
                "Installment period must be at least one day",
            ));
        }
        if self.late_rate < Decimal::ZERO {
            return Err(LoanLedgerError::invalid_terms(
                "late_rate",
                "Late rate cannot be negative",
            ));
        }
        self.due_date(self.number_of_installments)?;
        Ok(())
    }

    /// Due date of installment `sequence`: start + sequence × period.
    pub fn due_date(&self, sequence: u32) -> LedgerResult<NaiveDate> {
        let days = u64::from(sequence) * u64::from(self.installment_period_days);
        self.start_date
            .checked_add_days(chrono::Days::new(days))
            .ok_or_else(|| {
                LoanLedgerError::invalid_terms("start_date", "Schedule runs past the calendar range")
            })
    }
}
