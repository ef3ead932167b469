//! Engine configuration.
//!
//! Every field has a default so a partial document (or none at all) yields a
//! usable configuration. Front ends layer files and environment variables on
//! top of these defaults before deserializing.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate};

/// Day-count convention used to turn a period length in days into a year fraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayCount {
    /// Actual days over a 365-day year
    #[default]
    #[serde(rename = "actual_365")]
    Actual365,
    /// Actual days over a 360-day year
    #[serde(rename = "actual_360")]
    Actual360,
    /// Days over a 360-day year (30-day months)
    #[serde(rename = "thirty_360")]
    Thirty360,
}

impl DayCount {
    pub fn basis(&self) -> Decimal {
        match self {
            DayCount::Actual365 => dec!(365),
            DayCount::Actual360 | DayCount::Thirty360 => dec!(360),
        }
    }

    pub fn year_fraction(&self, days: u32) -> Decimal {
        Decimal::from(days) / self.basis()
    }
}

/// Midpoint handling when rounding to the currency scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Banker's rounding: 0.125 -> 0.12, 0.135 -> 0.14
    #[default]
    HalfEven,
    /// 0.125 -> 0.13
    HalfUp,
}

impl RoundingMode {
    fn strategy(&self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub day_count: DayCount,
    pub rounding: RoundingMode,
    /// Decimal places of the currency (2 for cents)
    pub scale: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_count: DayCount::default(),
            rounding: RoundingMode::default(),
            scale: 2,
        }
    }
}

impl ScheduleConfig {
    pub fn round(&self, amount: Money) -> Money {
        amount.round_dp_with_strategy(self.scale, self.rounding.strategy())
    }
}

/// How a recorded payment must relate to the amount owed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMatching {
    /// The payment must equal the amount owed exactly
    #[default]
    Exact,
    /// Payments accumulate; the installment settles once fully covered
    PartialAllowed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub payment_matching: PaymentMatching,
    /// Reload-and-retry attempts after a version conflict
    pub max_conflict_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            payment_matching: PaymentMatching::default(),
            max_conflict_retries: 3,
        }
    }
}

/// Rates offered for new loans. Snapshotted into each loan's terms at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateCard {
    pub simple_rate: Rate,
    pub compound_rate: Rate,
    pub late_rate: Rate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schedule: ScheduleConfig,
    pub ledger: LedgerConfig,
    pub rates: RateCard,
}
