use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use super::PeriodSplit;
use crate::config::ScheduleConfig;
use crate::error::LoanLedgerError;
use crate::loan::LoanTerms;
use crate::types::{Money, Rate};
use crate::LedgerResult;

/// Rate applied to the outstanding balance each period.
pub fn periodic_rate(terms: &LoanTerms, config: &ScheduleConfig) -> LedgerResult<Rate> {
    terms
        .annual_rate
        .checked_mul(Decimal::from(terms.installment_period_days))
        .and_then(|x| x.checked_div(config.day_count.basis()))
        .ok_or_else(|| LoanLedgerError::invalid_terms("annual_rate", "Periodic rate overflows"))
}

/// Level payment that amortizes `principal` over `periods` at `rate` per period.
///
/// P × r × (1+r)^n / ((1+r)^n − 1), or P / n at a zero rate. Not rounded.
pub fn level_payment(principal: Money, rate: Rate, periods: u32) -> LedgerResult<Money> {
    if periods == 0 {
        return Err(LoanLedgerError::invalid_terms(
            "number_of_installments",
            "Number of periods must be > 0",
        ));
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(periods));
    }

    let factor = (Decimal::ONE + rate)
        .checked_powu(u64::from(periods))
        .ok_or_else(|| {
            LoanLedgerError::invalid_terms(
                "annual_rate",
                "Compounding factor overflows for this rate and term",
            )
        })?;
    let denominator = factor - Decimal::ONE;
    if denominator.is_zero() {
        return Err(LoanLedgerError::invalid_terms(
            "annual_rate",
            "Periodic rate too small to amortize at decimal precision",
        ));
    }

    principal
        .checked_mul(rate)
        .and_then(|x| x.checked_mul(factor))
        .and_then(|x| x.checked_div(denominator))
        .ok_or_else(|| {
            LoanLedgerError::invalid_terms("principal", "Payment calculation overflows")
        })
}

/// Level payments with interest on the running balance; the final installment
/// repays whatever balance remains so it closes at exactly zero.
pub fn splits(terms: &LoanTerms, config: &ScheduleConfig) -> LedgerResult<Vec<PeriodSplit>> {
    let n = terms.number_of_installments;
    let rate = periodic_rate(terms, config)?;
    let payment = config.round(level_payment(terms.principal, rate, n)?);

    let mut out = Vec::with_capacity(n as usize);
    let mut balance = terms.principal;

    for k in 1..=n {
        let interest = balance.checked_mul(rate).map(|x| config.round(x)).ok_or_else(|| {
            LoanLedgerError::invalid_terms("principal", "Interest on the balance overflows")
        })?;
        let principal = if k == n {
            balance
        } else {
            (payment - interest).max(Decimal::ZERO).min(balance)
        };
        balance -= principal;
        out.push(PeriodSplit {
            principal,
            interest,
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::InterestMode;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn terms(principal: Money, rate: Rate, n: u32) -> LoanTerms {
        LoanTerms::new(
            principal,
            rate,
            n,
            InterestMode::Compound,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[test]
    fn test_level_payment_textbook() {
        // 1000 at 1% per period over 12 periods ≈ 88.85
        let pmt = level_payment(dec!(1000), dec!(0.01), 12).unwrap();
        assert!((pmt - dec!(88.8488)).abs() < dec!(0.001), "got {pmt}");
    }

    #[test]
    fn test_zero_rate_even_split() {
        let s = splits(&terms(dec!(900.00), Decimal::ZERO, 3), &ScheduleConfig::default()).unwrap();
        assert!(s.iter().all(|x| x.principal == dec!(300.00) && x.interest.is_zero()));
    }

    #[test]
    fn test_balance_closes_at_zero() {
        let t = terms(dec!(1200.00), dec!(0.12), 12);
        let s = splits(&t, &ScheduleConfig::default()).unwrap();
        let repaid: Money = s.iter().map(|x| x.principal).sum();
        assert_eq!(repaid, dec!(1200.00));
    }

    #[test]
    fn test_payments_level_except_last() {
        let t = terms(dec!(5000.00), dec!(0.18), 24);
        let cfg = ScheduleConfig::default();
        let s = splits(&t, &cfg).unwrap();
        let first = s[0].principal + s[0].interest;
        for x in &s[..23] {
            assert_eq!(x.principal + x.interest, first);
        }
        let last = s[23].principal + s[23].interest;
        assert!((last - first).abs() < dec!(0.25), "last {last} vs {first}");
    }

    #[test]
    fn test_interest_on_running_balance() {
        let t = terms(dec!(1000.00), dec!(0.365), 2).with_period_days(10);
        let cfg = ScheduleConfig::default();
        // periodic rate = 0.365 × 10 / 365 = 0.01
        assert_eq!(periodic_rate(&t, &cfg).unwrap(), dec!(0.01));
        let s = splits(&t, &cfg).unwrap();
        assert_eq!(s[0].interest, dec!(10.00));
        // payment = 507.51, principal 497.51, balance 502.49
        assert_eq!(s[0].principal, dec!(497.51));
        assert_eq!(s[1].interest, dec!(5.02));
        assert_eq!(s[1].principal, dec!(502.49));
    }

    #[test]
    fn test_overflowing_factor_rejected() {
        let t = terms(dec!(1000.00), dec!(365), 500).with_period_days(365);
        assert!(splits(&t, &ScheduleConfig::default()).is_err());
    }
}
