use rust_decimal::Decimal;

use super::PeriodSplit;
use crate::config::ScheduleConfig;
use crate::error::LoanLedgerError;
use crate::loan::LoanTerms;
use crate::types::Money;
use crate::LedgerResult;

/// Total simple interest over the full term:
/// principal × annual rate × (installments × period days / basis).
pub fn total_interest(terms: &LoanTerms, config: &ScheduleConfig) -> LedgerResult<Money> {
    let term_days = Decimal::from(terms.number_of_installments)
        * Decimal::from(terms.installment_period_days);
    terms
        .principal
        .checked_mul(terms.annual_rate)
        .and_then(|x| x.checked_mul(term_days))
        .and_then(|x| x.checked_div(config.day_count.basis()))
        .map(|x| config.round(x))
        .ok_or_else(|| {
            LoanLedgerError::invalid_terms("annual_rate", "Interest over the term overflows")
        })
}

/// Even principal and interest per installment; the last one takes both remainders.
pub fn splits(terms: &LoanTerms, config: &ScheduleConfig) -> LedgerResult<Vec<PeriodSplit>> {
    let n = terms.number_of_installments;
    let count = Decimal::from(n);
    let interest_total = total_interest(terms, config)?;

    let principal_each = config.round(terms.principal / count);
    let interest_each = config.round(interest_total / count);

    let mut out = Vec::with_capacity(n as usize);
    let mut principal_allocated = Decimal::ZERO;
    let mut interest_allocated = Decimal::ZERO;

    for k in 1..=n {
        let split = if k == n {
            PeriodSplit {
                principal: terms.principal - principal_allocated,
                interest: interest_total - interest_allocated,
            }
        } else {
            PeriodSplit {
                principal: principal_each,
                interest: interest_each,
            }
        };
        principal_allocated += split.principal;
        interest_allocated += split.interest;
        out.push(split);
    }

    Ok(out)
}
