//! Schedule generation.
//!
//! Every function here is pure: identical terms and configuration always
//! produce identical installments, which is what lets a restored ledger be
//! checked against a fresh recomputation (see [`verify`]).

pub mod compound;
pub mod simple;
pub mod verify;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::config::ScheduleConfig;
use crate::error::LoanLedgerError;
use crate::loan::{Installment, InterestMode, LoanId, LoanTerms};
use crate::types::*;
use crate::LedgerResult;

/// Principal/interest split of one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSplit {
    pub principal: Money,
    pub interest: Money,
}

/// Generate the ordered installments for `terms`.
///
/// Rounding remainders are absorbed by the final installment. Nothing is
/// produced unless every installment passes validation, and every
/// installment owes a positive amount.
pub fn generate_schedule(
    loan_id: LoanId,
    terms: &LoanTerms,
    config: &ScheduleConfig,
) -> LedgerResult<Vec<Installment>> {
    terms.validate()?;
    if terms.principal != terms.principal.round_dp(config.scale) {
        return Err(LoanLedgerError::invalid_terms(
            "principal",
            "Principal has more decimal places than the currency scale",
        ));
    }

    let splits = match terms.interest_mode {
        InterestMode::Simple => simple::splits(terms, config)?,
        InterestMode::Compound => compound::splits(terms, config)?,
    };

    let mut payable = Decimal::ZERO;
    for split in &splits {
        let due = split.principal.checked_add(split.interest);
        if split.principal < Decimal::ZERO
            || split.interest < Decimal::ZERO
            || due.is_some_and(|d| d.is_zero())
        {
            return Err(LoanLedgerError::invalid_terms(
                "number_of_installments",
                &format!(
                    "Amounts cannot be spread over this many installments at {}dp (principal {}, interest {})",
                    config.scale, split.principal, split.interest
                ),
            ));
        }
        payable = due.and_then(|d| payable.checked_add(d)).ok_or_else(|| {
            LoanLedgerError::invalid_terms("principal", "Schedule total overflows")
        })?;
    }

    let mut installments = Vec::with_capacity(splits.len());
    for (idx, split) in splits.into_iter().enumerate() {
        let sequence = idx as u32 + 1;
        installments.push(Installment::scheduled(
            loan_id,
            sequence,
            terms.due_date(sequence)?,
            split.principal,
            split.interest,
        ));
    }

    debug!(
        loan_id = %loan_id,
        mode = ?terms.interest_mode,
        installments = installments.len(),
        "Schedule generated"
    );

    Ok(installments)
}

/// Schedule plus totals, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub installments: Vec<Installment>,
    pub total_principal: Money,
    pub total_interest: Money,
    pub total_payable: Money,
    /// Level payment of every installment but the last, in compound mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_payment: Option<Money>,
    pub periodic_rate: Rate,
}

pub fn build_schedule_report(
    loan_id: LoanId,
    terms: &LoanTerms,
    config: &ScheduleConfig,
) -> LedgerResult<ComputationOutput<ScheduleReport>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let installments = generate_schedule(loan_id, terms, config)?;
    let total_principal: Money = installments.iter().map(|i| i.principal_portion).sum();
    let total_interest: Money = installments.iter().map(|i| i.interest_portion).sum();
    let periodic_rate = compound::periodic_rate(terms, config)?;

    let level_payment = match terms.interest_mode {
        InterestMode::Compound => installments.first().map(|i| i.total_due),
        InterestMode::Simple => None,
    };

    if terms.annual_rate.is_zero() {
        warnings.push("Annual rate is zero; schedule carries no interest".into());
    }
    if let (Some(first), Some(last)) = (installments.first(), installments.last()) {
        if installments.len() > 1 && first.total_due != last.total_due {
            warnings.push(format!(
                "Final installment absorbs rounding: {} vs {}",
                last.total_due, first.total_due
            ));
        }
    }

    let methodology = match terms.interest_mode {
        InterestMode::Simple => "Simple interest, even principal and interest split",
        InterestMode::Compound => "Compound interest, level-payment amortization",
    };

    let report = ScheduleReport {
        total_payable: total_principal + total_interest,
        installments,
        total_principal,
        total_interest,
        level_payment,
        periodic_rate,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        methodology,
        &serde_json::json!({
            "principal": terms.principal.to_string(),
            "annual_rate": terms.annual_rate.to_string(),
            "installments": terms.number_of_installments,
            "period_days": terms.installment_period_days,
            "day_count": config.day_count,
            "rounding": config.rounding,
        }),
        warnings,
        elapsed,
        config.scale,
        report,
    ))
}
