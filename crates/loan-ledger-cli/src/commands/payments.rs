use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;

use loan_ledger_core::LoanId;

use super::loans::InstallmentView;
use super::{CommandResult, Context};

/// Which installment a command acts on
#[derive(Args)]
pub struct InstallmentRef {
    /// Loan id
    #[arg(long)]
    pub loan: u64,

    /// Installment sequence number (1-based)
    #[arg(long)]
    pub installment: u32,
}

#[derive(Args)]
pub struct PayArgs {
    #[command(flatten)]
    pub target: InstallmentRef,

    /// Amount received; defaults to what is still owed
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Payment date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

pub fn run_pay(args: PayArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let loan_id = LoanId(args.target.loan);
    let sequence = args.target.installment;
    let amount = match args.amount {
        Some(a) => a,
        None => svc.loan(loan_id)?.installment(sequence)?.outstanding(),
    };
    let inst = svc.record_payment(&ctx.session, loan_id, sequence, amount, args.date)?;
    let as_of = args.date.unwrap_or_else(|| svc.today());
    Ok(serde_json::to_value(InstallmentView::new(&inst, as_of))?)
}

#[derive(Args)]
pub struct CancelArgs {
    #[command(flatten)]
    pub target: InstallmentRef,
}

pub fn run_cancel(args: CancelArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let inst = svc.cancel_installment(
        &ctx.session,
        LoanId(args.target.loan),
        args.target.installment,
    )?;
    Ok(serde_json::to_value(InstallmentView::new(&inst, svc.today()))?)
}

#[derive(Args)]
pub struct LateFeeArgs {
    #[command(flatten)]
    pub target: InstallmentRef,

    /// Late rate to apply; defaults to the rate snapshotted on the loan
    #[arg(long)]
    pub rate: Option<Decimal>,
}

pub fn run_late_fee(args: LateFeeArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let inst = svc.apply_late_fee(
        &ctx.session,
        LoanId(args.target.loan),
        args.target.installment,
        args.rate,
    )?;
    Ok(serde_json::to_value(InstallmentView::new(&inst, svc.today()))?)
}
