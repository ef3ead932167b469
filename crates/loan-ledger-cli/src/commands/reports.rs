use chrono::{Datelike, NaiveDate};
use clap::Args;
use serde_json::json;

use loan_ledger_core::portfolio::{monthly_summary, summarize, upcoming_due};

use super::loans::InstallmentView;
use super::{CommandResult, Context};

#[derive(Args)]
pub struct AsOfArgs {
    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
}

pub fn run_overdue(args: AsOfArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let as_of = args.as_of.unwrap_or_else(|| svc.today());
    let rows: Vec<serde_json::Value> = svc
        .overdue(Some(as_of))?
        .iter()
        .map(|inst| -> Result<serde_json::Value, serde_json::Error> {
            let mut row = serde_json::to_value(InstallmentView::new(inst, as_of))?;
            row["loan_id"] = json!(inst.loan_id);
            Ok(row)
        })
        .collect::<Result<_, _>>()?;
    Ok(serde_json::Value::Array(rows))
}

#[derive(Args)]
pub struct UpcomingArgs {
    #[command(flatten)]
    pub as_of: AsOfArgs,

    /// Maximum number of installments to list
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

pub fn run_upcoming(args: UpcomingArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let as_of = args.as_of.as_of.unwrap_or_else(|| svc.today());
    let next = upcoming_due(&svc.loans()?, as_of, args.limit);
    Ok(serde_json::to_value(next)?)
}

#[derive(Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub as_of: AsOfArgs,

    /// Calendar month for the cash summary (YYYY-MM); defaults to the as-of month
    #[arg(long, value_parser = parse_month)]
    pub month: Option<Month>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

fn parse_month(s: &str) -> Result<Month, String> {
    let date = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM, got '{s}'"))?;
    Ok(Month {
        year: date.year(),
        month: date.month(),
    })
}

pub fn run_summary(args: SummaryArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let as_of = args.as_of.as_of.unwrap_or_else(|| svc.today());
    let month = args.month.unwrap_or(Month {
        year: as_of.year(),
        month: as_of.month(),
    });
    let loans = svc.loans()?;
    Ok(json!({
        "portfolio": summarize(&loans, as_of),
        "month": monthly_summary(&loans, month.year, month.month),
    }))
}

pub fn run_verify(ctx: &Context) -> CommandResult {
    let checks = ctx.service.verify()?;
    let inconsistent = checks.iter().filter(|c| !c.consistent).count();
    Ok(json!({
        "consistent": inconsistent == 0,
        "loans_checked": checks.len(),
        "inconsistent_loans": inconsistent,
        "loans": checks,
    }))
}
