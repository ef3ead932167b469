use clap::Args;

use loan_ledger_core::amortization::build_schedule_report;
use loan_ledger_core::LoanId;

use super::{CommandResult, Context, TermsArgs};

/// Preview a schedule without touching the ledger
#[derive(Args)]
pub struct ScheduleArgs {
    #[command(flatten)]
    pub terms: TermsArgs,
}

pub fn run_schedule(args: ScheduleArgs, ctx: &Context) -> CommandResult {
    let config = ctx.service.config();
    let terms = args.terms.resolve(&config.rates, ctx.service.today())?;
    // previews are not stored, so they carry no id of their own
    let report = build_schedule_report(LoanId(0), &terms, &config.schedule)?;
    Ok(serde_json::to_value(report)?)
}
