use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use loan_ledger_core::{
    BorrowerId, Installment, InstallmentStatus, Loan, LoanId, LoanStatus, LoanTerms,
};

use super::{CommandResult, Context, TermsArgs};

/// Installment as shown to a user: status is projected to `as_of`
#[derive(Debug, Serialize)]
pub struct InstallmentView {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub principal_portion: Decimal,
    pub interest_portion: Decimal,
    pub late_fee: Decimal,
    pub total_due: Decimal,
    pub outstanding: Decimal,
    pub status: InstallmentStatus,
    pub paid_date: Option<NaiveDate>,
    pub paid_amount: Option<Decimal>,
    pub days_overdue: i64,
}

impl InstallmentView {
    pub fn new(inst: &Installment, as_of: NaiveDate) -> Self {
        Self {
            sequence: inst.sequence,
            due_date: inst.due_date,
            principal_portion: inst.principal_portion,
            interest_portion: inst.interest_portion,
            late_fee: inst.late_fee,
            total_due: inst.total_due,
            outstanding: inst.outstanding(),
            status: inst.effective_status(as_of),
            paid_date: inst.paid_date,
            paid_amount: inst.paid_amount,
            days_overdue: inst.days_overdue(as_of),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoanView {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub status: LoanStatus,
    pub version: u64,
    pub as_of: NaiveDate,
    pub terms: LoanTerms,
    pub outstanding: Decimal,
    pub total_received: Decimal,
    pub installments: Vec<InstallmentView>,
}

impl LoanView {
    pub fn new(loan: &Loan, as_of: NaiveDate) -> Self {
        Self {
            id: loan.id,
            borrower_id: loan.borrower_id,
            status: loan.status(),
            version: loan.version,
            as_of,
            terms: loan.terms.clone(),
            outstanding: loan.outstanding(),
            total_received: loan.total_received(),
            installments: loan
                .installments
                .iter()
                .map(|i| InstallmentView::new(i, as_of))
                .collect(),
        }
    }
}

/// One line per loan in a listing
#[derive(Debug, Serialize)]
pub struct LoanLine {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub status: LoanStatus,
    pub principal: Decimal,
    pub installments: u32,
    pub overdue: usize,
    pub outstanding: Decimal,
}

impl LoanLine {
    pub fn new(loan: &Loan, as_of: NaiveDate) -> Self {
        Self {
            id: loan.id,
            borrower_id: loan.borrower_id,
            status: loan.status(),
            principal: loan.terms.principal,
            installments: loan.terms.number_of_installments,
            overdue: loan.overdue_installments(as_of).count(),
            outstanding: loan.outstanding(),
        }
    }
}

/// Generate a schedule and record the loan in the ledger
#[derive(Args)]
pub struct OpenArgs {
    /// Loan id; defaults to the next free one
    #[arg(long)]
    pub id: Option<u64>,

    /// Borrower the loan is made to
    #[arg(long)]
    pub borrower: u64,

    #[command(flatten)]
    pub terms: TermsArgs,
}

pub fn run_open(args: OpenArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let today = svc.today();
    let terms = args.terms.resolve(&svc.config().rates, today)?;
    let loan = svc.open_loan(
        &ctx.session,
        args.id.map(LoanId),
        BorrowerId(args.borrower),
        terms,
    )?;
    Ok(serde_json::to_value(LoanView::new(&loan, today))?)
}

/// Replace the terms of a loan that has no payments yet
#[derive(Args)]
pub struct RescheduleArgs {
    /// Loan id
    #[arg(long)]
    pub loan: u64,

    #[command(flatten)]
    pub terms: TermsArgs,
}

pub fn run_reschedule(args: RescheduleArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let today = svc.today();
    let terms = args.terms.resolve(&svc.config().rates, today)?;
    let loan = svc.reschedule(&ctx.session, LoanId(args.loan), terms)?;
    Ok(serde_json::to_value(LoanView::new(&loan, today))?)
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Loan id
    #[arg(long)]
    pub loan: u64,
}

pub fn run_delete(args: DeleteArgs, ctx: &Context) -> CommandResult {
    let id = LoanId(args.loan);
    ctx.service.delete_loan(&ctx.session, id)?;
    Ok(json!({ "loan_id": id, "deleted": true }))
}

#[derive(Args)]
pub struct StatusArgs {
    /// Loan id; lists every loan when omitted
    #[arg(long, conflicts_with = "borrower")]
    pub loan: Option<u64>,

    /// Only list loans made to this borrower
    #[arg(long)]
    pub borrower: Option<u64>,

    /// Project overdue state to this date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
}

pub fn run_status(args: StatusArgs, ctx: &Context) -> CommandResult {
    let svc = &ctx.service;
    let as_of = args.as_of.unwrap_or_else(|| svc.today());
    match args.loan {
        Some(id) => {
            let loan = svc.loan(LoanId(id))?;
            Ok(serde_json::to_value(LoanView::new(&loan, as_of))?)
        }
        None => {
            let loans = match args.borrower {
                Some(b) => svc.loans_for_borrower(BorrowerId(b))?,
                None => svc.loans()?,
            };
            let lines: Vec<LoanLine> = loans
                .iter()
                .map(|l| LoanLine::new(l, as_of))
                .collect();
            Ok(serde_json::to_value(lines)?)
        }
    }
}
