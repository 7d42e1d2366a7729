use thiserror::Error;

use super::types::{AnnualReconciliation, MonthlySnapshot, ReconciliationTotals};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV record: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV buffer: {0}")]
    Flush(#[from] std::io::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

type SnapshotColumn = (&'static str, fn(&MonthlySnapshot) -> f64);

/// Numeric snapshot columns in export order. Per-debt balances follow these.
const SNAPSHOT_COLUMNS: [SnapshotColumn; 47] = [
    ("annualGross", |s| s.annual_gross),
    ("grossMonthly", |s| s.gross_monthly),
    ("employee401kRate", |s| s.employee_401k_rate),
    ("employee401kMonthly", |s| s.employee_401k_monthly),
    ("employerMatchMonthly", |s| s.employer_match_monthly),
    ("employerWealthBuilderMonthly", |s| s.employer_wealth_builder_monthly),
    ("hsaEmployeeMonthly", |s| s.hsa_employee_monthly),
    ("hsaEmployerMonthly", |s| s.hsa_employer_monthly),
    ("studentLoanAssistance", |s| s.student_loan_assistance),
    ("wellBeingSubsidy", |s| s.well_being_subsidy),
    ("fedTaxMonthly", |s| s.fed_tax_monthly),
    ("stateTaxMonthly", |s| s.state_tax_monthly),
    ("ficaMonthly", |s| s.fica_monthly),
    ("netTakeHomeMonthly", |s| s.net_take_home_monthly),
    ("monthlyExpenses", |s| s.monthly_expenses),
    ("debtMinimumsPaidMonthly", |s| s.debt_minimums_paid_monthly),
    ("goalBudgetDynamicMonthly", |s| s.goal_budget_dynamic_monthly),
    ("allocEarnest", |s| s.alloc_earnest),
    ("allocEFStarter", |s| s.alloc_ef_starter),
    ("allocDebtAvalanche", |s| s.alloc_debt_avalanche),
    ("allocVacation", |s| s.alloc_vacation),
    ("allocEFFinal", |s| s.alloc_ef_final),
    ("allocLegacyFund", |s| s.alloc_legacy_fund),
    ("allocDownPayment", |s| s.alloc_down_payment),
    ("loanAssistanceApplied", |s| s.loan_assistance_applied),
    ("earnest", |s| s.earnest),
    ("emergencyFund", |s| s.emergency_fund),
    ("downPayment", |s| s.down_payment),
    ("vacationFund", |s| s.vacation_fund),
    ("legacyFund", |s| s.legacy_fund),
    ("totalDebt", |s| s.total_debt),
    ("retirementBalanceBase", |s| s.retirement_balance_base),
    ("retirementBalanceExtra", |s| s.retirement_balance_extra),
    ("retirementBalanceTotal", |s| s.retirement_balance_total),
    ("employee401k", |s| s.employee_401k),
    ("employerMatch", |s| s.employer_match),
    ("employerWealthBuilder", |s| s.employer_wealth_builder),
    ("hsaBalance", |s| s.hsa_balance),
    ("monthlyTithing", |s| s.monthly_tithing),
    ("tithingYTD", |s| s.tithing_ytd),
    ("tithingCarryforward", |s| s.tithing_carryforward),
    ("totalAllocations", |s| s.total_allocations()),
    ("budgetAllocations", |s| s.budget_allocations()),
    ("totalCash", |s| s.total_cash()),
    ("netWorth", |s| s.net_worth()),
    ("taxTotalMonthly", |s| {
        s.fed_tax_monthly + s.state_tax_monthly + s.fica_monthly
    }),
    ("employerContributionsMonthly", |s| {
        s.employer_match_monthly + s.employer_wealth_builder_monthly + s.hsa_employer_monthly
    }),
];

type ReconciliationColumn = (&'static str, fn(&ReconciliationTotals) -> f64);

const RECONCILIATION_COLUMNS: [ReconciliationColumn; 12] = [
    ("annualGross", |r| r.annual_gross),
    ("employee401k", |r| r.employee_401k),
    ("employerMatch", |r| r.employer_match),
    ("fedTax", |r| r.fed_tax),
    ("stateTax", |r| r.state_tax),
    ("fica", |r| r.fica),
    ("netTakeHome", |r| r.net_take_home),
    ("expenses", |r| r.expenses),
    ("debtMinimums", |r| r.debt_minimums),
    ("goalBudgetUsed", |r| r.goal_budget_used),
    ("totalUsed", |r| r.total_used),
    ("difference", |r| r.difference),
];

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// One row per month: identity, every numeric field, each debt tranche, then the two labels.
pub fn snapshots_to_csv(snapshots: &[MonthlySnapshot]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let debt_names: Vec<&str> = snapshots
        .first()
        .map(|s| s.debts.iter().map(|d| d.name.as_str()).collect())
        .unwrap_or_default();

    let mut header = vec!["month".to_string(), "year".to_string()];
    header.extend(SNAPSHOT_COLUMNS.iter().map(|(name, _)| name.to_string()));
    header.extend(debt_names.iter().map(|name| format!("debt:{name}")));
    header.push("primaryAllocLabel".to_string());
    header.push("milestone".to_string());
    writer.write_record(&header)?;

    for snapshot in snapshots {
        let mut row = vec![snapshot.month.to_string(), snapshot.year.to_string()];
        row.extend(SNAPSHOT_COLUMNS.iter().map(|(_, value)| money(value(snapshot))));
        row.extend(snapshot.debts.iter().map(|d| money(d.balance)));
        row.push(snapshot.primary_alloc_label.clone());
        row.push(snapshot.milestone.clone());
        writer.write_record(&row)?;
    }
    finish(writer)
}

pub fn reconciliation_to_csv(years: &[AnnualReconciliation]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["year", "months"];
    header.extend(RECONCILIATION_COLUMNS.iter().map(|(name, _)| *name));
    header.push("checkPassed");
    writer.write_record(&header)?;

    for year in years {
        let mut row = vec![year.year.to_string(), year.months.to_string()];
        row.extend(
            RECONCILIATION_COLUMNS
                .iter()
                .map(|(_, value)| money(value(&year.data))),
        );
        row.push(year.data.check_passed.to_string());
        writer.write_record(&row)?;
    }
    finish(writer)
}
