use tracing::warn;

use super::scenario::FinancialScenario;
use super::types::{AnnualReconciliation, DebtAnalysis, MonthlySnapshot, ReconciliationTotals};

/// Largest per-year gap between take-home and its uses that still counts as balanced.
pub const TOLERANCE: f64 = 1.0;

/// Sums each plan year present in `snapshots` and checks take-home against its uses.
///
/// Snapshots must be in month order. Only budget-sourced goal allocations count as used;
/// the loan-assistance subsidy is paid by the employer, not out of take-home.
pub fn reconcile(snapshots: &[MonthlySnapshot]) -> Vec<AnnualReconciliation> {
    snapshots
        .chunk_by(|a, b| a.year == b.year)
        .map(reconcile_year)
        .collect()
}

fn reconcile_year(months: &[MonthlySnapshot]) -> AnnualReconciliation {
    let year = months.first().map_or(0, |s| s.year);
    let sum = |field: fn(&MonthlySnapshot) -> f64| months.iter().map(field).sum::<f64>();

    let net_take_home = sum(|s| s.net_take_home_monthly);
    let expenses = sum(|s| s.monthly_expenses);
    let debt_minimums = sum(|s| s.debt_minimums_paid_monthly);
    let goal_budget_used = sum(MonthlySnapshot::budget_allocations);
    let total_used = expenses + debt_minimums + goal_budget_used;
    let difference = net_take_home - total_used;
    let check_passed = difference.abs() < TOLERANCE;

    if !check_passed {
        warn!(year, difference, "annual reconciliation out of tolerance");
    }

    AnnualReconciliation {
        year,
        months: months.len() as u32,
        data: ReconciliationTotals {
            annual_gross: sum(|s| s.gross_monthly),
            employee_401k: sum(|s| s.employee_401k_monthly),
            employer_match: sum(|s| s.employer_match_monthly),
            fed_tax: sum(|s| s.fed_tax_monthly),
            state_tax: sum(|s| s.state_tax_monthly),
            fica: sum(|s| s.fica_monthly),
            net_take_home,
            expenses,
            debt_minimums,
            goal_budget_used,
            total_used,
            difference,
            check_passed,
        },
    }
}

/// Debt payoff summary over a simulated run.
pub fn debt_analysis(scenario: &FinancialScenario, snapshots: &[MonthlySnapshot]) -> DebtAnalysis {
    let initial_debt = scenario.total_initial_debt();
    let remaining_debt = snapshots.last().map_or(initial_debt, |s| s.total_debt);
    let total_paid: f64 = snapshots
        .iter()
        .map(|s| s.debt_minimums_paid_monthly + s.alloc_debt_avalanche)
        .sum();
    let principal_retired = initial_debt - remaining_debt;
    let debt_free_month = if initial_debt > 0.0 {
        snapshots
            .iter()
            .find(|s| s.total_debt <= 0.0)
            .map(|s| s.month)
    } else {
        None
    };

    DebtAnalysis {
        initial_debt,
        remaining_debt,
        total_paid,
        paid_beyond_principal: (total_paid - principal_retired).max(0.0),
        debt_free_month,
    }
}
