mod debt;
mod engine;
mod export;
mod milestones;
mod payroll;
mod reconcile;
mod retirement;
mod scenario;
mod types;
mod waterfall;

pub use engine::{FinancialEngine, SimulationState, simulate, step, year_of_month};
pub use export::{ExportError, reconciliation_to_csv, snapshots_to_csv};
pub use milestones::{MILESTONES, MilestoneRule, MilestoneTracker};
pub use payroll::{PayrollBreakdown, calculate_payroll};
pub use reconcile::{TOLERANCE, debt_analysis, reconcile};
pub use scenario::{
    Ages, DebtTranche, ExpenseDetails, FilingStatus, FinancialScenario, GoalTargets, LegacyFund,
    LegacyFundKind, MAX_PLANNING_HORIZON, PayrollPolicy, ScenarioError, TaxBracket, TaxTable,
};
pub use types::{
    AnnualReconciliation, DebtAnalysis, DebtBalance, MonthlySnapshot, ReconciliationTotals,
};
pub use waterfall::{GoalStep, WATERFALL};
