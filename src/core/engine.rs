use tracing::{debug, trace};

use super::debt::{apply_minimum_payments, total_debt};
use super::milestones::{MilestoneContext, MilestoneTracker};
use super::payroll::calculate_payroll;
use super::reconcile::{debt_analysis, reconcile};
use super::retirement::{RetirementAccounts, monthly_growth_rate};
use super::scenario::{DebtTranche, FinancialScenario, ScenarioError};
use super::types::{AnnualReconciliation, DebtAnalysis, DebtBalance, MonthlySnapshot};
use super::waterfall::{CashFunds, WaterfallInput, allocate};

/// Running balances carried from one month into the next.
///
/// A fresh state is built for every run, so nothing (milestones included) leaks between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub funds: CashFunds,
    pub debts: Vec<DebtTranche>,
    pub retirement: RetirementAccounts,
    pub tithing_ytd: f64,
    /// Sum of every completed plan year's full charitable total.
    pub tithing_carryforward: f64,
    pub high_tier: bool,
    pub milestones: MilestoneTracker,
}

impl SimulationState {
    pub fn initial(scenario: &FinancialScenario) -> Self {
        Self {
            funds: CashFunds::default(),
            debts: scenario.initial_debts.clone(),
            retirement: RetirementAccounts::default(),
            tithing_ytd: 0.0,
            tithing_carryforward: 0.0,
            high_tier: false,
            milestones: MilestoneTracker::default(),
        }
    }

    /// Earnest, final emergency fund and down payment funded, and no debt left.
    pub fn primary_goals_complete(&self, scenario: &FinancialScenario) -> bool {
        let goals = &scenario.goals;
        self.funds.earnest >= goals.earnest_money
            && self.funds.emergency_fund >= goals.ef_final
            && self.funds.down_payment >= goals.down_payment
            && total_debt(&self.debts) <= 0.0
    }
}

/// 1-based plan year containing a 1-based month.
pub fn year_of_month(month: u32) -> u32 {
    month.saturating_sub(1) / 12 + 1
}

fn starts_new_year(month: u32) -> bool {
    month > 1 && (month - 1) % 12 == 0
}

/// Advances one month. `month` is 1-based and must follow the month `state` ended on.
pub fn step(
    mut state: SimulationState,
    scenario: &FinancialScenario,
    month: u32,
) -> (SimulationState, MonthlySnapshot) {
    let year = year_of_month(month);
    let policy = &scenario.payroll;

    let goals_complete = state.primary_goals_complete(scenario);
    if goals_complete != state.high_tier {
        debug!(month, goals_complete, "employee contribution tier switched");
        state.high_tier = goals_complete;
    }

    let payroll = calculate_payroll(
        scenario.annual_gross(year),
        goals_complete,
        policy,
        &scenario.tax,
    );

    let prev_total_debt = total_debt(&state.debts);
    let debt_minimums = apply_minimum_payments(&mut state.debts);

    if starts_new_year(month) {
        state.tithing_carryforward += state.tithing_ytd;
        state.tithing_ytd = 0.0;
    }
    let (monthly_tithing, monthly_expenses) = match &scenario.monthly_expense_details {
        Some(details) => {
            let tithing = payroll.base_salary * policy.charitable_rate / 12.0;
            (tithing, details.fixed_total() + tithing)
        }
        None => (0.0, scenario.monthly_expenses),
    };
    state.tithing_ytd += monthly_tithing;

    let goal_budget =
        (payroll.net_take_home_monthly - monthly_expenses - debt_minimums).max(0.0);

    let outcome = allocate(
        &mut state.funds,
        &mut state.debts,
        WaterfallInput {
            month,
            planning_horizon: scenario.planning_horizon,
            goal_budget,
            loan_assistance: payroll.loan_assistance,
            well_being_subsidy: payroll.well_being_subsidy,
            targets: &scenario.goals,
        },
    );

    state
        .retirement
        .accrue(&payroll, monthly_growth_rate(policy.retirement_growth_rate));

    let debt_total = total_debt(&state.debts);
    let fired = state.milestones.record(
        month,
        &MilestoneContext {
            funds: &state.funds,
            total_debt: debt_total,
            prev_total_debt,
            high_tier: goals_complete,
            high_tier_rate: policy.contribution_rate_high,
            targets: &scenario.goals,
        },
    );

    let label = outcome.label();
    trace!(
        month,
        goal_budget,
        taxes = payroll.total_tax_monthly(),
        unallocated = outcome.unallocated,
        label = %label,
        "month simulated"
    );

    let allocations = outcome.allocations;
    let funds = state.funds;
    let retirement = state.retirement;
    let retirement_base = retirement.total();
    let retirement_extra = 0.0;
    let snapshot = MonthlySnapshot {
        month,
        year,

        annual_gross: payroll.annual_gross,
        gross_monthly: payroll.gross_monthly(),
        employee_401k_rate: payroll.employee_401k_rate,
        employee_401k_monthly: payroll.employee_401k_monthly,
        employer_match_monthly: payroll.employer_match_monthly,
        employer_wealth_builder_monthly: payroll.employer_wealth_builder_monthly,
        hsa_employee_monthly: payroll.hsa_employee_monthly,
        hsa_employer_monthly: payroll.hsa_employer_monthly,
        student_loan_assistance: payroll.loan_assistance,
        well_being_subsidy: payroll.well_being_subsidy,
        fed_tax_monthly: payroll.fed_tax_monthly,
        state_tax_monthly: payroll.state_tax_monthly,
        fica_monthly: payroll.fica_monthly,
        net_take_home_monthly: payroll.net_take_home_monthly,

        monthly_expenses,
        debt_minimums_paid_monthly: debt_minimums,
        goal_budget_dynamic_monthly: goal_budget,

        alloc_earnest: allocations.earnest,
        alloc_ef_starter: allocations.ef_starter,
        alloc_debt_avalanche: allocations.debt_avalanche,
        alloc_vacation: allocations.vacation,
        alloc_ef_final: allocations.ef_final,
        alloc_legacy_fund: allocations.legacy_fund,
        alloc_down_payment: allocations.down_payment,
        loan_assistance_applied: allocations.loan_assistance_applied,

        earnest: funds.earnest,
        emergency_fund: funds.emergency_fund,
        down_payment: funds.down_payment,
        vacation_fund: funds.vacation_fund,
        legacy_fund: funds.legacy_fund,
        debts: state
            .debts
            .iter()
            .map(|debt| DebtBalance {
                name: debt.name.clone(),
                apr: debt.apr,
                balance: debt.balance,
            })
            .collect(),
        total_debt: debt_total,

        retirement_balance_base: retirement_base,
        retirement_balance_extra: retirement_extra,
        retirement_balance_total: retirement_base + retirement_extra,
        employee_401k: retirement.employee_401k,
        employer_match: retirement.employer_match,
        employer_wealth_builder: retirement.employer_wealth_builder,
        hsa_balance: retirement.hsa,

        monthly_tithing,
        tithing_ytd: state.tithing_ytd,
        tithing_carryforward: state.tithing_carryforward,
        primary_alloc_label: label,
        milestone: fired.join(", "),
    };

    (state, snapshot)
}

/// Runs every month of the horizon from a fresh state.
pub fn simulate(scenario: &FinancialScenario) -> Vec<MonthlySnapshot> {
    let mut state = SimulationState::initial(scenario);
    let mut snapshots = Vec::with_capacity(scenario.planning_horizon as usize);
    for month in 1..=scenario.planning_horizon {
        let (next, snapshot) = step(state, scenario, month);
        state = next;
        snapshots.push(snapshot);
    }
    debug!(
        months = snapshots.len(),
        milestones = state.milestones.fired_count(),
        "simulation finished"
    );
    snapshots
}

/// Owns a scenario; every call re-runs the simulation from month 1.
#[derive(Debug, Clone, Default)]
pub struct FinancialEngine {
    scenario: FinancialScenario,
}

impl FinancialEngine {
    pub fn new(scenario: FinancialScenario) -> Self {
        Self { scenario }
    }

    pub fn validated(scenario: FinancialScenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        Ok(Self::new(scenario))
    }

    pub fn scenario(&self) -> &FinancialScenario {
        &self.scenario
    }

    pub fn simulate(&self) -> Vec<MonthlySnapshot> {
        simulate(&self.scenario)
    }

    pub fn annual_reconciliation(&self) -> Vec<AnnualReconciliation> {
        reconcile(&self.simulate())
    }

    pub fn debt_analysis(&self) -> DebtAnalysis {
        debt_analysis(&self.scenario, &self.simulate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::debt::avalanche_target;
    use crate::core::scenario::{ExpenseDetails, GoalTargets, LegacyFund, LegacyFundKind};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};
    use std::collections::BTreeSet;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn zero_targets() -> GoalTargets {
        GoalTargets {
            earnest_money: 0.0,
            ef_starter: 0.0,
            ef_final: 0.0,
            down_payment: 0.0,
            vacation_fund: 0.0,
            legacy_fund: LegacyFund {
                kind: LegacyFundKind::Trust,
                target: 0.0,
                start_month: 30,
            },
        }
    }

    fn one_month_scenario() -> FinancialScenario {
        FinancialScenario {
            planning_horizon: 1,
            income_by_year: vec![120_000.0],
            monthly_expense_details: Some(ExpenseDetails::default()),
            initial_debts: vec![DebtTranche::new("Only", 1_000.0, 0.0, 1_000.0)],
            goals: zero_targets(),
            ..FinancialScenario::default()
        }
    }

    fn scenario_from_seed(
        horizon: u32,
        incomes: &[u32],
        expenses: u32,
        debts: &[(u32, u32, u32)],
        targets: [u32; 6],
        itemized: bool,
    ) -> FinancialScenario {
        let mut scenario = FinancialScenario {
            planning_horizon: horizon,
            income_by_year: incomes.iter().map(|v| *v as f64).collect(),
            monthly_expenses: expenses as f64,
            initial_debts: debts
                .iter()
                .enumerate()
                .map(|(idx, (balance, apr_bp, minimum))| {
                    DebtTranche::new(
                        &format!("Debt {idx}"),
                        *balance as f64,
                        *apr_bp as f64 / 10_000.0,
                        *minimum as f64,
                    )
                })
                .collect(),
            goals: GoalTargets {
                earnest_money: targets[0] as f64,
                ef_starter: targets[1] as f64,
                ef_final: (targets[1] + targets[2]) as f64,
                down_payment: targets[3] as f64,
                vacation_fund: targets[4] as f64,
                legacy_fund: LegacyFund {
                    kind: LegacyFundKind::Charity,
                    target: targets[5] as f64,
                    start_month: 6,
                },
            },
            ..FinancialScenario::default()
        };
        if !itemized {
            scenario.monthly_expense_details = None;
        }
        scenario
    }

    #[test]
    fn single_month_minimum_clears_debt_and_house_fund_takes_the_rest() {
        let scenario = one_month_scenario();
        let snapshots = simulate(&scenario);
        assert_eq!(snapshots.len(), 1);
        let month = &snapshots[0];

        assert_approx(month.total_debt, 0.0);
        assert_approx(month.debts[0].balance, 0.0);
        assert_approx(month.debt_minimums_paid_monthly, 1_000.0);
        // The minimum already cleared the only tranche, so neither subsidy nor budget reach it.
        assert_approx(month.alloc_debt_avalanche, 0.0);
        assert_approx(month.loan_assistance_applied, 0.0);

        let tithing = 120_000.0 * 0.10 / 12.0;
        assert_approx(month.monthly_expenses, tithing);
        let budget = month.net_take_home_monthly - tithing - 1_000.0;
        assert_approx(month.goal_budget_dynamic_monthly, budget);
        assert_approx(month.alloc_down_payment, budget);
        assert_approx(month.down_payment, budget);
        assert_approx(month.vacation_fund, 83.33);
        assert_eq!(month.primary_alloc_label, "House-Fund");
        assert_eq!(month.milestone, "All debts paid off");
    }

    #[test]
    fn year_boundaries() {
        assert_eq!(year_of_month(1), 1);
        assert_eq!(year_of_month(12), 1);
        assert_eq!(year_of_month(13), 2);
        assert_eq!(year_of_month(60), 5);
        assert!(!starts_new_year(1));
        assert!(starts_new_year(13));
        assert!(!starts_new_year(14));
    }

    #[test]
    fn reference_scenario_runs_full_horizon() {
        let snapshots = FinancialEngine::default().simulate();
        assert_eq!(snapshots.len(), 60);
        assert_eq!(snapshots[0].year, 1);
        assert_eq!(snapshots[59].year, 5);
        assert_approx(snapshots[12].annual_gross, 185_000.0);
        assert_eq!(snapshots[0].primary_alloc_label, "Earnest, Loan-Assistance");
        assert_approx(snapshots[0].loan_assistance_applied, 100.0);
        assert!(snapshots[0].alloc_earnest > 0.0);
    }

    #[test]
    fn income_path_repeats_last_year() {
        let scenario = FinancialScenario {
            planning_horizon: 30,
            income_by_year: vec![100_000.0],
            ..FinancialScenario::default()
        };
        let snapshots = simulate(&scenario);
        assert!(snapshots.iter().all(|s| s.annual_gross == 100_000.0));
    }

    #[test]
    fn tithing_ytd_resets_and_carries_forward() {
        let scenario = FinancialScenario {
            planning_horizon: 25,
            income_by_year: vec![120_000.0, 240_000.0],
            ..FinancialScenario::default()
        };
        let snapshots = simulate(&scenario);

        assert_approx(snapshots[0].monthly_tithing, 1_000.0);
        assert_approx(snapshots[11].tithing_ytd, 12_000.0);
        assert_approx(snapshots[11].tithing_carryforward, 0.0);

        assert_approx(snapshots[12].monthly_tithing, 2_000.0);
        assert_approx(snapshots[12].tithing_ytd, 2_000.0);
        assert_approx(snapshots[12].tithing_carryforward, 12_000.0);

        assert_approx(snapshots[24].tithing_ytd, 2_000.0);
        assert_approx(snapshots[24].tithing_carryforward, 12_000.0 + 24_000.0);
        assert_approx(
            snapshots[24].monthly_expenses,
            5_148.0 + snapshots[24].monthly_tithing,
        );
    }

    #[test]
    fn flat_expenses_skip_tithing() {
        let scenario = FinancialScenario {
            planning_horizon: 3,
            monthly_expense_details: None,
            monthly_expenses: 4_000.0,
            ..FinancialScenario::default()
        };
        for snapshot in simulate(&scenario) {
            assert_approx(snapshot.monthly_expenses, 4_000.0);
            assert_approx(snapshot.monthly_tithing, 0.0);
        }
    }

    #[test]
    fn retirement_total_is_sum_of_accounts() {
        let snapshots = FinancialEngine::default().simulate();
        for s in &snapshots {
            let sum = s.employee_401k + s.employer_match + s.employer_wealth_builder + s.hsa_balance;
            assert_approx(s.retirement_balance_base, sum);
            assert_approx(s.retirement_balance_extra, 0.0);
            assert_approx(s.retirement_balance_total, sum);
        }
        let rate = monthly_growth_rate(0.06);
        let first = &snapshots[0];
        assert_approx(first.employee_401k, 800.0 * (1.0 + rate));
        assert_approx(first.hsa_balance, 58.33 * (1.0 + rate));
    }

    #[test]
    fn contribution_tier_rises_once_primary_goals_complete() {
        let scenario = FinancialScenario {
            planning_horizon: 4,
            income_by_year: vec![150_000.0],
            initial_debts: vec![DebtTranche::new("Small", 500.0, 0.05, 100.0)],
            goals: zero_targets(),
            ..FinancialScenario::default()
        };
        let snapshots = simulate(&scenario);

        assert_approx(snapshots[0].employee_401k_rate, 0.06);
        assert_approx(snapshots[0].hsa_employee_monthly, 0.0);
        assert_approx(snapshots[0].total_debt, 0.0);

        // Debt cleared in month 1, so month 2 is the first high-tier month.
        assert_approx(snapshots[1].employee_401k_rate, 0.15);
        assert_approx(snapshots[1].hsa_employee_monthly, 200.0);
        assert!(snapshots[1].net_take_home_monthly < snapshots[0].net_take_home_monthly);
        assert!(
            snapshots[1]
                .milestones()
                .any(|name| name == "401k rate increased to 15%")
        );
        assert_eq!(snapshots[2].milestone, "");
        assert_approx(snapshots[3].employee_401k_rate, 0.15);
    }

    #[test]
    fn avalanche_extra_principal_hits_only_the_top_tranche() {
        let scenario = FinancialScenario {
            planning_horizon: 24,
            income_by_year: vec![400_000.0],
            goals: zero_targets(),
            ..FinancialScenario::default()
        };
        let snapshots = simulate(&scenario);

        let mut prev = scenario.initial_debts.clone();
        let mut payoff_month = [None; 3];
        for snapshot in &snapshots {
            let mut after_minimums = prev.clone();
            apply_minimum_payments(&mut after_minimums);
            let target = avalanche_target(&after_minimums);

            for (idx, debt) in snapshot.debts.iter().enumerate() {
                let extra = after_minimums[idx].balance - debt.balance;
                if Some(idx) == target {
                    assert!(extra >= -EPS);
                } else {
                    assert_approx(extra, 0.0);
                }
                if debt.balance <= 0.0 && payoff_month[idx].is_none() {
                    payoff_month[idx] = Some(snapshot.month);
                }
            }

            prev = snapshot
                .debts
                .iter()
                .zip(&prev)
                .map(|(after, before)| DebtTranche {
                    balance: after.balance,
                    ..before.clone()
                })
                .collect();
        }

        let [first, second, third] = payoff_month.map(|m| m.expect("paid off within horizon"));
        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn milestones_carry_configured_amounts() {
        let snapshots = FinancialEngine::default().simulate();
        let all: Vec<&str> = snapshots.iter().flat_map(|s| s.milestones()).collect();
        assert!(all.contains(&"Earnest $15k reached"));
        assert!(all.contains(&"EF $5k starter reached"));
    }

    #[test]
    fn engine_runs_are_independent() {
        let engine = FinancialEngine::default();
        let first = engine.simulate();
        let second = engine.simulate();
        assert_eq!(first, second);
        assert!(first.iter().any(|s| !s.milestone.is_empty()));
    }

    #[test]
    fn step_is_a_pure_reducer() {
        let scenario = FinancialScenario::default();
        let state = SimulationState::initial(&scenario);
        let (a_state, a_snapshot) = step(state.clone(), &scenario, 1);
        let (b_state, b_snapshot) = step(state, &scenario, 1);
        assert_eq!(a_state, b_state);
        assert_eq!(a_snapshot, b_snapshot);

        let (_, month_two) = step(a_state, &scenario, 2);
        assert_eq!(month_two.month, 2);
        assert!(month_two.earnest > a_snapshot.earnest);
    }

    #[test]
    fn validated_engine_rejects_bad_scenario() {
        let scenario = FinancialScenario {
            planning_horizon: 0,
            ..FinancialScenario::default()
        };
        assert_eq!(
            FinancialEngine::validated(scenario).map(|_| ()),
            Err(ScenarioError::ZeroHorizon)
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_monthly_invariants_hold(
            horizon in 1u32..73,
            incomes in proptest::collection::vec(20_000u32..400_000, 1..6),
            expenses in 0u32..9_000,
            debts in proptest::collection::vec((0u32..80_000, 0u32..2_500, 0u32..1_500), 0..4),
            targets in proptest::array::uniform6(0u32..60_000),
            itemized in proptest::bool::ANY
        ) {
            let scenario = scenario_from_seed(horizon, &incomes, expenses, &debts, targets, itemized);
            let snapshots = simulate(&scenario);
            prop_assert_eq!(snapshots.len(), horizon as usize);

            let mut prev_debts: Vec<f64> = scenario.initial_debts.iter().map(|d| d.balance).collect();
            let mut seen = BTreeSet::new();
            for s in &snapshots {
                let take_home = s.gross_monthly
                    - s.employee_401k_monthly
                    - s.hsa_employee_monthly
                    - s.fed_tax_monthly
                    - s.state_tax_monthly
                    - s.fica_monthly;
                prop_assert!((s.net_take_home_monthly - take_home).abs() <= EPS);

                let budget = (s.net_take_home_monthly - s.monthly_expenses - s.debt_minimums_paid_monthly).max(0.0);
                prop_assert!((s.goal_budget_dynamic_monthly - budget).abs() <= EPS);
                prop_assert!(s.budget_allocations() <= s.goal_budget_dynamic_monthly + EPS);
                prop_assert!(s.loan_assistance_applied <= s.student_loan_assistance + EPS);

                for (debt, prev) in s.debts.iter().zip(&prev_debts) {
                    prop_assert!(debt.balance >= 0.0);
                    prop_assert!(debt.balance <= *prev + EPS);
                }
                prev_debts = s.debts.iter().map(|d| d.balance).collect();

                for value in [s.earnest, s.emergency_fund, s.down_payment, s.vacation_fund, s.legacy_fund] {
                    prop_assert!(value >= 0.0);
                }

                for name in s.milestones() {
                    prop_assert!(seen.insert(name.to_string()), "milestone {} fired twice", name);
                }
            }
        }

        #[test]
        fn prop_reconciliation_balances_when_budget_never_goes_negative(
            horizon in 1u32..61,
            incomes in proptest::collection::vec(20_000u32..400_000, 1..6),
            expenses in 0u32..9_000,
            debts in proptest::collection::vec((0u32..80_000, 0u32..2_500, 0u32..1_500), 0..4),
            targets in proptest::array::uniform6(0u32..60_000),
            itemized in proptest::bool::ANY
        ) {
            let scenario = scenario_from_seed(horizon, &incomes, expenses, &debts, targets, itemized);
            let engine = FinancialEngine::new(scenario);
            let snapshots = engine.simulate();
            let years = engine.annual_reconciliation();
            prop_assert_eq!(years.len() as u32, year_of_month(horizon));

            for year in &years {
                let solvent = snapshots
                    .iter()
                    .filter(|s| s.year == year.year)
                    .all(|s| s.net_take_home_monthly - s.monthly_expenses - s.debt_minimums_paid_monthly >= 0.0);
                if solvent {
                    prop_assert!(year.data.check_passed, "year {} off by {}", year.year, year.data.difference);
                }
            }
        }

        #[test]
        fn prop_simulate_is_idempotent(
            horizon in 1u32..61,
            incomes in proptest::collection::vec(20_000u32..400_000, 1..6),
            debts in proptest::collection::vec((0u32..80_000, 0u32..2_500, 0u32..1_500), 0..4),
            targets in proptest::array::uniform6(0u32..60_000)
        ) {
            let scenario = scenario_from_seed(horizon, &incomes, 3_000, &debts, targets, true);
            let first = FinancialEngine::new(scenario.clone()).simulate();
            let second = FinancialEngine::new(scenario).simulate();
            prop_assert_eq!(first, second);
        }
    }
}
