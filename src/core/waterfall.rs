use super::debt::{avalanche_target, pay_down};
use super::scenario::{DebtTranche, GoalTargets};

/// Running balances of the cash goals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CashFunds {
    pub earnest: f64,
    pub emergency_fund: f64,
    pub vacation_fund: f64,
    pub legacy_fund: f64,
    pub down_payment: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Allocations {
    pub earnest: f64,
    pub ef_starter: f64,
    pub debt_avalanche: f64,
    pub loan_assistance_applied: f64,
    pub vacation: f64,
    pub ef_final: f64,
    pub legacy_fund: f64,
    pub down_payment: f64,
}

impl Allocations {
    /// Allocations drawn from the goal budget, excluding the loan-assistance subsidy.
    pub fn budget_sourced(&self) -> f64 {
        self.earnest
            + self.ef_starter
            + (self.debt_avalanche - self.loan_assistance_applied)
            + self.vacation
            + self.ef_final
            + self.legacy_fund
            + self.down_payment
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GoalStep {
    Earnest,
    EmergencyStarter,
    DebtAvalanche,
    Vacation,
    EmergencyFinal,
    LegacyFund,
    DownPayment,
}

/// Priority order of the monthly waterfall. Each step only sees what earlier steps left.
pub const WATERFALL: [GoalStep; 7] = [
    GoalStep::Earnest,
    GoalStep::EmergencyStarter,
    GoalStep::DebtAvalanche,
    GoalStep::Vacation,
    GoalStep::EmergencyFinal,
    GoalStep::LegacyFund,
    GoalStep::DownPayment,
];

#[derive(Debug, Clone, Copy)]
pub struct WaterfallInput<'a> {
    pub month: u32,
    pub planning_horizon: u32,
    pub goal_budget: f64,
    pub loan_assistance: f64,
    pub well_being_subsidy: f64,
    pub targets: &'a GoalTargets,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallOutcome {
    pub allocations: Allocations,
    pub labels: Vec<&'static str>,
    pub unallocated: f64,
}

impl WaterfallOutcome {
    pub fn label(&self) -> String {
        self.labels.join(", ")
    }
}

fn top_up(balance: &mut f64, target: f64, remaining: &mut f64) -> f64 {
    if *balance >= target || *remaining <= 0.0 {
        return 0.0;
    }
    let alloc = remaining.min(target - *balance).max(0.0);
    *balance += alloc;
    *remaining -= alloc;
    alloc
}

/// Monthly contribution that lands the fund on target by the final month of the horizon.
pub fn paced_contribution(balance: f64, target: f64, month: u32, planning_horizon: u32) -> f64 {
    let shortfall = (target - balance).max(0.0);
    let months_remaining = planning_horizon.saturating_add(1).saturating_sub(month).max(1);
    shortfall / months_remaining as f64
}

/// Runs the waterfall for one month, mutating fund and debt balances in place.
pub fn allocate(
    funds: &mut CashFunds,
    debts: &mut [DebtTranche],
    input: WaterfallInput<'_>,
) -> WaterfallOutcome {
    let targets = input.targets;
    let mut remaining = input.goal_budget.max(0.0);
    let mut allocations = Allocations::default();
    let mut labels = Vec::new();

    for step in WATERFALL {
        match step {
            GoalStep::Earnest => {
                allocations.earnest =
                    top_up(&mut funds.earnest, targets.earnest_money, &mut remaining);
                if allocations.earnest > 0.0 {
                    labels.push("Earnest");
                }
            }
            GoalStep::EmergencyStarter => {
                allocations.ef_starter =
                    top_up(&mut funds.emergency_fund, targets.ef_starter, &mut remaining);
                if allocations.ef_starter > 0.0 {
                    labels.push("EF-Starter");
                }
            }
            GoalStep::DebtAvalanche => {
                // One target per month: the subsidy goes first and never touches the budget.
                let Some(idx) = avalanche_target(debts) else {
                    continue;
                };
                let assistance = pay_down(&mut debts[idx], input.loan_assistance);
                let from_budget = pay_down(&mut debts[idx], remaining);
                remaining -= from_budget;

                allocations.loan_assistance_applied = assistance;
                allocations.debt_avalanche = assistance + from_budget;
                if assistance > 0.0 {
                    labels.push("Loan-Assistance");
                } else if from_budget > 0.0 {
                    labels.push("Debt-Avalanche");
                }
            }
            GoalStep::Vacation => {
                funds.vacation_fund += input.well_being_subsidy.max(0.0);
                allocations.vacation =
                    top_up(&mut funds.vacation_fund, targets.vacation_fund, &mut remaining);
                if allocations.vacation > 0.0 {
                    labels.push("Vacation");
                }
            }
            GoalStep::EmergencyFinal => {
                allocations.ef_final =
                    top_up(&mut funds.emergency_fund, targets.ef_final, &mut remaining);
                if allocations.ef_final > 0.0 {
                    labels.push("EF-Final");
                }
            }
            GoalStep::LegacyFund => {
                let fund = &targets.legacy_fund;
                if input.month < fund.start_month
                    || funds.legacy_fund >= fund.target
                    || remaining <= 0.0
                {
                    continue;
                }
                let paced = paced_contribution(
                    funds.legacy_fund,
                    fund.target,
                    input.month,
                    input.planning_horizon,
                );
                let alloc = remaining.min(paced).max(0.0);
                funds.legacy_fund += alloc;
                remaining -= alloc;
                allocations.legacy_fund = alloc;
                if alloc > 0.0 {
                    labels.push(fund.kind.allocation_label());
                }
            }
            GoalStep::DownPayment => {
                if remaining > 0.0 {
                    allocations.down_payment = remaining;
                    funds.down_payment += remaining;
                    remaining = 0.0;
                    labels.push("House-Fund");
                }
            }
        }
    }

    WaterfallOutcome {
        allocations,
        labels,
        unallocated: remaining,
    }
}
