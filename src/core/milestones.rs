use std::collections::BTreeSet;

use tracing::debug;

use super::scenario::{GoalTargets, LegacyFund};
use super::waterfall::CashFunds;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MilestoneCondition {
    EarnestTarget,
    EmergencyStarterTarget,
    DebtCleared,
    DownPaymentAtLeast(f64),
    DownPaymentTarget,
    EmergencyFinalTarget,
    VacationTarget,
    LegacyAtLeast(f64),
    LegacyTarget,
    HighContributionTier,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MilestoneRule {
    pub key: &'static str,
    pub condition: MilestoneCondition,
}

const fn rule(key: &'static str, condition: MilestoneCondition) -> MilestoneRule {
    MilestoneRule { key, condition }
}

/// Checked in this order every month; names within a month are joined in the same order.
pub const MILESTONES: [MilestoneRule; 11] = [
    rule("earnest", MilestoneCondition::EarnestTarget),
    rule("efStarter", MilestoneCondition::EmergencyStarterTarget),
    rule("debtFree", MilestoneCondition::DebtCleared),
    rule("dp50k", MilestoneCondition::DownPaymentAtLeast(50_000.0)),
    rule("dpTarget", MilestoneCondition::DownPaymentTarget),
    rule("efFinal", MilestoneCondition::EmergencyFinalTarget),
    rule("vacation", MilestoneCondition::VacationTarget),
    rule("legacy10k", MilestoneCondition::LegacyAtLeast(10_000.0)),
    rule("legacy25k", MilestoneCondition::LegacyAtLeast(25_000.0)),
    rule("legacyTarget", MilestoneCondition::LegacyTarget),
    rule("highTier", MilestoneCondition::HighContributionTier),
];

/// Post-update state a milestone condition is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct MilestoneContext<'a> {
    pub funds: &'a CashFunds,
    pub total_debt: f64,
    pub prev_total_debt: f64,
    pub high_tier: bool,
    pub high_tier_rate: f64,
    pub targets: &'a GoalTargets,
}

/// `$15k` for whole thousands, `$1,250` style otherwise.
pub fn short_amount(amount: f64) -> String {
    let rounded = amount.round();
    if rounded >= 1_000.0 && (rounded % 1_000.0).abs() < f64::EPSILON {
        return format!("${}k", (rounded / 1_000.0) as i64);
    }
    let digits = (rounded as i64).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}")
}

fn reached(balance: f64, target: f64) -> bool {
    target > 0.0 && balance >= target
}

fn legacy_name(fund: &LegacyFund) -> &'static str {
    fund.kind.display_name()
}

impl MilestoneRule {
    /// Target conditions only count when the target is positive; a zero target was never pursued.
    pub fn is_met(&self, ctx: &MilestoneContext<'_>) -> bool {
        let funds = ctx.funds;
        let targets = ctx.targets;
        match self.condition {
            MilestoneCondition::EarnestTarget => reached(funds.earnest, targets.earnest_money),
            MilestoneCondition::EmergencyStarterTarget => {
                reached(funds.emergency_fund, targets.ef_starter)
            }
            MilestoneCondition::DebtCleared => ctx.total_debt <= 0.0 && ctx.prev_total_debt > 0.0,
            MilestoneCondition::DownPaymentAtLeast(amount) => reached(funds.down_payment, amount),
            MilestoneCondition::DownPaymentTarget => {
                reached(funds.down_payment, targets.down_payment)
            }
            MilestoneCondition::EmergencyFinalTarget => {
                reached(funds.emergency_fund, targets.ef_final)
            }
            MilestoneCondition::VacationTarget => {
                reached(funds.vacation_fund, targets.vacation_fund)
            }
            MilestoneCondition::LegacyAtLeast(amount) => reached(funds.legacy_fund, amount),
            MilestoneCondition::LegacyTarget => {
                reached(funds.legacy_fund, targets.legacy_fund.target)
            }
            MilestoneCondition::HighContributionTier => ctx.high_tier,
        }
    }

    pub fn name(&self, ctx: &MilestoneContext<'_>) -> String {
        let targets = ctx.targets;
        match self.condition {
            MilestoneCondition::EarnestTarget => {
                format!("Earnest {} reached", short_amount(targets.earnest_money))
            }
            MilestoneCondition::EmergencyStarterTarget => {
                format!("EF {} starter reached", short_amount(targets.ef_starter))
            }
            MilestoneCondition::DebtCleared => "All debts paid off".to_string(),
            MilestoneCondition::DownPaymentAtLeast(amount) => {
                format!("Down Payment {} reached", short_amount(amount))
            }
            MilestoneCondition::DownPaymentTarget => "Down Payment target reached!".to_string(),
            MilestoneCondition::EmergencyFinalTarget => {
                format!("EF {} final reached", short_amount(targets.ef_final))
            }
            MilestoneCondition::VacationTarget => {
                format!("Vacation fund {} reached", short_amount(targets.vacation_fund))
            }
            MilestoneCondition::LegacyAtLeast(amount) => format!(
                "{} {} milestone",
                legacy_name(&targets.legacy_fund),
                short_amount(amount)
            ),
            MilestoneCondition::LegacyTarget => format!(
                "{} {} target reached!",
                legacy_name(&targets.legacy_fund),
                short_amount(targets.legacy_fund.target)
            ),
            MilestoneCondition::HighContributionTier => format!(
                "401k rate increased to {}%",
                (ctx.high_tier_rate * 100.0).round() as i64
            ),
        }
    }
}

/// Keys already fired in one simulation run. Lives in the run's state, never across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MilestoneTracker {
    fired: BTreeSet<&'static str>,
}

impl MilestoneTracker {
    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }

    /// Fires every rule whose condition first holds this month and returns their names.
    pub fn record(&mut self, month: u32, ctx: &MilestoneContext<'_>) -> Vec<String> {
        let mut names = Vec::new();
        for milestone in &MILESTONES {
            if self.fired.contains(milestone.key) || !milestone.is_met(ctx) {
                continue;
            }
            self.fired.insert(milestone.key);
            let name = milestone.name(ctx);
            debug!(month, key = milestone.key, "milestone reached: {name}");
            names.push(name);
        }
        names
    }
}
