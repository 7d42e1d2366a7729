use super::scenario::DebtTranche;

/// Accrues one month of interest on every open tranche and pays its minimum.
///
/// The full minimum is always counted as paid, even when interest exceeds it and the balance
/// does not move. Returns the total of minimums paid.
pub fn apply_minimum_payments(debts: &mut [DebtTranche]) -> f64 {
    let mut total_minimums = 0.0;
    for debt in debts.iter_mut().filter(|debt| debt.balance > 0.0) {
        let interest = debt.balance * debt.apr / 12.0;
        let principal = (debt.minimum_payment - interest).max(0.0);
        debt.balance = (debt.balance - principal).max(0.0);
        total_minimums += debt.minimum_payment;
    }
    total_minimums
}

/// Index of the open tranche with the highest APR. Equal APRs resolve to the earlier tranche.
pub fn avalanche_target(debts: &[DebtTranche]) -> Option<usize> {
    let mut target: Option<usize> = None;
    for (idx, debt) in debts.iter().enumerate() {
        if debt.balance <= 0.0 {
            continue;
        }
        match target {
            Some(current) if debts[current].apr >= debt.apr => {}
            _ => target = Some(idx),
        }
    }
    target
}

/// Applies up to `amount` to one tranche; returns what was actually applied.
pub fn pay_down(debt: &mut DebtTranche, amount: f64) -> f64 {
    if amount <= 0.0 || debt.balance <= 0.0 {
        return 0.0;
    }
    let applied = amount.min(debt.balance);
    debt.balance = (debt.balance - applied).max(0.0);
    applied
}

pub fn total_debt(debts: &[DebtTranche]) -> f64 {
    debts.iter().map(|debt| debt.balance.max(0.0)).sum()
}
