use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtBalance {
    pub name: String,
    pub apr: f64,
    pub balance: f64,
}

/// One simulated month. Field names are the export schema; do not rename or merge them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySnapshot {
    pub month: u32,
    pub year: u32,

    pub annual_gross: f64,
    pub gross_monthly: f64,
    pub employee_401k_rate: f64,
    pub employee_401k_monthly: f64,
    pub employer_match_monthly: f64,
    pub employer_wealth_builder_monthly: f64,
    pub hsa_employee_monthly: f64,
    pub hsa_employer_monthly: f64,
    pub student_loan_assistance: f64,
    pub well_being_subsidy: f64,
    pub fed_tax_monthly: f64,
    pub state_tax_monthly: f64,
    pub fica_monthly: f64,
    pub net_take_home_monthly: f64,

    pub monthly_expenses: f64,
    pub debt_minimums_paid_monthly: f64,
    pub goal_budget_dynamic_monthly: f64,

    pub alloc_earnest: f64,
    #[serde(rename = "allocEFStarter")]
    pub alloc_ef_starter: f64,
    /// Loan assistance plus budget-sourced extra principal.
    pub alloc_debt_avalanche: f64,
    pub alloc_vacation: f64,
    #[serde(rename = "allocEFFinal")]
    pub alloc_ef_final: f64,
    pub alloc_legacy_fund: f64,
    pub alloc_down_payment: f64,
    /// The subsidy share of `alloc_debt_avalanche`.
    pub loan_assistance_applied: f64,

    pub earnest: f64,
    pub emergency_fund: f64,
    pub down_payment: f64,
    pub vacation_fund: f64,
    pub legacy_fund: f64,
    pub debts: Vec<DebtBalance>,
    pub total_debt: f64,

    pub retirement_balance_base: f64,
    pub retirement_balance_extra: f64,
    pub retirement_balance_total: f64,
    pub employee_401k: f64,
    pub employer_match: f64,
    pub employer_wealth_builder: f64,
    pub hsa_balance: f64,

    pub monthly_tithing: f64,
    #[serde(rename = "tithingYTD")]
    pub tithing_ytd: f64,
    /// Full charitable totals of all completed plan years, not just the latest month.
    pub tithing_carryforward: f64,
    pub primary_alloc_label: String,
    pub milestone: String,
}

impl MonthlySnapshot {
    /// Sum of every goal allocation, subsidies included.
    pub fn total_allocations(&self) -> f64 {
        self.alloc_earnest
            + self.alloc_ef_starter
            + self.alloc_debt_avalanche
            + self.alloc_vacation
            + self.alloc_ef_final
            + self.alloc_legacy_fund
            + self.alloc_down_payment
    }

    /// Goal allocations drawn from the discretionary budget only.
    pub fn budget_allocations(&self) -> f64 {
        self.total_allocations() - self.loan_assistance_applied
    }

    pub fn total_cash(&self) -> f64 {
        self.earnest + self.emergency_fund + self.vacation_fund + self.legacy_fund + self.down_payment
    }

    pub fn net_worth(&self) -> f64 {
        self.total_cash() + self.retirement_balance_total - self.total_debt
    }

    pub fn milestones(&self) -> impl Iterator<Item = &str> {
        self.milestone.split(", ").filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationTotals {
    pub annual_gross: f64,
    pub employee_401k: f64,
    pub employer_match: f64,
    pub fed_tax: f64,
    pub state_tax: f64,
    pub fica: f64,
    pub net_take_home: f64,
    pub expenses: f64,
    pub debt_minimums: f64,
    pub goal_budget_used: f64,
    pub total_used: f64,
    pub difference: f64,
    pub check_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualReconciliation {
    pub year: u32,
    pub months: u32,
    pub data: ReconciliationTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtAnalysis {
    pub initial_debt: f64,
    pub remaining_debt: f64,
    pub total_paid: f64,
    /// Interest plus any final minimum payment that overshot the remaining balance.
    pub paid_beyond_principal: f64,
    pub debt_free_month: Option<u32>,
}
