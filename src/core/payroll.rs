use super::scenario::{PayrollPolicy, TaxBracket, TaxTable};

/// Everything payroll produces for one month. Annual math, reported monthly without rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayrollBreakdown {
    pub annual_gross: f64,
    pub base_salary: f64,
    pub employee_401k_rate: f64,
    pub employee_401k_monthly: f64,
    pub employer_match_monthly: f64,
    pub employer_wealth_builder_monthly: f64,
    pub hsa_employee_monthly: f64,
    pub hsa_employer_monthly: f64,
    pub loan_assistance: f64,
    pub well_being_subsidy: f64,
    pub fed_tax_monthly: f64,
    pub state_tax_monthly: f64,
    pub fica_monthly: f64,
    pub net_take_home_monthly: f64,
}

impl PayrollBreakdown {
    pub fn gross_monthly(&self) -> f64 {
        self.annual_gross / 12.0
    }

    pub fn total_tax_monthly(&self) -> f64 {
        self.fed_tax_monthly + self.state_tax_monthly + self.fica_monthly
    }
}

/// Base salary is the reported gross less any benefits value bundled into it.
pub fn base_salary(annual_gross: f64, policy: &PayrollPolicy) -> f64 {
    (annual_gross - policy.bundled_benefits).max(0.0)
}

pub fn employee_contribution_rate(policy: &PayrollPolicy, goals_complete: bool) -> f64 {
    if goals_complete {
        policy.contribution_rate_high
    } else {
        policy.contribution_rate_low
    }
}

pub fn calculate_payroll(
    annual_gross: f64,
    goals_complete: bool,
    policy: &PayrollPolicy,
    tax: &TaxTable,
) -> PayrollBreakdown {
    let gross = annual_gross.max(0.0);
    let base = base_salary(gross, policy);

    let employee_401k_rate = employee_contribution_rate(policy, goals_complete);
    let employee_401k_annual = base * employee_401k_rate;

    let hsa_employee_monthly = if goals_complete {
        policy.hsa_employee_monthly
    } else {
        0.0
    };
    let hsa_employer_monthly = policy.hsa_employer_monthly;
    let hsa_annual_deduction = (hsa_employee_monthly + hsa_employer_monthly) * 12.0;
    let pre_tax_deductions = employee_401k_annual + hsa_annual_deduction;

    let federal_taxable = (gross - pre_tax_deductions - tax.standard_deduction).max(0.0);
    let fed_tax_annual = federal_income_tax(federal_taxable, &tax.brackets);
    let state_tax_annual = state_income_tax(gross - pre_tax_deductions, tax);
    let fica_annual = fica_tax(gross, tax);

    let net_take_home_annual = gross
        - employee_401k_annual
        - hsa_employee_monthly * 12.0
        - fed_tax_annual
        - state_tax_annual
        - fica_annual;

    PayrollBreakdown {
        annual_gross: gross,
        base_salary: base,
        employee_401k_rate,
        employee_401k_monthly: employee_401k_annual / 12.0,
        employer_match_monthly: base * policy.employer_match_rate / 12.0,
        employer_wealth_builder_monthly: base * policy.wealth_builder_rate / 12.0,
        hsa_employee_monthly,
        hsa_employer_monthly,
        loan_assistance: policy.loan_assistance_monthly,
        well_being_subsidy: policy.well_being_monthly,
        fed_tax_monthly: fed_tax_annual / 12.0,
        state_tax_monthly: state_tax_annual / 12.0,
        fica_monthly: fica_annual / 12.0,
        net_take_home_monthly: net_take_home_annual / 12.0,
    }
}

/// Progressive marginal tax over ordered, non-overlapping bands.
pub fn federal_income_tax(taxable_income: f64, brackets: &[TaxBracket]) -> f64 {
    let income = taxable_income.max(0.0);
    brackets
        .iter()
        .filter(|bracket| income > bracket.floor)
        .map(|bracket| {
            let width = bracket
                .ceiling
                .map_or(f64::INFINITY, |ceiling| ceiling - bracket.floor);
            (income - bracket.floor).min(width) * bracket.rate
        })
        .sum()
}

/// Flat state tax on income after pre-tax deductions and the state deduction.
pub fn state_income_tax(income_after_pre_tax: f64, tax: &TaxTable) -> f64 {
    (income_after_pre_tax - tax.state_deduction).max(0.0) * tax.state_rate
}

pub fn fica_tax(annual_gross: f64, tax: &TaxTable) -> f64 {
    let gross = annual_gross.max(0.0);
    let social_security = gross.min(tax.social_security_wage_cap) * tax.social_security_rate;
    let medicare = gross * tax.medicare_rate;
    let additional_medicare =
        (gross - tax.additional_medicare_threshold).max(0.0) * tax.additional_medicare_rate;
    social_security + medicare + additional_medicare
}
