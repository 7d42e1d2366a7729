use super::payroll::PayrollBreakdown;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetirementAccounts {
    pub employee_401k: f64,
    pub employer_match: f64,
    pub employer_wealth_builder: f64,
    pub hsa: f64,
}

/// Monthly rate equivalent to compounding `annual_rate` over twelve months.
pub fn monthly_growth_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

impl RetirementAccounts {
    pub fn contribute(&mut self, payroll: &PayrollBreakdown) {
        self.employee_401k += payroll.employee_401k_monthly;
        self.employer_match += payroll.employer_match_monthly;
        self.employer_wealth_builder += payroll.employer_wealth_builder_monthly;
        self.hsa += payroll.hsa_employee_monthly + payroll.hsa_employer_monthly;
    }

    /// Grows every account by one month, including this month's contributions.
    pub fn compound(&mut self, monthly_rate: f64) {
        let factor = 1.0 + monthly_rate;
        self.employee_401k = (self.employee_401k * factor).max(0.0);
        self.employer_match = (self.employer_match * factor).max(0.0);
        self.employer_wealth_builder = (self.employer_wealth_builder * factor).max(0.0);
        self.hsa = (self.hsa * factor).max(0.0);
    }

    pub fn accrue(&mut self, payroll: &PayrollBreakdown, monthly_rate: f64) {
        self.contribute(payroll);
        self.compound(monthly_rate);
    }

    pub fn total(&self) -> f64 {
        self.employee_401k + self.employer_match + self.employer_wealth_builder + self.hsa
    }
}
