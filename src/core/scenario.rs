use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FilingStatus {
    #[serde(rename = "MFJ", alias = "mfj", alias = "married-filing-jointly")]
    MarriedFilingJointly,
    #[serde(rename = "Single", alias = "single")]
    Single,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Ages {
    pub primary: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse: Option<u32>,
}

/// Recurring monthly costs by category.
///
/// `tithing` is the stored base figure only; the engine replaces it every month
/// with a charitable amount derived from the current year's base salary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ExpenseDetails {
    pub rent: f64,
    pub parking: f64,
    pub renters_insurance: f64,
    pub electricity: f64,
    pub natural_gas: f64,
    pub water_sewer_trash: f64,
    pub internet: f64,
    pub mobile_phones: f64,
    pub subscriptions: f64,
    pub auto_insurance: f64,
    pub gas: f64,
    pub maintenance: f64,
    pub registration: f64,
    pub eating_out: f64,
    pub groceries: f64,
    pub tithing: f64,
}

impl ExpenseDetails {
    pub fn housing(&self) -> f64 {
        self.rent
            + self.parking
            + self.renters_insurance
            + self.electricity
            + self.natural_gas
            + self.water_sewer_trash
            + self.internet
            + self.mobile_phones
            + self.subscriptions
    }

    pub fn transport(&self) -> f64 {
        self.auto_insurance + self.gas + self.maintenance + self.registration
    }

    pub fn food(&self) -> f64 {
        self.eating_out + self.groceries
    }

    /// Everything except charitable giving.
    pub fn fixed_total(&self) -> f64 {
        self.housing() + self.transport() + self.food()
    }

    fn named_amounts(&self) -> [(&'static str, f64); 16] {
        [
            ("monthlyExpenseDetails.rent", self.rent),
            ("monthlyExpenseDetails.parking", self.parking),
            ("monthlyExpenseDetails.rentersInsurance", self.renters_insurance),
            ("monthlyExpenseDetails.electricity", self.electricity),
            ("monthlyExpenseDetails.naturalGas", self.natural_gas),
            ("monthlyExpenseDetails.waterSewerTrash", self.water_sewer_trash),
            ("monthlyExpenseDetails.internet", self.internet),
            ("monthlyExpenseDetails.mobilePhones", self.mobile_phones),
            ("monthlyExpenseDetails.subscriptions", self.subscriptions),
            ("monthlyExpenseDetails.autoInsurance", self.auto_insurance),
            ("monthlyExpenseDetails.gas", self.gas),
            ("monthlyExpenseDetails.maintenance", self.maintenance),
            ("monthlyExpenseDetails.registration", self.registration),
            ("monthlyExpenseDetails.eatingOut", self.eating_out),
            ("monthlyExpenseDetails.groceries", self.groceries),
            ("monthlyExpenseDetails.tithing", self.tithing),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DebtTranche {
    pub name: String,
    pub balance: f64,
    pub apr: f64,
    pub minimum_payment: f64,
}

impl DebtTranche {
    pub fn new(name: &str, balance: f64, apr: f64, minimum_payment: f64) -> Self {
        Self {
            name: name.to_string(),
            balance,
            apr,
            minimum_payment,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyFundKind {
    #[serde(alias = "trustFund", alias = "trust-fund")]
    Trust,
    #[serde(alias = "charityFund", alias = "charity-fund")]
    Charity,
}

impl LegacyFundKind {
    pub fn allocation_label(self) -> &'static str {
        match self {
            LegacyFundKind::Trust => "Trust-Fund",
            LegacyFundKind::Charity => "Charity-Fund",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            LegacyFundKind::Trust => "Trust fund",
            LegacyFundKind::Charity => "Charity fund",
        }
    }
}

/// The paced long-horizon fund. Trust and charity variants share one waterfall step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LegacyFund {
    pub kind: LegacyFundKind,
    pub target: f64,
    pub start_month: u32,
}

impl LegacyFund {
    /// Applies a `trustFundTarget` or `charityTarget` override; giving both is an error.
    pub fn apply_shorthand(
        &mut self,
        trust_target: Option<f64>,
        charity_target: Option<f64>,
    ) -> Result<(), ScenarioError> {
        let (kind, target) = match (trust_target, charity_target) {
            (Some(_), Some(_)) => return Err(ScenarioError::ConflictingLegacyTargets),
            (Some(target), None) => (LegacyFundKind::Trust, target),
            (None, Some(target)) => (LegacyFundKind::Charity, target),
            (None, None) => return Ok(()),
        };
        self.kind = kind;
        self.target = target;
        Ok(())
    }
}

impl Default for LegacyFund {
    fn default() -> Self {
        Self {
            kind: LegacyFundKind::Trust,
            target: 50_000.0,
            start_month: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalTargets {
    #[serde(rename = "earnestMoneyTarget")]
    pub earnest_money: f64,
    #[serde(rename = "efStarterTarget")]
    pub ef_starter: f64,
    #[serde(rename = "efFinalTarget")]
    pub ef_final: f64,
    #[serde(rename = "downPaymentTarget")]
    pub down_payment: f64,
    #[serde(rename = "vacationFundTarget")]
    pub vacation_fund: f64,
    pub legacy_fund: LegacyFund,
}

impl Default for GoalTargets {
    fn default() -> Self {
        Self {
            earnest_money: 15_000.0,
            ef_starter: 5_000.0,
            ef_final: 20_000.0,
            down_payment: 60_000.0,
            vacation_fund: 5_000.0,
            legacy_fund: LegacyFund::default(),
        }
    }
}

/// Employer and employee payroll parameters. Rates are fractions, flat amounts are monthly
/// except `bundled_benefits`, which is annual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PayrollPolicy {
    pub contribution_rate_low: f64,
    pub contribution_rate_high: f64,
    pub employer_match_rate: f64,
    pub wealth_builder_rate: f64,
    pub hsa_employee_monthly: f64,
    pub hsa_employer_monthly: f64,
    pub loan_assistance_monthly: f64,
    pub well_being_monthly: f64,
    /// Annual benefits value folded into the reported gross; subtracted to get base salary.
    pub bundled_benefits: f64,
    pub charitable_rate: f64,
    pub retirement_growth_rate: f64,
}

impl Default for PayrollPolicy {
    fn default() -> Self {
        Self {
            contribution_rate_low: 0.06,
            contribution_rate_high: 0.15,
            employer_match_rate: 0.045,
            wealth_builder_rate: 0.06,
            hsa_employee_monthly: 200.0,
            hsa_employer_monthly: 58.33,
            loan_assistance_monthly: 100.0,
            well_being_monthly: 83.33,
            bundled_benefits: 0.0,
            charitable_rate: 0.10,
            retirement_growth_rate: 0.06,
        }
    }
}

/// One marginal band. `ceiling: None` means the band is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TaxBracket {
    pub floor: f64,
    #[serde(default)]
    pub ceiling: Option<f64>,
    pub rate: f64,
}

impl TaxBracket {
    pub const fn new(floor: f64, ceiling: Option<f64>, rate: f64) -> Self {
        Self {
            floor,
            ceiling,
            rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct TaxTable {
    pub standard_deduction: f64,
    pub brackets: Vec<TaxBracket>,
    pub state_deduction: f64,
    pub state_rate: f64,
    pub social_security_wage_cap: f64,
    pub social_security_rate: f64,
    pub medicare_rate: f64,
    pub additional_medicare_threshold: f64,
    pub additional_medicare_rate: f64,
}

impl Default for TaxTable {
    fn default() -> Self {
        Self {
            standard_deduction: 29_200.0,
            brackets: vec![
                TaxBracket::new(0.0, Some(23_200.0), 0.10),
                TaxBracket::new(23_200.0, Some(94_300.0), 0.12),
                TaxBracket::new(94_300.0, Some(201_050.0), 0.22),
                TaxBracket::new(201_050.0, Some(383_900.0), 0.24),
                TaxBracket::new(383_900.0, Some(487_450.0), 0.32),
                TaxBracket::new(487_450.0, Some(731_200.0), 0.35),
                TaxBracket::new(731_200.0, None, 0.37),
            ],
            state_deduction: 24_000.0,
            state_rate: 0.0519,
            social_security_wage_cap: 176_100.0,
            social_security_rate: 0.062,
            medicare_rate: 0.0145,
            additional_medicare_threshold: 250_000.0,
            additional_medicare_rate: 0.009,
        }
    }
}

/// Longest run accepted, in months.
pub const MAX_PLANNING_HORIZON: u32 = 1_200;

/// Deserializes through [`ScenarioDocument`], so omitted fields keep their reference values
/// and unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ScenarioDocument")]
pub struct FinancialScenario {
    pub filing_status: FilingStatus,
    pub ages: Ages,
    pub location: String,
    pub planning_horizon: u32,
    pub income_by_year: Vec<f64>,
    /// Flat monthly living cost, used only when `monthly_expense_details` is absent.
    pub monthly_expenses: f64,
    pub monthly_expense_details: Option<ExpenseDetails>,
    pub initial_debts: Vec<DebtTranche>,
    #[serde(flatten)]
    pub goals: GoalTargets,
    pub payroll: PayrollPolicy,
    pub tax: TaxTable,
}

impl Default for FinancialScenario {
    fn default() -> Self {
        let base_salary_year_one = 160_000.0;
        Self {
            filing_status: FilingStatus::MarriedFilingJointly,
            ages: Ages {
                primary: 22,
                spouse: Some(23),
            },
            location: "Atlanta, GA".to_string(),
            planning_horizon: 60,
            income_by_year: vec![160_000.0, 185_000.0, 214_000.0, 248_000.0, 287_000.0],
            monthly_expenses: 5_700.0,
            monthly_expense_details: Some(ExpenseDetails {
                rent: 2_000.0,
                parking: 200.0,
                renters_insurance: 30.0,
                electricity: 170.0,
                natural_gas: 70.0,
                water_sewer_trash: 90.0,
                internet: 70.0,
                mobile_phones: 120.0,
                subscriptions: 350.0,
                auto_insurance: 600.0,
                gas: 300.0,
                maintenance: 140.0,
                registration: 8.0,
                eating_out: 600.0,
                groceries: 400.0,
                tithing: base_salary_year_one / 12.0 * 0.10,
            }),
            initial_debts: vec![
                DebtTranche::new("Private 10%", 50_000.0, 0.10, 600.0),
                DebtTranche::new("Student 7%", 40_000.0, 0.07, 350.0),
                DebtTranche::new("Private 0%", 50_000.0, 0.0, 200.0),
            ],
            goals: GoalTargets::default(),
            payroll: PayrollPolicy::default(),
            tax: TaxTable::default(),
        }
    }
}

/// Scenario JSON as written by users. Every key is optional and overlays the reference
/// scenario; `trustFundTarget`, `charityTarget` and `legacyStartMonth` are shorthands for
/// `legacyFund`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ScenarioDocument {
    filing_status: Option<FilingStatus>,
    ages: Option<Ages>,
    location: Option<String>,
    planning_horizon: Option<u32>,
    income_by_year: Option<Vec<f64>>,
    monthly_expenses: Option<f64>,
    /// `null` selects flat expenses; absent keeps the reference itemization.
    #[serde(deserialize_with = "present")]
    monthly_expense_details: Option<Option<ExpenseDetails>>,
    initial_debts: Option<Vec<DebtTranche>>,
    earnest_money_target: Option<f64>,
    ef_starter_target: Option<f64>,
    ef_final_target: Option<f64>,
    down_payment_target: Option<f64>,
    vacation_fund_target: Option<f64>,
    legacy_fund: Option<LegacyFund>,
    trust_fund_target: Option<f64>,
    charity_target: Option<f64>,
    legacy_start_month: Option<u32>,
    payroll: Option<PayrollPolicy>,
    tax: Option<TaxTable>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn overlay<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl TryFrom<ScenarioDocument> for FinancialScenario {
    type Error = ScenarioError;

    fn try_from(doc: ScenarioDocument) -> Result<Self, Self::Error> {
        let mut scenario = FinancialScenario::default();
        overlay(&mut scenario.filing_status, doc.filing_status);
        overlay(&mut scenario.ages, doc.ages);
        overlay(&mut scenario.location, doc.location);
        overlay(&mut scenario.planning_horizon, doc.planning_horizon);
        overlay(&mut scenario.income_by_year, doc.income_by_year);
        overlay(&mut scenario.monthly_expenses, doc.monthly_expenses);
        overlay(
            &mut scenario.monthly_expense_details,
            doc.monthly_expense_details,
        );
        overlay(&mut scenario.initial_debts, doc.initial_debts);
        overlay(&mut scenario.payroll, doc.payroll);
        overlay(&mut scenario.tax, doc.tax);

        let goals = &mut scenario.goals;
        overlay(&mut goals.earnest_money, doc.earnest_money_target);
        overlay(&mut goals.ef_starter, doc.ef_starter_target);
        overlay(&mut goals.ef_final, doc.ef_final_target);
        overlay(&mut goals.down_payment, doc.down_payment_target);
        overlay(&mut goals.vacation_fund, doc.vacation_fund_target);

        let legacy = &mut goals.legacy_fund;
        overlay(legacy, doc.legacy_fund);
        legacy.apply_shorthand(doc.trust_fund_target, doc.charity_target)?;
        overlay(&mut legacy.start_month, doc.legacy_start_month);

        Ok(scenario)
    }
}

/// Raised when a scenario cannot be simulated meaningfully.
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("planningHorizon must be >= 1 month")]
    ZeroHorizon,
    #[error("planningHorizon must be <= {max} months (got {value})")]
    HorizonTooLong { value: u32, max: u32 },
    #[error("incomeByYear must contain at least one annual figure")]
    EmptyIncome,
    #[error("{field} must be a finite amount >= 0 (got {value})")]
    InvalidAmount { field: String, value: f64 },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RateOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("tax bracket {index} must start where the previous one ends and have ceiling > floor")]
    BracketOrder { index: usize },
    #[error("trustFundTarget and charityTarget are mutually exclusive")]
    ConflictingLegacyTargets,
}

fn check_amount(field: impl Into<String>, value: f64) -> Result<(), ScenarioError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScenarioError::InvalidAmount {
            field: field.into(),
            value,
        })
    }
}

fn check_rate(field: impl Into<String>, value: f64, max: f64) -> Result<(), ScenarioError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(ScenarioError::RateOutOfRange {
            field: field.into(),
            min: 0.0,
            max,
            value,
        })
    }
}

impl FinancialScenario {
    /// Annual gross for a 1-based plan year; the last entry repeats past the end of the path.
    pub fn annual_gross(&self, year: u32) -> f64 {
        let index = year.saturating_sub(1) as usize;
        self.income_by_year
            .get(index)
            .or_else(|| self.income_by_year.last())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn total_initial_debt(&self) -> f64 {
        self.initial_debts.iter().map(|d| d.balance.max(0.0)).sum()
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.planning_horizon == 0 {
            return Err(ScenarioError::ZeroHorizon);
        }
        if self.planning_horizon > MAX_PLANNING_HORIZON {
            return Err(ScenarioError::HorizonTooLong {
                value: self.planning_horizon,
                max: MAX_PLANNING_HORIZON,
            });
        }
        if self.income_by_year.is_empty() {
            return Err(ScenarioError::EmptyIncome);
        }
        for (idx, income) in self.income_by_year.iter().enumerate() {
            check_amount(format!("incomeByYear[{idx}]"), *income)?;
        }

        check_amount("monthlyExpenses", self.monthly_expenses)?;
        if let Some(details) = &self.monthly_expense_details {
            for (field, value) in details.named_amounts() {
                check_amount(field, value)?;
            }
        }

        for (idx, debt) in self.initial_debts.iter().enumerate() {
            check_amount(format!("initialDebts[{idx}].balance"), debt.balance)?;
            check_amount(
                format!("initialDebts[{idx}].minimumPayment"),
                debt.minimum_payment,
            )?;
            check_rate(format!("initialDebts[{idx}].apr"), debt.apr, 1.0)?;
        }

        let goals = &self.goals;
        for (field, value) in [
            ("earnestMoneyTarget", goals.earnest_money),
            ("efStarterTarget", goals.ef_starter),
            ("efFinalTarget", goals.ef_final),
            ("downPaymentTarget", goals.down_payment),
            ("vacationFundTarget", goals.vacation_fund),
            ("legacyFund.target", goals.legacy_fund.target),
        ] {
            check_amount(field, value)?;
        }

        let payroll = &self.payroll;
        for (field, value) in [
            ("payroll.contributionRateLow", payroll.contribution_rate_low),
            ("payroll.contributionRateHigh", payroll.contribution_rate_high),
            ("payroll.employerMatchRate", payroll.employer_match_rate),
            ("payroll.wealthBuilderRate", payroll.wealth_builder_rate),
            ("payroll.charitableRate", payroll.charitable_rate),
            ("payroll.retirementGrowthRate", payroll.retirement_growth_rate),
        ] {
            check_rate(field, value, 1.0)?;
        }
        for (field, value) in [
            ("payroll.hsaEmployeeMonthly", payroll.hsa_employee_monthly),
            ("payroll.hsaEmployerMonthly", payroll.hsa_employer_monthly),
            ("payroll.loanAssistanceMonthly", payroll.loan_assistance_monthly),
            ("payroll.wellBeingMonthly", payroll.well_being_monthly),
            ("payroll.bundledBenefits", payroll.bundled_benefits),
        ] {
            check_amount(field, value)?;
        }

        self.tax.validate()
    }
}

impl TaxTable {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for (field, value) in [
            ("tax.standardDeduction", self.standard_deduction),
            ("tax.stateDeduction", self.state_deduction),
            ("tax.socialSecurityWageCap", self.social_security_wage_cap),
            (
                "tax.additionalMedicareThreshold",
                self.additional_medicare_threshold,
            ),
        ] {
            check_amount(field, value)?;
        }
        for (field, value) in [
            ("tax.stateRate", self.state_rate),
            ("tax.socialSecurityRate", self.social_security_rate),
            ("tax.medicareRate", self.medicare_rate),
            ("tax.additionalMedicareRate", self.additional_medicare_rate),
        ] {
            check_rate(field, value, 1.0)?;
        }

        let mut expected_floor = 0.0;
        let last = self.brackets.len().saturating_sub(1);
        for (index, bracket) in self.brackets.iter().enumerate() {
            check_rate(format!("tax.brackets[{index}].rate"), bracket.rate, 1.0)?;
            if (bracket.floor - expected_floor).abs() > 1e-9 {
                return Err(ScenarioError::BracketOrder { index });
            }
            match bracket.ceiling {
                Some(ceiling) if ceiling > bracket.floor => expected_floor = ceiling,
                None if index == last => {}
                _ => return Err(ScenarioError::BracketOrder { index }),
            }
        }
        Ok(())
    }
}
