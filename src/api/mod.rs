pub mod cli;

use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    AnnualReconciliation, DebtAnalysis, FinancialEngine, FinancialScenario, MonthlySnapshot,
    debt_analysis, reconcile,
};

/// Flat overrides layered on top of a base scenario.
///
/// `scenario` (JSON bodies only) replaces the reference scenario as the base; every other
/// field overrides one value of that base.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    scenario: Option<FinancialScenario>,

    planning_horizon: Option<u32>,
    /// Comma-separated annual gross figures, e.g. `160000,185000`.
    income: Option<String>,
    /// Switches the scenario to a flat monthly expense figure.
    monthly_expenses: Option<f64>,

    earnest_money_target: Option<f64>,
    ef_starter_target: Option<f64>,
    ef_final_target: Option<f64>,
    down_payment_target: Option<f64>,
    vacation_fund_target: Option<f64>,
    trust_fund_target: Option<f64>,
    charity_target: Option<f64>,
    legacy_start_month: Option<u32>,

    bundled_benefits: Option<f64>,
    loan_assistance_monthly: Option<f64>,
    well_being_monthly: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MilestoneEvent<'a> {
    month: u32,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationSummary<'a> {
    months: usize,
    final_net_worth: f64,
    final_total_cash: f64,
    final_retirement_balance: f64,
    final_total_debt: f64,
    all_years_reconciled: bool,
    milestones: Vec<MilestoneEvent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimulateResponse<'a> {
    scenario: &'a FinancialScenario,
    summary: SimulationSummary<'a>,
    debt_analysis: DebtAnalysis,
    reconciliation: &'a [AnnualReconciliation],
    snapshots: &'a [MonthlySnapshot],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconciliationResponse<'a> {
    all_years_reconciled: bool,
    years: &'a [AnnualReconciliation],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub(crate) fn parse_income(text: &str) -> Result<Vec<f64>, String> {
    let incomes = text
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f64>()
                .map_err(|_| format!("income must be a comma-separated list of amounts (got '{part}')"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if incomes.is_empty() {
        return Err("income must list at least one annual amount".to_string());
    }
    Ok(incomes)
}

#[cfg(test)]
fn scenario_from_json(json: &str) -> Result<FinancialScenario, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    scenario_from_payload(payload)
}

fn scenario_from_payload(payload: SimulatePayload) -> Result<FinancialScenario, String> {
    let mut scenario = payload.scenario.unwrap_or_default();

    if let Some(v) = payload.planning_horizon {
        scenario.planning_horizon = v;
    }
    if let Some(v) = payload.income.as_deref() {
        scenario.income_by_year = parse_income(v)?;
    }
    if let Some(v) = payload.monthly_expenses {
        scenario.monthly_expenses = v;
        scenario.monthly_expense_details = None;
    }

    let goals = &mut scenario.goals;
    if let Some(v) = payload.earnest_money_target {
        goals.earnest_money = v;
    }
    if let Some(v) = payload.ef_starter_target {
        goals.ef_starter = v;
    }
    if let Some(v) = payload.ef_final_target {
        goals.ef_final = v;
    }
    if let Some(v) = payload.down_payment_target {
        goals.down_payment = v;
    }
    if let Some(v) = payload.vacation_fund_target {
        goals.vacation_fund = v;
    }
    goals
        .legacy_fund
        .apply_shorthand(payload.trust_fund_target, payload.charity_target)
        .map_err(|e| e.to_string())?;
    if let Some(v) = payload.legacy_start_month {
        goals.legacy_fund.start_month = v;
    }

    let policy = &mut scenario.payroll;
    if let Some(v) = payload.bundled_benefits {
        policy.bundled_benefits = v;
    }
    if let Some(v) = payload.loan_assistance_monthly {
        policy.loan_assistance_monthly = v;
    }
    if let Some(v) = payload.well_being_monthly {
        policy.well_being_monthly = v;
    }

    scenario.validate().map_err(|e| e.to_string())?;
    Ok(scenario)
}

pub(crate) fn build_simulate_response<'a>(
    scenario: &'a FinancialScenario,
    snapshots: &'a [MonthlySnapshot],
    reconciliation: &'a [AnnualReconciliation],
) -> SimulateResponse<'a> {
    let last = snapshots.last();
    let milestones = snapshots
        .iter()
        .flat_map(|s| s.milestones().map(move |name| MilestoneEvent { month: s.month, name }))
        .collect();

    SimulateResponse {
        scenario,
        summary: SimulationSummary {
            months: snapshots.len(),
            final_net_worth: last.map_or(0.0, MonthlySnapshot::net_worth),
            final_total_cash: last.map_or(0.0, MonthlySnapshot::total_cash),
            final_retirement_balance: last.map_or(0.0, |s| s.retirement_balance_total),
            final_total_debt: last.map_or(scenario.total_initial_debt(), |s| s.total_debt),
            all_years_reconciled: reconciliation.iter().all(|y| y.data.check_passed),
            milestones,
        },
        debt_analysis: debt_analysis(scenario, snapshots),
        reconciliation,
        snapshots,
    }
}

fn router() -> Router {
    Router::new()
        .route("/api/scenario/default", get(default_scenario_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/reconciliation", post(reconciliation_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Planner HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, router()).await
}

async fn default_scenario_handler() -> Response {
    json_response(StatusCode::OK, FinancialScenario::default())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let scenario = match scenario_from_payload(payload) {
        Ok(scenario) => scenario,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let engine = FinancialEngine::new(scenario);
    let snapshots = engine.simulate();
    let reconciliation = reconcile(&snapshots);
    let response = build_simulate_response(engine.scenario(), &snapshots, &reconciliation);
    json_response(StatusCode::OK, response)
}

async fn reconciliation_handler(Json(payload): Json<SimulatePayload>) -> Response {
    let scenario = match scenario_from_payload(payload) {
        Ok(scenario) => scenario,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let years = FinancialEngine::new(scenario).annual_reconciliation();
    json_response(
        StatusCode::OK,
        ReconciliationResponse {
            all_years_reconciled: years.iter().all(|y| y.data.check_passed),
            years: &years,
        },
    )
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
