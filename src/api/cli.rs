use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::filter::LevelFilter;

use super::{build_simulate_response, parse_income, run_http_server};
use crate::core::{
    FinancialEngine, FinancialScenario, reconcile, reconciliation_to_csv, snapshots_to_csv,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(
    name = "planner",
    about = "Month-by-month household plan: payroll, debt avalanche, savings goals and retirement"
)]
pub struct Cli {
    /// Log level for this program. Overridden by RUST_LOG when set.
    #[arg(long, global = true, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate every month of the plan and print the snapshots.
    Simulate(ScenarioArgs),
    /// Print the per-year take-home reconciliation.
    Reconcile(ScenarioArgs),
    /// Serve the JSON API.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScenarioArgs {
    /// Scenario JSON file. Omitted fields fall back to the reference scenario.
    #[arg(long, env = "PLANNER_SCENARIO")]
    scenario: Option<PathBuf>,

    /// Planning horizon in months.
    #[arg(long)]
    horizon: Option<u32>,

    /// Comma-separated annual gross income by year, e.g. 160000,185000.
    #[arg(long)]
    income: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl ScenarioArgs {
    pub fn load_scenario(&self) -> Result<FinancialScenario> {
        let mut scenario = match &self.scenario {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .context(format!("unable to read scenario file {}", path.display()))?;
                serde_json::from_str::<FinancialScenario>(&text)
                    .context(format!("unable to parse scenario file {}", path.display()))?
            }
            None => FinancialScenario::default(),
        };

        if let Some(horizon) = self.horizon {
            scenario.planning_horizon = horizon;
        }
        if let Some(income) = self.income.as_deref() {
            scenario.income_by_year = match parse_income(income) {
                Ok(incomes) => incomes,
                Err(msg) => bail!("--{msg}"),
            };
        }

        scenario.validate().context("invalid scenario")?;
        Ok(scenario)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    debug!("{cli:?}");
    match cli.command() {
        Command::Simulate(args) => {
            let engine = FinancialEngine::new(args.load_scenario()?);
            let snapshots = engine.simulate();
            let output = match args.format {
                OutputFormat::Json => {
                    let reconciliation = reconcile(&snapshots);
                    let response =
                        build_simulate_response(engine.scenario(), &snapshots, &reconciliation);
                    serde_json::to_string_pretty(&response)?
                }
                OutputFormat::Csv => snapshots_to_csv(&snapshots)?,
            };
            println!("{}", output.trim_end());
        }

        Command::Reconcile(args) => {
            let years = FinancialEngine::new(args.load_scenario()?).annual_reconciliation();
            let failed = years.iter().filter(|y| !y.data.check_passed).count();
            if failed > 0 {
                warn!("{failed} year(s) did not reconcile");
            }
            let output = match args.format {
                OutputFormat::Json => serde_json::to_string_pretty(&years)?,
                OutputFormat::Csv => reconciliation_to_csv(&years)?,
            };
            println!("{}", output.trim_end());
        }

        Command::Serve(args) => run_http_server(args.port)
            .await
            .context("HTTP server stopped")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_args(argv: &[&str]) -> ScenarioArgs {
        let cli = Cli::try_parse_from(argv).expect("valid args");
        match cli.command {
            Command::Simulate(args) | Command::Reconcile(args) => args,
            Command::Serve(_) => panic!("expected a scenario command"),
        }
    }

    #[test]
    fn defaults_to_reference_scenario_and_json() {
        let args = scenario_args(&["planner", "simulate"]);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(
            args.load_scenario().expect("default"),
            FinancialScenario::default()
        );
    }

    #[test]
    fn flags_overlay_the_scenario() {
        let args = scenario_args(&[
            "planner",
            "reconcile",
            "--horizon",
            "24",
            "--income",
            "100000,110000",
            "--format",
            "csv",
        ]);
        assert_eq!(args.format, OutputFormat::Csv);
        let scenario = args.load_scenario().expect("valid");
        assert_eq!(scenario.planning_horizon, 24);
        assert_eq!(scenario.income_by_year, vec![100_000.0, 110_000.0]);
    }

    #[test]
    fn invalid_overlay_is_an_error() {
        let args = scenario_args(&["planner", "simulate", "--horizon", "0"]);
        let err = args.load_scenario().expect_err("zero horizon");
        assert!(format!("{err:#}").contains("planningHorizon"));

        let args = scenario_args(&["planner", "simulate", "--income", "lots"]);
        let err = args.load_scenario().expect_err("bad income");
        assert!(err.to_string().starts_with("--income"));
    }

    #[test]
    fn scenario_file_is_loaded_and_overlaid() {
        let path = std::env::temp_dir().join(format!("planner-cli-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"planningHorizon": 18, "initialDebts": []}"#).expect("write");

        let path_arg = path.to_string_lossy().to_string();
        let args = scenario_args(&[
            "planner",
            "simulate",
            "--scenario",
            path_arg.as_str(),
            "--horizon",
            "9",
        ]);
        let scenario = args.load_scenario().expect("load");
        std::fs::remove_file(&path).ok();

        assert_eq!(scenario.planning_horizon, 9);
        assert!(scenario.initial_debts.is_empty());
    }

    #[test]
    fn missing_scenario_file_names_the_path() {
        let args = scenario_args(&["planner", "simulate", "--scenario", "/nonexistent/plan.json"]);
        let err = args.load_scenario().expect_err("missing file");
        assert!(err.to_string().contains("/nonexistent/plan.json"));
    }

    #[test]
    fn log_level_is_global() {
        let cli = Cli::try_parse_from(["planner", "serve", "--port", "9000", "--log-level", "debug"])
            .expect("valid args");
        assert_eq!(cli.log_level(), LevelFilter::DEBUG);
        match cli.command() {
            Command::Serve(args) => assert_eq!(args.port, 9000),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
