//! Prints the outcome of an exchange scenario as JSON.
//!
//! ```text
//! exchange-preview scenario.json [exchange.toml]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use exchange_session::logging::init_tracing;
use exchange_session::preview::{run_scenario, Scenario};
use exchange_session::{ExchangeConfig, SessionError, SessionResult};
use tracing::error;

fn main() -> ExitCode {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(scenario_path) = args.next() else {
        eprintln!("usage: exchange-preview <scenario.json> [exchange.toml]");
        return ExitCode::from(2);
    };
    let config_path = args.next().map(PathBuf::from);

    match run(PathBuf::from(scenario_path), config_path) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Preview failed: {}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(scenario_path: PathBuf, config_path: Option<PathBuf>) -> SessionResult<String> {
    let config = ExchangeConfig::load(config_path)?;

    let contents = std::fs::read_to_string(&scenario_path).map_err(|e| {
        SessionError::InvalidScenario(format!("{}: {}", scenario_path.display(), e))
    })?;
    let scenario: Scenario = serde_json::from_str(&contents)?;

    let report = run_scenario(scenario, &config)?;
    Ok(serde_json::to_string_pretty(&report)?)
}
