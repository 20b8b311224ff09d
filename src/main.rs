//! Ring Settlement - Binary Entry Point
//!
//! Settles a JSON scenario and prints the per-ring report. Optionally prints
//! the transfer list and the batch receipt, and checks the result against an
//! expected-result document.
//!
//! Log output goes to stderr and is controlled by `RUST_LOG`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ring_settlement::engine::{net_deltas, TransferPlanner};
use ring_settlement::{AllOrNoneScope, Scenario, ScenarioExpectation, SettlementConfig, SettlementReceipt};

/// Settle a batch of order rings described as JSON
#[derive(Debug, Parser)]
#[command(name = "ring-settle", author, version, about, long_about = None)]
struct Cli {
    /// Scenario file: `{ "rings": [[0, 1]], "orders": [...] }`
    scenario: PathBuf,

    /// Settlement configuration (JSON); absent fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference time for validity windows, overriding the scenario timestamp
    #[arg(long)]
    reference_time: Option<u64>,

    /// All-or-none enforcement scope [default: ring]. `batch` lets several
    /// rings complete one all-or-none order, as in the shared-order case
    /// where one order is filled 60/40 by two rings
    #[arg(long, value_enum)]
    all_or_none_scope: Option<AllOrNoneScope>,

    /// Reject orders without a valid owner signature
    #[arg(long)]
    require_signatures: bool,

    /// Include the transfer list and net balance changes
    #[arg(long)]
    transfers: bool,

    /// Include the batch receipt
    #[arg(long)]
    receipt: bool,

    /// Batch id recorded in the receipt
    #[arg(long, default_value_t = 0)]
    batch_id: u64,

    /// Expected result to check against (defaults to the scenario's own `expected`)
    #[arg(long)]
    expected: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether the result matched the expectation (true when none is given)
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => SettlementConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SettlementConfig::simulation(),
    };
    if let Some(scope) = cli.all_or_none_scope {
        config.all_or_none_scope = scope;
    }
    if cli.require_signatures {
        config.require_signatures = true;
    }

    let scenario = Scenario::load(&cli.scenario)?;
    let context = scenario.context(cli.reference_time);
    let reference_time = context.reference_time;
    let run = scenario.run_with(&config, &Default::default(), context)?;
    info!(
        rings = run.result.rings.len(),
        settled = run.result.settled_count(),
        "scenario settled"
    );

    let mut output = json!({ "rings": run.report().rings });
    if cli.transfers {
        let transfers = TransferPlanner::new(&run.context).plan_batch(&run.result);
        let deltas: Vec<_> = net_deltas(&transfers)
            .into_iter()
            .map(|((account, token), delta)| json!({ "account": account, "token": token, "delta": delta.to_string() }))
            .collect();
        output["transfers"] = serde_json::to_value(&transfers)?;
        output["netDeltas"] = json!(deltas);
    }
    if cli.receipt {
        let receipt = SettlementReceipt::from_batch(cli.batch_id, &run.result, &run.state, reference_time);
        output["receipt"] = json!({
            "batchId": receipt.batch_id,
            "ringsSubmitted": receipt.rings_submitted,
            "ringsSettled": receipt.rings_settled,
            "stateRoot": receipt.state_root_hex(),
            "timestamp": receipt.timestamp,
        });
    }
    println!("{}", serde_json::to_string_pretty(&output)?);

    let expectation = match &cli.expected {
        Some(path) => Some(ScenarioExpectation::from_json(&std::fs::read_to_string(path)?)?),
        None => scenario.expected.clone(),
    };
    let Some(expectation) = expectation else {
        return Ok(true);
    };

    let mismatches = expectation.check(&run.result);
    for mismatch in &mismatches {
        eprintln!("mismatch: {mismatch}");
    }
    Ok(mismatches.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_scope_help_names_batch_mode() {
        let command = Cli::command();
        let arg = command
            .get_arguments()
            .find(|a| a.get_long() == Some("all-or-none-scope"))
            .unwrap();
        let help = arg.get_help().unwrap().to_string();
        assert!(help.contains("batch"));
        assert!(help.contains("default: ring"));
    }

    #[test]
    fn test_scope_flag_parses() {
        let cli = Cli::try_parse_from(["ring-settle", "s.json", "--all-or-none-scope", "batch"]).unwrap();
        assert_eq!(cli.all_or_none_scope, Some(AllOrNoneScope::Batch));
        let cli = Cli::try_parse_from(["ring-settle", "s.json"]).unwrap();
        assert_eq!(cli.all_or_none_scope, None);
    }
}
