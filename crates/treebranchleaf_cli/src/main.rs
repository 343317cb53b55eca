//! CLI smoke and diagnostics entry point.
//!
//! # Responsibility
//! - Verify `treebranchleaf_core` linkage with deterministic output.
//! - Given a JSON file holding a flat node list, print hierarchy statistics
//!   and the integrity report.
//!
//! Set `TREEBRANCHLEAF_LOG_DIR` to an absolute path to enable file logging.

use std::process::ExitCode;
use treebranchleaf_core::hierarchy::integrity::{check_integrity, statistics, IntegrityLimits};
use treebranchleaf_core::{core_version, default_log_level, init_logging, ping, Node, NodeStore};

const LOG_DIR_ENV: &str = "TREEBRANCHLEAF_LOG_DIR";

fn main() -> ExitCode {
    println!("treebranchleaf_core ping={}", ping());
    println!("treebranchleaf_core version={}", core_version());

    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match inspect(&path) {
        Ok(valid) => {
            if valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Prints statistics and integrity findings for one node file. Returns
/// whether the tree is free of integrity errors.
fn inspect(path: &str) -> Result<bool, String> {
    let raw = std::fs::read_to_string(path).map_err(|err| format!("cannot read `{path}`: {err}"))?;
    let nodes: Vec<Node> =
        serde_json::from_str(&raw).map_err(|err| format!("invalid node list in `{path}`: {err}"))?;
    log::info!(
        "event=cli_inspect module=cli status=start path={} nodes={}",
        path,
        nodes.len()
    );

    let store = NodeStore::from_nodes(nodes);
    let stats = statistics(&store);
    let report = check_integrity(&store, IntegrityLimits::default());

    let stats_json =
        serde_json::to_string_pretty(&stats).map_err(|err| format!("cannot render stats: {err}"))?;
    println!("statistics={stats_json}");

    for issue in &report.errors {
        println!("error: {issue}");
    }
    for issue in &report.warnings {
        println!("warning: {issue}");
    }
    println!(
        "integrity valid={} errors={} warnings={}",
        report.is_valid(),
        report.errors.len(),
        report.warnings.len()
    );
    Ok(report.is_valid())
}
