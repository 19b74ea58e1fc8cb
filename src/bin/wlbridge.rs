use std::process::ExitCode;

use tracing::{debug, error};
use wlbridge::cli::{execute, Invocation};
use wlbridge::config::BridgeConfig;
use wlbridge::logging;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let invocation = match Invocation::parse(&args) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match &invocation.config {
        Some(path) => match BridgeConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => BridgeConfig::discover(),
    };

    // Initialize logging early; the guard flushes file output on exit
    let _guard = logging::init_with_config(config.log_config());
    debug!(command = ?invocation.command, "configuration loaded");

    let json = invocation.json || config.cli.json;
    match execute(&invocation.command, json) {
        Ok((output, passed)) => {
            print!("{}", output);
            if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
