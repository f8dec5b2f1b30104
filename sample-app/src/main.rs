mod capture_state;
mod commands;
mod demo_platform;

use std::process::ExitCode;

use clap::Parser;
use commands::DemoOptions;

fn main() -> ExitCode {
    env_logger::init();

    let options = DemoOptions::parse();
    let report = commands::run_demo(options);
    match report.and_then(|report| serde_json::to_string_pretty(&report).map_err(|e| e.to_string())) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Demo failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
