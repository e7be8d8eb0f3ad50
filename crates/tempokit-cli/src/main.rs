//! tempokit - batch tempo detection, time-stretch, conversion and normalization

use anyhow::Result;
use clap::Parser;
use tempokit_cli::cli::Cli;
use tempokit_cli::commands;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    log::info!("tempokit v{} {:?}", env!("CARGO_PKG_VERSION"), cli.command);

    let report = commands::run(&cli)?;
    print!("{}", report.text);

    if report.is_failure() {
        log::error!("Batch aborted: {}", report.summary);
        std::process::exit(1);
    }
    Ok(())
}
