use tunnel_probe::args::ProbeArgs;
use tunnel_probe::logger::initialize as LoggerInitialize;
use tunnel_probe::probe::run;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = ProbeArgs::parse();

    if let Err(e) = LoggerInitialize(args.log_dir.as_deref(), args.log_level()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(report) => {
            info!(
                "Reply received in {}",
                humantime::format_duration(report.elapsed)
            );
            println!("{}", report.reply);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
