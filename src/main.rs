use std::process::ExitCode;

use clap::Parser;
use zscp::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging, with file output when a log directory is configured.
    let log_dir = match zscp::config::paths::ensure_log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to create log directory: {}", e);
            None
        }
    };
    let _guard = zscp::logging::init_logging(cli.debug, log_dir.clone());
    if let Some(dir) = log_dir {
        tracing::debug!("Logging to {}", dir.display());
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match zscp::app::run(config).await {
        Ok(summary) => {
            tracing::debug!("Done: {} files, {} bytes", summary.files, summary.bytes);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
