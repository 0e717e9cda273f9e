use std::process::ExitCode;

use colored::Colorize;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use windmill_ts::cli::CommandLineInterface;

/// `RUST_LOG` wins; otherwise `-v` raises the crate's own level.
fn init_tracing(verbose: u8) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,windmill_ts=info".to_string(),
            2 => "warn,windmill_ts=debug".to_string(),
            _ => "info,windmill_ts=trace".to_string(),
        },
    };
    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose >= 2)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let command_line_interface = CommandLineInterface::load();
    init_tracing(command_line_interface.verbose);

    match command_line_interface.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
