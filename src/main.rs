// promptmap/src/main.rs

use std::process::ExitCode;

use clap::Parser;
use promptmap::{aggregate::CancelToken, commands};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = commands::Cli::parse();
    setup_logging(cli.verbose);
    commands::run_cli(&cli, &CancelToken::new())
}

/// `RUST_LOG` wins; otherwise -v → debug, -vv → trace, default warn.
fn setup_logging(verbosity: u8) {
    let fallback = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
