use clap::Parser;
use tracing_subscriber::EnvFilter;

use directory_indexer::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Log to stderr so stdout stays clean for results and RPC frames.
    // --verbose forces debug, otherwise RUST_LOG or warn.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
