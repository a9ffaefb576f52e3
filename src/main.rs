//! # meh
//!
//! Command-line client for meh-trics. Mutations go straight to the backend
//! when it answers its health check and are queued locally otherwise.
//!
//! ```bash
//! meh task add "Water the plants" --priority low
//! meh --offline mood add 4 --tag rested
//! meh queue status
//! meh sync
//! meh watch --interval 30
//! ```

use clap::Parser;
use mehtrics::{
    cli::{Cli, commands},
    config::load_settings
};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MEH_LOG";

fn init_logging(default_level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { default_level };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings()?;

    init_logging(&settings.log_level, cli.verbose);

    commands::run(cli, settings).await
}
