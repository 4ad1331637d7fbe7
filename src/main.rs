//! cram - interview preparation tracker.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cram::cli::{self, Cli};
use cram::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("cram=warn".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    cli::run(cli).await
}
