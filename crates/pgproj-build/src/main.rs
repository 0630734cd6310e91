//! pgproj-build: build PostgreSQL database projects from the command line.

use clap::Parser;
use dotnet_runner::DotnetRunner;
use miette::{IntoDiagnostic, Result};
use pgproj_build::cli::Args;
use pgproj_build::orchestrator;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("PGPROJ_LOG")
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_default();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    if args.dotnet_version {
        let (version, path) = DotnetRunner::get_dotnet_version().await.into_diagnostic()?;
        println!("dotnet {}", version);
        println!("path: {}", path);
        return Ok(());
    }

    let summary = orchestrator::run(args).await.into_diagnostic()?;
    if summary.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}
