//! prefab - configuration-free build and test orchestration for frontend packages
//!
//! Wraps an external bundler and the usual test runners behind a small,
//! convention-driven command line:
//!
//! - merged per-package build configs with a sensible base
//! - optional server-side rendering bundle alongside the browser bundle
//! - dev server with live reload while a watch build runs
//! - test dispatch to the right runner based on what the specs contain

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use prefab_lib::Cli;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool, debug: bool) {
    let default_filter = if debug {
        "prefab=trace,prefab_lib=trace,tower_http=debug"
    } else if verbose {
        "prefab=debug,prefab_lib=debug"
    } else {
        "prefab=info,prefab_lib=info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.debug);

    cli.execute().await
}
