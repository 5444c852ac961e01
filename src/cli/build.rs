//! Build command implementation

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::compile::{CompileMode, CompileOrchestrator, EsbuildEngine};
use crate::config::{BuildEnv, Project};

/// Build every configured bundle for production
#[derive(Args, Debug, Default)]
pub struct BuildCommand {}

impl BuildCommand {
    pub async fn execute(&self) -> Result<ExitCode> {
        let env = BuildEnv::detect(BuildEnv::Production);

        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        let project = Project::discover(cwd)?;
        info!("building {} ({})", project.package_name, env.as_str());

        eprintln!(
            "{} Building {} for {}...",
            "→".blue(),
            project.package_name.bold(),
            env.as_str().cyan()
        );

        let configs = project.build_configs(env);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
        spinner.enable_steady_tick(std::time::Duration::from_millis(120));
        spinner.set_message("bundling...");

        let orchestrator = CompileOrchestrator::new(EsbuildEngine::new(), env);
        let outcome = orchestrator.run(&configs, CompileMode::Run).await;
        spinner.finish_and_clear();

        let outcome = outcome.context("Build did not run to completion")?;
        Ok(ExitCode::from(outcome.exit_code))
    }
}
