//! Compile orchestration
//!
//! Hands the merged config list to the external build engine and maps the
//! result to an exit code. Failures in development keep exit code 0 so a
//! surviving watch process is not torn down by the caller; failures in
//! production exit 1 for CI. Warnings never change the exit code.

mod engine;

use colored::Colorize;
use tracing::debug;

use crate::config::{BuildConfig, BuildEnv};
use crate::error::EngineError;
use crate::utils;

pub use engine::{
    BuildDiagnostic, BuildEngine, BuildReport, EmittedAsset, EsbuildEngine,
};

/// One-shot build or watch-and-rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    Run,
    Watch,
}

/// What a compile pass came to, in exit-code terms.
#[derive(Debug)]
pub struct CompileOutcome {
    pub exit_code: u8,
    pub errors: Vec<BuildDiagnostic>,
}

impl CompileOutcome {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Thin driver between the CLI commands and the build engine.
pub struct CompileOrchestrator<E> {
    engine: E,
    env: BuildEnv,
}

impl<E: BuildEngine> CompileOrchestrator<E> {
    pub fn new(engine: E, env: BuildEnv) -> Self {
        Self { engine, env }
    }

    /// Run the engine once (or keep it watching) and fold the report into
    /// an outcome. A single invocation per call; no retries.
    pub async fn run(
        &self,
        configs: &[BuildConfig],
        mode: CompileMode,
    ) -> Result<CompileOutcome, EngineError> {
        debug!(
            targets = configs.len(),
            env = self.env.as_str(),
            "starting compile ({:?})",
            mode
        );

        let report = match mode {
            CompileMode::Run => self.engine.run(configs).await?,
            CompileMode::Watch => self.engine.watch(configs).await?,
        };

        self.log_report(&report);

        let exit_code = if report.has_errors() && self.env.is_production() {
            1
        } else {
            0
        };

        Ok(CompileOutcome {
            exit_code,
            errors: report.errors,
        })
    }

    fn log_report(&self, report: &BuildReport) {
        for warning in &report.warnings {
            match warning.location() {
                Some(location) => eprintln!(
                    "  {} {} {}",
                    "⚠".yellow(),
                    warning.message,
                    location.dimmed()
                ),
                None => eprintln!("  {} {}", "⚠".yellow(), warning.message),
            }
        }

        for error in &report.errors {
            match error.location() {
                Some(location) => eprintln!(
                    "  {} {} {}",
                    "✗".red().bold(),
                    error.message,
                    location.dimmed()
                ),
                None => eprintln!("  {} {}", "✗".red().bold(), error.message),
            }
        }

        if !report.has_errors() && !report.assets.is_empty() {
            for asset in &report.assets {
                eprintln!(
                    "  {} {} {}",
                    "•".dimmed(),
                    asset.path.display().to_string().cyan(),
                    utils::format_size(asset.size).dimmed()
                );
            }
            eprintln!(
                "\n{} Compiled {} asset(s) in {}\n",
                "✓".green().bold(),
                report.assets.len(),
                utils::format_duration(report.duration)
            );
        }
    }
}
