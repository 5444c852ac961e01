//! Test command implementation

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::runner::{
    self, check_node_version, spawn_runner, RunnerInvocation, RunnerKind, RunnerOptions,
    TestTarget, MINIMUM_NODE_VERSION,
};

/// Run the package test suite
#[derive(Args, Debug)]
pub struct TestCommand {
    /// Spec file or directory to run (defaults to the conventional test directory)
    pub target: Option<String>,

    /// Force the plain script runner
    #[arg(long, conflicts_with = "vue")]
    pub js: bool,

    /// Force the component runner
    #[arg(long)]
    pub vue: bool,

    /// Rerun on change
    #[arg(short, long)]
    pub watch: bool,

    /// Collect coverage
    #[arg(long)]
    pub cover: bool,

    /// Write coverage summary reports (implies --cover)
    #[arg(long)]
    pub report: bool,
}

impl TestCommand {
    pub async fn execute(&self) -> Result<ExitCode> {
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;

        let target = runner::resolve_target(self.target.as_deref(), &cwd)?;
        let kind = self.runner_for(&target);
        info!("test target {} via {}", target.glob, kind.command());

        check_node_version(MINIMUM_NODE_VERSION).await?;

        eprintln!(
            "{} Running {} via {}...",
            "→".blue(),
            target.glob.bold(),
            kind.command().cyan()
        );

        let options = RunnerOptions {
            watch: self.watch,
            cover: self.cover || self.report,
            report: self.report,
        };
        let invocation = RunnerInvocation::for_runner(kind, &target.glob, &options);
        let code = spawn_runner(&invocation, &cwd).await?;

        if code == 0 {
            eprintln!("\n{} Tests passed\n", "✓".green().bold());
        } else {
            eprintln!(
                "\n{} Tests failed (exit code {})\n",
                "✗".red().bold(),
                code
            );
        }

        Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
    }

    /// An explicit flag beats the filename classification.
    fn runner_for(&self, target: &TestTarget) -> RunnerKind {
        if self.js {
            RunnerKind::Plain
        } else if self.vue {
            RunnerKind::Combined
        } else {
            RunnerKind::for_target(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(js: bool, vue: bool) -> TestCommand {
        TestCommand {
            target: None,
            js,
            vue,
            watch: false,
            cover: false,
            report: false,
        }
    }

    #[test]
    fn test_flags_override_classification() {
        let mixed = TestTarget {
            glob: "test/**/*.js".to_string(),
            js_only: false,
        };
        assert_eq!(command(true, false).runner_for(&mixed), RunnerKind::Plain);

        let plain = TestTarget {
            glob: "test/**/*.js".to_string(),
            js_only: true,
        };
        assert_eq!(
            command(false, true).runner_for(&plain),
            RunnerKind::Combined
        );
    }

    #[test]
    fn test_classification_decides_without_flags() {
        let plain = TestTarget {
            glob: "test/**/*.js".to_string(),
            js_only: true,
        };
        assert_eq!(command(false, false).runner_for(&plain), RunnerKind::Plain);
    }
}
