//! Runner process invocation
//!
//! Builds the exact `npx` command lines for both runners, spawns them with
//! the test environment applied, and guards them with a node version
//! preflight. Runner exit codes propagate untouched.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use tokio::process::Command;
use tracing::debug;

use crate::error::TestError;
use crate::runner::RunnerKind;

/// Oldest node the runner toolchains are tested against.
pub const MINIMUM_NODE_VERSION: &str = "18.0.0";

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"v?(\d+\.\d+\.\d+)").unwrap());

/// Flags shared by both runner invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerOptions {
    pub watch: bool,
    pub cover: bool,
    pub report: bool,
}

/// A fully assembled runner command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl RunnerInvocation {
    pub fn for_runner(kind: RunnerKind, glob: &str, options: &RunnerOptions) -> Self {
        match kind {
            RunnerKind::Plain => Self::mocha(glob, options),
            RunnerKind::Combined => Self::jest(glob, options),
        }
    }

    /// mocha for plain script specs, wrapped in nyc when coverage is on.
    fn mocha(glob: &str, options: &RunnerOptions) -> Self {
        let mut args: Vec<String> = Vec::new();
        if options.cover {
            args.push("nyc".to_string());
            if options.report {
                args.push("--reporter=text".to_string());
                args.push("--reporter=json-summary".to_string());
            }
        }
        args.extend(
            ["mocha", "--colors", "--require", "@babel/register"]
                .map(str::to_string),
        );
        args.push(glob.to_string());
        if options.watch {
            args.push("--watch".to_string());
        }

        Self {
            program: "npx".to_string(),
            args,
            env: test_env(),
        }
    }

    /// jest for runs that may contain component specs.
    fn jest(glob: &str, options: &RunnerOptions) -> Self {
        let mut args = vec!["jest".to_string(), glob.to_string()];
        if options.watch {
            args.push("--watch".to_string());
        }
        if options.cover {
            args.push("--coverage".to_string());
            if options.report {
                args.push("--coverageReporters=text".to_string());
                args.push("--coverageReporters=json-summary".to_string());
            }
        }

        Self {
            program: "npx".to_string(),
            args,
            env: test_env(),
        }
    }
}

/// Environment applied on top of the inherited one. `BABEL_ENV` switches
/// the consuming project's transpile config into its test profile.
fn test_env() -> Vec<(String, String)> {
    vec![("BABEL_ENV".to_string(), "test".to_string())]
}

/// Spawn the runner in `root` and hand back its exit code.
pub async fn spawn_runner(invocation: &RunnerInvocation, root: &Path) -> Result<i32, TestError> {
    debug!(
        "runner invocation: {} {}",
        invocation.program,
        invocation.args.join(" ")
    );

    let status = Command::new(&invocation.program)
        .args(&invocation.args)
        .envs(invocation.env.iter().map(|(key, value)| (key, value)))
        .current_dir(root)
        .status()
        .await
        .map_err(|source| TestError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

    // Killed-by-signal has no code; report it as a plain failure
    Ok(status.code().unwrap_or(1))
}

/// Verify the ambient node satisfies [`MINIMUM_NODE_VERSION`].
pub async fn check_node_version(minimum: &str) -> Result<(), TestError> {
    let output = Command::new("node")
        .arg("--version")
        .output()
        .await
        .map_err(|source| TestError::Spawn {
            program: "node".to_string(),
            source,
        })?;

    let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let Some(found) = extract_version(&raw) else {
        return Err(TestError::NodeVersionUnreadable { output: raw });
    };

    if version_at_least(&found, minimum) {
        Ok(())
    } else {
        Err(TestError::NodeTooOld {
            found,
            minimum: minimum.to_string(),
        })
    }
}

/// Pull a dotted version out of `node --version` output.
fn extract_version(raw: &str) -> Option<String> {
    VERSION_PATTERN
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Compare two versions, tolerating a leading `v`. Unparseable input never
/// satisfies the check.
pub fn version_at_least(current: &str, minimum: &str) -> bool {
    let parse = |raw: &str| Version::parse(raw.trim().trim_start_matches('v')).ok();
    match (parse(current), parse(minimum)) {
        (Some(current), Some(minimum)) => current >= minimum,
        _ => false,
    }
}
