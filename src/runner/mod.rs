//! Test-target resolution and runner dispatch
//!
//! Figures out what to test and which runner to use. Targets expand
//! against the project root; the matched set classifies as JS-only when
//! every file is a `.spec.` script, in which case the plain mocha runner
//! suffices. Anything else goes to the combined jest runner, which also
//! understands component specs.

mod invocation;

use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::TestError;

pub use invocation::{
    check_node_version, spawn_runner, version_at_least, RunnerInvocation, RunnerOptions,
    MINIMUM_NODE_VERSION,
};

/// Filename infix marking a plain script spec (`foo.spec.js`).
pub const SPEC_MARKER: &str = ".spec.";

/// Conventional test directories, probed in priority order.
const DEFAULT_TEST_DIRS: [&str; 2] = ["test", "src/test"];

/// A resolved test run: the glob handed to the runner plus its
/// classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    pub glob: String,
    pub js_only: bool,
}

/// Which runner a test run dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    /// Plain script specs only: mocha
    Plain,
    /// Component specs may be present: jest
    Combined,
}

impl RunnerKind {
    pub fn for_target(target: &TestTarget) -> Self {
        if target.js_only {
            Self::Plain
        } else {
            Self::Combined
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Self::Plain => "mocha",
            Self::Combined => "jest",
        }
    }
}

/// Resolve the raw CLI target (or the default test directory) into a
/// classified [`TestTarget`].
pub fn resolve_target(raw: Option<&str>, root: &Path) -> Result<TestTarget, TestError> {
    let glob = match raw {
        Some(target) => target.to_string(),
        None => default_test_glob(root)?,
    };
    let js_only = classify(&glob, root)?;
    debug!(glob = %glob, js_only, "resolved test target");
    Ok(TestTarget { glob, js_only })
}

/// Probe for a conventional test directory and return its glob.
/// Fails when neither candidate exists; the caller gave no target, so
/// there is nothing to fall back to.
pub fn default_test_glob(root: &Path) -> Result<String, TestError> {
    for dir in DEFAULT_TEST_DIRS {
        if root.join(dir).is_dir() {
            return Ok(format!("{}/**/*.js", dir));
        }
    }
    Err(TestError::NoTestDirectory)
}

/// Classify a target as JS-only.
///
/// A wildcard-free target naming a `.js` file is judged by its own name: a
/// `.spec.` file is a plain script spec, anything else counts as mixed so
/// the broader runner applies. Directory and glob targets expand against
/// `root` and are JS-only iff every matched filename carries the marker;
/// an empty match set is JS-only vacuously.
pub fn classify(target: &str, root: &Path) -> Result<bool, TestError> {
    if target.contains(".js") && !target.contains('*') {
        return Ok(is_spec_file(Path::new(target)));
    }

    let files = expand(target, root)?;
    Ok(files.iter().all(|file| is_spec_file(file)))
}

fn is_spec_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().contains(SPEC_MARKER))
        .unwrap_or(false)
}

/// Expand a directory or glob target into concrete files under `root`.
/// Wildcard-free targets are treated as directories and get `**/*.js`
/// appended. A target whose base directory does not exist matches nothing.
fn expand(target: &str, root: &Path) -> Result<Vec<PathBuf>, TestError> {
    // "./test" and "test" name the same directory; candidates are matched
    // root-relative, without the prefix
    let target = strip_current_dir(target);

    let pattern = if target.contains('*') {
        target.to_string()
    } else if target.is_empty() {
        "**/*.js".to_string()
    } else {
        format!("{}/**/*.js", target.trim_end_matches('/'))
    };

    // literal_separator keeps a single `*` inside one path component, the
    // way the runner globs treat it; `**` still spans directories
    let matcher = GlobBuilder::new(&pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| TestError::BadPattern {
            pattern: pattern.clone(),
            source,
        })?
        .compile_matcher();

    // Walk only the pattern's literal prefix; scanning the whole project
    // root would crawl node_modules for every test run
    let base = root.join(literal_prefix(&pattern));
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&base).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if matcher.is_match(relative) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Drop leading `./` segments, mapping a bare `.` to the empty target.
fn strip_current_dir(target: &str) -> &str {
    let mut rest = target;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    if rest == "." {
        ""
    } else {
        rest
    }
}

/// The leading pattern components free of glob metacharacters.
fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in Path::new(pattern).components() {
        let text = component.as_os_str().to_string_lossy();
        if text
            .chars()
            .any(|c| matches!(c, '*' | '?' | '[' | '{'))
        {
            break;
        }
        prefix.push(component);
    }
    prefix
}
