//! Error types shared across prefab
//!
//! Three small families: project configuration, test-target resolution,
//! and the external build engine. Build diagnostics reported by the engine
//! are ordinary data (see [`crate::compile::BuildReport`]), not errors;
//! only failures to *drive* the engine surface here.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating project configuration.
///
/// All of these are fatal and raised before any build attempt.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// package.json exists but carries no usable "name" field. The name
    /// namespaces the output directory, so nothing can be built without it.
    #[error("package.json at {} has no \"name\" field", path.display())]
    MissingPackageName { path: PathBuf },

    #[error("failed to read {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} must contain a JSON object at the top level", path.display())]
    NotAnObject { path: PathBuf },
}

/// Errors raised while resolving test targets or preparing a runner.
#[derive(Debug, Error)]
pub enum TestError {
    /// Neither `test/` nor `src/test/` exists and no target was given.
    /// The message is load-bearing: CI logs must name the requirement.
    #[error("Please specify a test directory.")]
    NoTestDirectory,

    #[error("invalid test target pattern \"{pattern}\"")]
    BadPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("node {found} is older than the minimum supported version {minimum}")]
    NodeTooOld { found: String, minimum: String },

    #[error("could not read a node version out of {output:?}")]
    NodeVersionUnreadable { output: String },
}

/// Errors raised while driving the external build engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start {program}; is it installed and on PATH?")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("build config is missing {field}")]
    InvalidConfig { field: &'static str },

    #[error("failed to prepare the output directory {}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the build engine produced an unreadable metafile")]
    Metafile {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to watch the output directory {}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
