//! prefab library
//!
//! Core functionality for the prefab build and test orchestrator.

pub mod cli;
pub mod compile;
pub mod config;
pub mod error;
pub mod runner;
pub mod server;
pub mod utils;

pub use cli::Cli;
pub use compile::{CompileMode, CompileOrchestrator, CompileOutcome};
pub use config::{BuildConfig, BuildEnv, Project};
