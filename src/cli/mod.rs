//! Command-line interface for prefab
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build` / `prod`: production build
//! - `dev`: development build, watch mode and local server
//! - `test`: run the package test suite
//! - `init`: project scaffolding

mod build;
mod dev;
mod init;
mod test;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::BuildCommand;
pub use dev::{DevCommand, DevServerOptions};
pub use init::InitCommand;
pub use test::TestCommand;

/// prefab - configuration-free build and test orchestration for frontend packages
#[derive(Parser, Debug)]
#[command(name = "prefab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable trace-level output
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the package for production
    Build(BuildCommand),

    /// Alias for build
    Prod(BuildCommand),

    /// Build for development, with optional watch and local server
    Dev(DevCommand),

    /// Run the package test suite
    Test(TestCommand),

    /// Scaffold a new package in the current directory
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command. A bare `prefab` builds for production.
    pub async fn execute(&self) -> Result<ExitCode> {
        print_banner();

        match &self.command {
            Some(Commands::Build(cmd)) | Some(Commands::Prod(cmd)) => cmd.execute().await,
            Some(Commands::Dev(cmd)) => cmd.execute().await,
            Some(Commands::Test(cmd)) => cmd.execute().await,
            Some(Commands::Init(cmd)) => cmd.execute().await,
            None => BuildCommand::default().execute().await,
        }
    }
}

/// Print the prefab banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "prefab".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
