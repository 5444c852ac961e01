//! Development build command implementation

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::compile::{CompileMode, CompileOrchestrator, EsbuildEngine};
use crate::config::{BuildEnv, Project};
use crate::server::DevServer;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Build for development, with optional watch and local server
#[derive(Args, Debug)]
pub struct DevCommand {
    /// Build once and exit instead of serving
    #[arg(long)]
    pub no_dev_server: bool,

    /// Rebuild on change (implied by the dev server)
    #[arg(short, long)]
    pub watch: bool,

    /// Port to run the dev server on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind the dev server to
    #[arg(long)]
    pub host: Option<String>,

    /// Open the browser automatically
    #[arg(long)]
    pub open: bool,
}

impl DevCommand {
    pub async fn execute(&self) -> Result<ExitCode> {
        let env = BuildEnv::detect(BuildEnv::Development);

        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        let project = Project::discover(cwd)?;
        info!("building {} ({})", project.package_name, env.as_str());

        let configs = project.build_configs(env);
        let orchestrator = CompileOrchestrator::new(EsbuildEngine::new(), env);

        if self.no_dev_server {
            let mode = if self.watch {
                eprintln!("{} Watching {}...", "→".blue(), project.package_name.bold());
                CompileMode::Watch
            } else {
                eprintln!("{} Building {}...", "→".blue(), project.package_name.bold());
                CompileMode::Run
            };
            let outcome = orchestrator
                .run(&configs, mode)
                .await
                .context("Build did not run to completion")?;
            return Ok(ExitCode::from(outcome.exit_code));
        }

        let options = DevServerOptions::resolve(self, configs.first().and_then(|c| c.dev_server()));
        let output_dir = configs
            .first()
            .and_then(|c| c.output_path())
            .map(Into::into)
            .unwrap_or_else(|| project.root.join("dist").join(&project.package_name));

        eprintln!(
            "{} Starting dev server at {}\n",
            "→".blue(),
            format!("http://{}:{}", options.host, options.port)
                .cyan()
                .underline()
        );
        eprintln!("  {} Live reload {}", "•".dimmed(), "enabled".green());
        eprintln!("  {} Press {} to stop\n", "•".dimmed(), "Ctrl+C".yellow());

        // Keep the watch build running for as long as the server lives
        let watch_configs = configs.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(&watch_configs, CompileMode::Watch).await {
                error!("watch build failed: {:#}", e);
            }
        });

        let server = DevServer::new(
            project.root.clone(),
            output_dir,
            project.package_name.clone(),
            options,
        );
        server.start().await?;

        Ok(ExitCode::SUCCESS)
    }
}

/// Development server options
#[derive(Debug, Clone)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    pub open: bool,
}

impl DevServerOptions {
    /// Layer CLI flags over the merged config's `devServer` block, falling
    /// back to the stock host and port.
    fn resolve(cmd: &DevCommand, dev_server: Option<&Map<String, Value>>) -> Self {
        let host = cmd
            .host
            .clone()
            .or_else(|| {
                dev_server
                    .and_then(|block| block.get("host"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cmd
            .port
            .or_else(|| {
                dev_server
                    .and_then(|block| block.get("port"))
                    .and_then(Value::as_u64)
                    .and_then(|raw| {
                        let port = u16::try_from(raw).ok();
                        if port.is_none() {
                            warn!(
                                "devServer.port {} is out of range; using {}",
                                raw, DEFAULT_PORT
                            );
                        }
                        port
                    })
            })
            .unwrap_or(DEFAULT_PORT);

        let open = cmd.open
            || dev_server
                .and_then(|block| block.get("open"))
                .and_then(Value::as_bool)
                .unwrap_or(false);

        Self { host, port, open }
    }
}
