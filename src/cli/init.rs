//! Package scaffolding command

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::SETTINGS_FILE;

/// Scaffold a new package in the current directory
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Package name / directory
    #[arg(default_value = ".")]
    pub name: String,

    /// Include a server-side rendering entry
    #[arg(long)]
    pub ssr: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<ExitCode> {
        let package_dir = Path::new(&self.name);
        let package_name = self.package_name()?;

        eprintln!(
            "{} Scaffolding {}...\n",
            "→".blue(),
            package_name.cyan()
        );

        if self.name != "." {
            fs::create_dir_all(package_dir).context("Failed to create package directory")?;
        }
        if package_dir.join("package.json").exists() {
            bail!("package.json already exists, refusing to overwrite");
        }

        self.write_file(package_dir, "package.json", &self.package_json(&package_name))?;
        self.write_file(package_dir, SETTINGS_FILE, &self.settings_json())?;
        self.write_file(package_dir, "src/js/entry.js", ENTRY_JS)?;
        self.write_file(package_dir, "src/style/entry.css", ENTRY_CSS)?;
        if self.ssr {
            self.write_file(package_dir, "src/js/entry-server.js", ENTRY_SERVER_JS)?;
        }
        self.write_file(package_dir, "index.html", &self.index_html(&package_name))?;
        self.write_file(package_dir, "test/example.spec.js", EXAMPLE_SPEC_JS)?;

        eprintln!("\n{} Package scaffolded\n", "✓".green().bold());

        eprintln!("  Next steps:");
        if self.name != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.name.cyan());
        }
        eprintln!("    {} npm install", "→".dimmed());
        eprintln!("    {} prefab dev", "→".dimmed());
        eprintln!();

        Ok(ExitCode::SUCCESS)
    }

    /// Scaffolding into `.` names the package after the directory.
    fn package_name(&self) -> Result<String> {
        if self.name != "." {
            return Ok(self.name.clone());
        }
        let cwd = std::env::current_dir().context("Failed to determine working directory")?;
        Ok(cwd
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("my-package")
            .to_string())
    }

    fn write_file(&self, dir: &Path, relative: &str, content: &str) -> Result<()> {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for {}", relative))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
        eprintln!("  {} Created {}", "✓".green(), relative.cyan());
        Ok(())
    }

    fn package_json(&self, package_name: &str) -> String {
        format!(
            r#"{{
  "name": "{}",
  "version": "0.1.0",
  "private": true,
  "scripts": {{
    "build": "prefab build",
    "dev": "prefab dev",
    "test": "prefab test"
  }}
}}
"#,
            package_name
        )
    }

    fn settings_json(&self) -> String {
        if self.ssr {
            r#"{
  "output": {
    "path": "./dist"
  },
  "ssr": true
}
"#
            .to_string()
        } else {
            r#"{
  "output": {
    "path": "./dist"
  }
}
"#
            .to_string()
        }
    }

    fn index_html(&self, package_name: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{}</title>
    <link rel="stylesheet" href="/dist/app.bundle.css" />
  </head>
  <body>
    <div id="app"></div>
    <script src="/dist/app.bundle.js"></script>
  </body>
</html>
"#,
            package_name
        )
    }
}

const ENTRY_JS: &str = r##"const app = document.querySelector("#app");

app.innerHTML = `
  <h1>prefab</h1>
  <p>Edit src/js/entry.js and save to reload.</p>
`;
"##;

const ENTRY_CSS: &str = r#"body {
  margin: 0;
  font-family: system-ui, sans-serif;
  display: flex;
  justify-content: center;
}

#app {
  max-width: 960px;
  padding: 2rem;
  text-align: center;
}
"#;

const ENTRY_SERVER_JS: &str = r#"export function render() {
  return '<div id="app">rendered on the server</div>';
}
"#;

const EXAMPLE_SPEC_JS: &str = r#"import { strict as assert } from "assert";

describe("example", () => {
  it("adds up", () => {
    assert.equal(1 + 1, 2);
  });
});
"#;
