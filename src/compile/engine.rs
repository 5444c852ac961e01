//! External build engine adapter
//!
//! Translates merged build configs into esbuild invocations, launched
//! through `npx` so the consuming project's own toolchain resolution
//! applies. Diagnostics come back as data in a [`BuildReport`]; only
//! failures to drive the engine itself are errors.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::{BuildConfig, PluginId, MANIFEST_FILE};
use crate::error::EngineError;

/// One diagnostic reported by the engine.
#[derive(Debug, Clone)]
pub struct BuildDiagnostic {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u64>,
    pub column: Option<u64>,
}

impl BuildDiagnostic {
    fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    /// `file:line:column` when the diagnostic carries a location.
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => Some(format!("{}:{}:{}", file, line, column)),
            (Some(line), None) => Some(format!("{}:{}", file, line)),
            _ => Some(file.to_string()),
        }
    }
}

/// One file emitted by a build.
#[derive(Debug, Clone)]
pub struct EmittedAsset {
    pub path: PathBuf,
    pub size: u64,
}

/// Aggregated result of one engine invocation across all configs.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub errors: Vec<BuildDiagnostic>,
    pub warnings: Vec<BuildDiagnostic>,
    pub assets: Vec<EmittedAsset>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// The bundler behind the orchestrator.
#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// One-shot build of every config, in order.
    async fn run(&self, configs: &[BuildConfig]) -> Result<BuildReport, EngineError>;

    /// Build, then keep rebuilding on change. Returns only when the
    /// underlying watcher exits; callers that need to keep going spawn it.
    async fn watch(&self, configs: &[BuildConfig]) -> Result<BuildReport, EngineError>;
}

/// esbuild driven as a child process.
#[derive(Debug, Clone)]
pub struct EsbuildEngine {
    launcher: String,
}

impl Default for EsbuildEngine {
    fn default() -> Self {
        Self {
            launcher: "npx".to_string(),
        }
    }
}

impl EsbuildEngine {
    pub fn new() -> Self {
        Self::default()
    }

    async fn build_one(&self, config: &BuildConfig, report: &mut BuildReport) -> Result<(), EngineError> {
        let plan = InvocationPlan::for_config(config, false)?;
        plan.prepare()?;

        debug!(
            target_name = config.name().unwrap_or("unnamed"),
            "engine invocation: {} {}",
            self.launcher,
            plan.args.join(" ")
        );

        let output = Command::new(&self.launcher)
            .args(&plan.args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: format!("{} esbuild", self.launcher),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        trace!("engine stderr: {}", stderr);
        let mut parsed = parse_diagnostics(&stderr);

        if !output.status.success() && parsed.errors.is_empty() {
            // The engine failed without a structured diagnostic; surface
            // whatever it printed so the failure is not silent.
            let message = if parsed.raw.is_empty() {
                format!("build engine exited with {}", output.status)
            } else {
                parsed.raw.join("\n")
            };
            parsed.errors.push(BuildDiagnostic::from_message(message));
        }

        if parsed.errors.is_empty() {
            plan.finish(report)?;
        }
        report.errors.append(&mut parsed.errors);
        report.warnings.append(&mut parsed.warnings);
        Ok(())
    }
}

#[async_trait]
impl BuildEngine for EsbuildEngine {
    async fn run(&self, configs: &[BuildConfig]) -> Result<BuildReport, EngineError> {
        let start = Instant::now();
        let mut report = BuildReport::default();

        for config in configs {
            self.build_one(config, &mut report).await?;
        }

        report.duration = start.elapsed();
        Ok(report)
    }

    async fn watch(&self, configs: &[BuildConfig]) -> Result<BuildReport, EngineError> {
        let start = Instant::now();
        let mut children = Vec::new();

        for config in configs {
            let plan = InvocationPlan::for_config(config, true)?;
            plan.prepare()?;

            // Inherit stdio so rebuild logs stream straight to the terminal
            let child = Command::new(&self.launcher)
                .args(&plan.args)
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| EngineError::Spawn {
                    program: format!("{} esbuild", self.launcher),
                    source,
                })?;
            children.push((config.name().unwrap_or("unnamed").to_string(), child));

            if plan.manifest_file.is_some() {
                refresh_manifest_on_rebuild(plan)?;
            }
        }

        let mut report = BuildReport::default();
        for (name, mut child) in children {
            let status = child.wait().await.map_err(|source| EngineError::Spawn {
                program: format!("{} esbuild", self.launcher),
                source,
            })?;
            if !status.success() {
                report
                    .errors
                    .push(BuildDiagnostic::from_message(format!(
                        "watcher for the {} target exited with {}",
                        name, status
                    )));
            }
        }

        report.duration = start.elapsed();
        Ok(report)
    }
}

/// Rewrite the asset manifest each time a watch rebuild lands a fresh
/// metafile. The watcher thread runs for the life of the process, like the
/// engine children it follows.
fn refresh_manifest_on_rebuild(plan: InvocationPlan) -> Result<(), EngineError> {
    let watch_err = |source: notify::Error| EngineError::Watch {
        path: plan.output_dir.clone(),
        source,
    };

    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = new_debouncer(Duration::from_millis(250), tx).map_err(watch_err)?;
    debouncer
        .watcher()
        .watch(&plan.output_dir, RecursiveMode::NonRecursive)
        .map_err(watch_err)?;

    // The debouncer is moved into the thread to keep it alive
    std::thread::spawn(move || {
        let _debouncer = debouncer;
        let metafile_name = plan.metafile.file_name().map(|name| name.to_os_string());

        loop {
            match rx.recv() {
                Ok(Ok(events)) => {
                    let metafile_changed = events.iter().any(|event| {
                        event.path.file_name().map(|name| name.to_os_string()) == metafile_name
                    });
                    if metafile_changed {
                        let mut scratch = BuildReport::default();
                        if let Err(e) = plan.finish(&mut scratch) {
                            debug!("manifest refresh failed: {}", e);
                        }
                    }
                }
                Ok(Err(e)) => {
                    debug!("metafile watch error: {:?}", e);
                }
                Err(_) => break,
            }
        }
    });

    Ok(())
}

/// Everything needed to run esbuild for one config: the argument list plus
/// the filesystem work bracketing the invocation.
struct InvocationPlan {
    args: Vec<String>,
    output_dir: PathBuf,
    metafile: PathBuf,
    stubs: Vec<(PathBuf, String)>,
    clean_first: bool,
    manifest_file: Option<String>,
}

impl InvocationPlan {
    fn for_config(config: &BuildConfig, watch: bool) -> Result<Self, EngineError> {
        let output_dir = PathBuf::from(
            config
                .output_path()
                .ok_or(EngineError::InvalidConfig { field: "output.path" })?,
        );
        let stub_dir = output_dir.join(".entries");
        let metafile = output_dir.join(".metafile.json");

        let mut stubs = Vec::new();
        let mut args = vec!["esbuild".to_string()];

        for (name, paths) in entry_specs(config)? {
            if let [single] = paths.as_slice() {
                args.push(format!("{}={}", name, single));
            } else {
                // esbuild takes one file per named entry; fan multi-file
                // entries out through a generated stub module
                let stub_path = stub_dir.join(format!("{}.js", name));
                stubs.push((stub_path.clone(), stub_module(&paths)));
                args.push(format!("{}={}", name, stub_path.display()));
            }
        }

        args.push("--bundle".to_string());
        args.push(format!("--outdir={}", output_dir.display()));
        args.push(format!("--metafile={}", metafile.display()));

        if let Some(filename) = config.get("output.filename").and_then(Value::as_str) {
            let template = filename.strip_suffix(".js").unwrap_or(filename);
            args.push(format!("--entry-names={}", template));
        }
        if let Some(public_path) = config.get("output.publicPath").and_then(Value::as_str) {
            args.push(format!("--public-path={}", public_path));
        }

        match config.get("devtool").and_then(Value::as_str) {
            Some("eval-source-map") | Some("inline-source-map") => {
                args.push("--sourcemap=inline".to_string());
            }
            Some("hidden-source-map") => args.push("--sourcemap=external".to_string()),
            Some(_) => args.push("--sourcemap".to_string()),
            None => {}
        }

        if config.is_node_target() {
            args.push("--platform=node".to_string());
            if config.get("output.libraryTarget").and_then(Value::as_str) == Some("commonjs2") {
                args.push("--format=cjs".to_string());
            }
        } else {
            args.push("--platform=browser".to_string());
            args.push("--format=iife".to_string());
        }

        if let Some(externals) = config.get("externals").and_then(Value::as_array) {
            for external in externals.iter().filter_map(Value::as_str) {
                args.push(format!("--external:{}", external));
            }
        }

        if let Some(defines) = config
            .plugin_options(PluginId::DefineEnv)
            .and_then(Value::as_object)
        {
            for (key, value) in defines {
                if let Ok(encoded) = serde_json::to_string(value) {
                    args.push(format!("--define:{}={}", key, encoded));
                }
            }
        }

        if config.has_plugin(PluginId::Minify) {
            args.push("--minify".to_string());
        }

        if let Some(rules) = config.get("module.rules").and_then(Value::as_array) {
            for rule in rules {
                let ext = rule.get("ext").and_then(Value::as_str);
                let loader = rule.get("loader").and_then(Value::as_str);
                if let (Some(ext), Some(loader)) = (ext, loader) {
                    args.push(format!("--loader:{}={}", ext, loader));
                }
            }
        }

        if watch {
            args.push("--watch=forever".to_string());
        } else {
            args.push("--log-format=json".to_string());
        }

        let manifest_file = config.has_plugin(PluginId::AssetManifest).then(|| {
            config
                .plugin_options(PluginId::AssetManifest)
                .and_then(|options| options.get("fileName"))
                .and_then(Value::as_str)
                .unwrap_or(MANIFEST_FILE)
                .to_string()
        });

        Ok(Self {
            args,
            output_dir,
            metafile,
            stubs,
            clean_first: config.has_plugin(PluginId::CleanOutput),
            manifest_file,
        })
    }

    /// Clean, recreate, and stub out the output directory before the engine
    /// touches it.
    fn prepare(&self) -> Result<(), EngineError> {
        let dir_err = |source: io::Error| EngineError::OutputDir {
            path: self.output_dir.clone(),
            source,
        };

        if self.clean_first {
            match fs::remove_dir_all(&self.output_dir) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(dir_err(err)),
            }
        }
        fs::create_dir_all(&self.output_dir).map_err(dir_err)?;

        for (path, contents) in &self.stubs {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(dir_err)?;
            }
            fs::write(path, contents).map_err(dir_err)?;
        }
        Ok(())
    }

    /// Collect emitted assets from the metafile and write the manifest.
    fn finish(&self, report: &mut BuildReport) -> Result<(), EngineError> {
        let raw = match fs::read_to_string(&self.metafile) {
            Ok(raw) => raw,
            // No metafile, no asset summary; not worth failing the build over
            Err(_) => return Ok(()),
        };
        let meta: MetaFile =
            serde_json::from_str(&raw).map_err(|source| EngineError::Metafile { source })?;

        for (path, output) in &meta.outputs {
            report.assets.push(EmittedAsset {
                path: PathBuf::from(path),
                size: output.bytes,
            });
        }

        if let Some(manifest_file) = &self.manifest_file {
            let manifest = manifest_entries(&meta.outputs);
            let path = self.output_dir.join(manifest_file);
            let encoded = serde_json::to_string_pretty(&manifest)
                .map_err(|source| EngineError::Metafile { source })?;
            fs::write(&path, encoded).map_err(|source| EngineError::OutputDir {
                path: self.output_dir.clone(),
                source,
            })?;
            debug!("wrote asset manifest to {}", path.display());
        }
        Ok(())
    }
}

/// Entry names with their ordered path lists. Accepts both the list shape
/// this tool produces and a bare-string shape from manual overrides.
fn entry_specs(config: &BuildConfig) -> Result<Vec<(String, Vec<String>)>, EngineError> {
    let entry = config
        .entry()
        .ok_or(EngineError::InvalidConfig { field: "entry" })?;

    let mut specs = Vec::new();
    for (name, value) in entry {
        let paths: Vec<String> = match value {
            Value::String(single) => vec![single.clone()],
            Value::Array(list) => list
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        if paths.is_empty() {
            return Err(EngineError::InvalidConfig { field: "entry" });
        }
        specs.push((name.clone(), paths));
    }
    Ok(specs)
}

/// Source of a generated multi-file entry module.
fn stub_module(paths: &[String]) -> String {
    let mut source = String::from("// generated by prefab\n");
    for path in paths {
        source.push_str(&format!("import {:?};\n", path));
    }
    source
}

/// Derive the manifest mapping from the engine's metafile outputs.
///
/// Logical names come from the emitted basename up to the `.bundle` marker,
/// so `app.bundle-4ffa91.js` maps from `app.js`. Entries' CSS siblings get
/// a `.css` mapping of their own.
fn manifest_entries(outputs: &BTreeMap<String, MetaOutput>) -> BTreeMap<String, String> {
    let mut manifest = BTreeMap::new();
    for (path, output) in outputs {
        if output.entry_point.is_none() {
            continue;
        }
        let Some(emitted) = basename(path) else { continue };
        let Some(logical) = logical_name(&emitted) else { continue };
        manifest.insert(format!("{}.js", logical), emitted.clone());

        if let Some(css_path) = &output.css_bundle {
            if let Some(css_emitted) = basename(css_path) {
                manifest.insert(format!("{}.css", logical), css_emitted);
            }
        }
    }
    manifest
}

fn basename(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn logical_name(emitted: &str) -> Option<String> {
    emitted.split(".bundle").next().map(str::to_string)
}

/// Structured diagnostics parsed out of the engine's stderr, with any
/// non-JSON lines kept raw.
struct ParsedDiagnostics {
    errors: Vec<BuildDiagnostic>,
    warnings: Vec<BuildDiagnostic>,
    raw: Vec<String>,
}

fn parse_diagnostics(stderr: &str) -> ParsedDiagnostics {
    let mut parsed = ParsedDiagnostics {
        errors: Vec::new(),
        warnings: Vec::new(),
        raw: Vec::new(),
    };

    for line in stderr.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<EngineLogLine>(line) {
            Ok(log) => {
                let diagnostic = BuildDiagnostic {
                    message: log.text,
                    file: log.location.as_ref().and_then(|l| l.file.clone()),
                    line: log.location.as_ref().and_then(|l| l.line),
                    column: log.location.as_ref().and_then(|l| l.column),
                };
                match log.kind.as_str() {
                    "error" => parsed.errors.push(diagnostic),
                    "warning" => parsed.warnings.push(diagnostic),
                    _ => {}
                }
            }
            Err(_) => parsed.raw.push(line.to_string()),
        }
    }
    parsed
}

#[derive(Debug, Deserialize)]
struct EngineLogLine {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    location: Option<EngineLogLocation>,
}

#[derive(Debug, Deserialize)]
struct EngineLogLocation {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<u64>,
    #[serde(default)]
    column: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MetaFile {
    #[serde(default)]
    outputs: BTreeMap<String, MetaOutput>,
}

#[derive(Debug, Deserialize)]
struct MetaOutput {
    #[serde(default)]
    bytes: u64,
    #[serde(rename = "entryPoint")]
    entry_point: Option<String>,
    #[serde(rename = "cssBundle")]
    css_bundle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::base::base_config;
    use crate::config::BuildEnv;
    use pretty_assertions::assert_eq;

    fn args_for(config: &BuildConfig) -> Vec<String> {
        InvocationPlan::for_config(config, false).unwrap().args
    }

    #[test]
    fn test_args_for_production_client() {
        let config = base_config(BuildEnv::Production, Path::new("/proj"), "pkg");
        let args = args_for(&config);

        // Two default entry files fan out through a stub
        assert!(args.contains(&"app=/proj/dist/pkg/.entries/app.js".to_string()));
        assert!(args.contains(&"--bundle".to_string()));
        assert!(args.contains(&"--outdir=/proj/dist/pkg".to_string()));
        assert!(args.contains(&"--entry-names=[name].bundle-[hash]".to_string()));
        assert!(args.contains(&"--public-path=/dist/".to_string()));
        assert!(args.contains(&"--minify".to_string()));
        assert!(args.contains(&"--sourcemap".to_string()));
        assert!(args.contains(&"--platform=browser".to_string()));
        assert!(args.contains(&"--format=iife".to_string()));
        assert!(args
            .contains(&"--define:process.env.NODE_ENV=\"production\"".to_string()));
        assert!(args.contains(&"--loader:.png=file".to_string()));
        assert!(args.contains(&"--log-format=json".to_string()));
    }

    #[test]
    fn test_args_for_development_skip_production_flags() {
        let config = base_config(BuildEnv::Development, Path::new("/proj"), "pkg");
        let args = args_for(&config);

        assert!(!args.contains(&"--minify".to_string()));
        assert!(args.contains(&"--entry-names=[name].bundle".to_string()));
        assert!(args.contains(&"--sourcemap=inline".to_string()));
    }

    #[test]
    fn test_args_for_node_target() {
        let mut config = base_config(BuildEnv::Production, Path::new("/proj"), "pkg");
        config.set("target", serde_json::json!("node"));
        config.set("output.libraryTarget", serde_json::json!("commonjs2"));
        config.set("externals", serde_json::json!(["./node_modules/*"]));
        let args = args_for(&config);

        assert!(args.contains(&"--platform=node".to_string()));
        assert!(args.contains(&"--format=cjs".to_string()));
        assert!(args.contains(&"--external:./node_modules/*".to_string()));
        assert!(!args.contains(&"--format=iife".to_string()));
    }

    #[test]
    fn test_single_file_entries_skip_the_stub() {
        let mut config = base_config(BuildEnv::Development, Path::new("/proj"), "pkg");
        config.set("entry", serde_json::json!({ "app": ["/proj/src/only.js"] }));
        let plan = InvocationPlan::for_config(&config, false).unwrap();

        assert!(plan.args.contains(&"app=/proj/src/only.js".to_string()));
        assert!(plan.stubs.is_empty());
    }

    #[test]
    fn test_watch_flag_replaces_json_logging() {
        let config = base_config(BuildEnv::Development, Path::new("/proj"), "pkg");
        let plan = InvocationPlan::for_config(&config, true).unwrap();
        assert!(plan.args.contains(&"--watch=forever".to_string()));
        assert!(!plan.args.contains(&"--log-format=json".to_string()));
    }

    #[test]
    fn test_stub_module_imports_in_order() {
        let source = stub_module(&[
            "/proj/src/js/entry.js".to_string(),
            "/proj/src/style/entry.css".to_string(),
        ]);
        let expected = "// generated by prefab\n\
                        import \"/proj/src/js/entry.js\";\n\
                        import \"/proj/src/style/entry.css\";\n";
        assert_eq!(source, expected);
    }

    #[test]
    fn test_parse_diagnostics_splits_kinds() {
        let stderr = concat!(
            "{\"kind\":\"error\",\"text\":\"Could not resolve \\\"./missing\\\"\",",
            "\"location\":{\"file\":\"src/js/entry.js\",\"line\":3,\"column\":8}}\n",
            "{\"kind\":\"warning\",\"text\":\"Duplicate key\",\"location\":null}\n",
            "npm WARN something unrelated\n",
        );
        let parsed = parse_diagnostics(stderr);

        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].message, "Could not resolve \"./missing\"");
        assert_eq!(
            parsed.errors[0].location().as_deref(),
            Some("src/js/entry.js:3:8")
        );
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.raw, vec!["npm WARN something unrelated".to_string()]);
    }

    #[test]
    fn test_watch_plan_writes_the_manifest_from_the_metafile() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(BuildEnv::Development, dir.path(), "pkg");
        let plan = InvocationPlan::for_config(&config, true).unwrap();
        assert_eq!(plan.manifest_file.as_deref(), Some(MANIFEST_FILE));

        fs::create_dir_all(&plan.output_dir).unwrap();
        let meta = serde_json::json!({
            "outputs": {
                "dist/pkg/app.bundle.js": {
                    "bytes": 64,
                    "entryPoint": "dist/pkg/.entries/app.js"
                }
            }
        });
        fs::write(&plan.metafile, meta.to_string()).unwrap();

        let mut report = BuildReport::default();
        plan.finish(&mut report).unwrap();

        let manifest =
            fs::read_to_string(plan.output_dir.join(MANIFEST_FILE)).unwrap();
        assert!(manifest.contains(r#""app.js": "app.bundle.js""#));
        assert_eq!(report.assets.len(), 1);
    }

    #[test]
    fn test_manifest_entries_map_logical_names() {
        let raw = serde_json::json!({
            "outputs": {
                "dist/pkg/app.bundle-4FFA91AB.js": {
                    "bytes": 2048,
                    "entryPoint": "dist/pkg/.entries/app.js",
                    "cssBundle": "dist/pkg/app.bundle-77C0E2.css"
                },
                "dist/pkg/app.bundle-77C0E2.css": { "bytes": 512 },
                "dist/pkg/chunk-XYZ.js": { "bytes": 128 }
            }
        });
        let meta: MetaFile = serde_json::from_value(raw).unwrap();
        let manifest = manifest_entries(&meta.outputs);

        let expected: BTreeMap<String, String> = [
            ("app.js".to_string(), "app.bundle-4FFA91AB.js".to_string()),
            ("app.css".to_string(), "app.bundle-77C0E2.css".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(manifest, expected);
    }
}
