//! Project configuration for prefab
//!
//! Reads the optional `prefab.config.json` settings file and the optional
//! `prefab.overrides.json` fragment, layers them over the environment's base
//! config, and hands the result around as [`BuildConfig`] values. The merge
//! itself lives in [`merge`], the SSR augmentation in [`ssr`].

pub mod base;
pub mod merge;
mod schema;
pub mod ssr;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConfigError;

pub use schema::{BuildEnv, OutputSettings, PluginId, ProjectSettings};

/// Settings file read from the project root.
pub const SETTINGS_FILE: &str = "prefab.config.json";

/// Override fragment read from the project root.
pub const OVERRIDES_FILE: &str = "prefab.overrides.json";

/// Asset manifest written into the output directory.
pub const MANIFEST_FILE: &str = "prefab-manifest.json";

/// A merged build configuration.
///
/// Wraps a JSON object so fields this tool never interprets still travel
/// through the merge untouched; the typed accessors cover the fields the
/// orchestration itself needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildConfig(Value);

impl BuildConfig {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a value by dotted key path, e.g. `"output.path"`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        let mut current = &self.0;
        for key in dotted.split('.') {
            current = current.as_object()?.get(key)?;
        }
        Some(current)
    }

    /// Set a value at a dotted key path, creating intermediate objects and
    /// overwriting non-object values on the way.
    pub fn set(&mut self, dotted: &str, value: Value) {
        fn set_inner(target: &mut Map<String, Value>, keys: &[&str], value: Value) {
            match keys {
                [] => {}
                [last] => {
                    target.insert((*last).to_string(), value);
                }
                [head, rest @ ..] => {
                    let slot = target
                        .entry((*head).to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    if let Some(map) = slot.as_object_mut() {
                        set_inner(map, rest, value);
                    }
                }
            }
        }

        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }
        let keys: Vec<&str> = dotted.split('.').collect();
        if let Some(map) = self.0.as_object_mut() {
            set_inner(map, &keys, value);
        }
    }

    /// Target name, `"client"` or `"server"` for configs built here.
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn entry(&self) -> Option<&Map<String, Value>> {
        self.get("entry").and_then(Value::as_object)
    }

    pub fn output_path(&self) -> Option<&str> {
        self.get("output.path").and_then(Value::as_str)
    }

    /// Plugin descriptor list; empty when the config carries none.
    pub fn plugins(&self) -> &[Value] {
        self.get("plugins")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_plugin(&self, id: PluginId) -> bool {
        self.plugin_descriptor(id).is_some()
    }

    /// The `options` object of a plugin descriptor, when present.
    pub fn plugin_options(&self, id: PluginId) -> Option<&Value> {
        self.plugin_descriptor(id)?.get("options")
    }

    fn plugin_descriptor(&self, id: PluginId) -> Option<&Value> {
        self.plugins().iter().find(|descriptor| {
            descriptor.get("id").and_then(Value::as_str) == Some(id.as_str())
        })
    }

    /// Dev-server overrides carried in the merged config, if any.
    pub fn dev_server(&self) -> Option<&Map<String, Value>> {
        self.get("devServer").and_then(Value::as_object)
    }

    pub fn is_node_target(&self) -> bool {
        self.get("target").and_then(Value::as_str) == Some("node")
    }
}

/// Read `package.json`'s `name`; every build is namespaced by it, so a
/// missing or empty name is fatal.
pub fn package_name(root: &Path) -> Result<String, ConfigError> {
    let path = root.join("package.json");
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
        path: path.clone(),
        source,
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: path.clone(),
        source,
    })?;
    value
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingPackageName { path })
}

/// Load the settings file, `None` when absent.
pub fn load_settings(root: &Path) -> Result<Option<ProjectSettings>, ConfigError> {
    let path = root.join(SETTINGS_FILE);
    let Some(raw) = read_optional(&path)? else {
        return Ok(None);
    };
    let settings =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed { path, source })?;
    Ok(Some(settings))
}

/// Load the overrides fragment, `None` when absent.
pub fn load_overrides(root: &Path) -> Result<Option<Map<String, Value>>, ConfigError> {
    let path = root.join(OVERRIDES_FILE);
    let Some(raw) = read_optional(&path)? else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
        path: path.clone(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err(ConfigError::NotAnObject { path }),
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A discovered project: root, package identity, and its config sources.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub package_name: String,
    pub settings: Option<ProjectSettings>,
    pub overrides: Option<Map<String, Value>>,
}

impl Project {
    /// Read the project's configuration sources from `root` once.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let package_name = package_name(&root)?;
        let settings = load_settings(&root)?;
        let overrides = load_overrides(&root)?;

        debug!(
            package = %package_name,
            settings = settings.is_some(),
            overrides = overrides.is_some(),
            "discovered project at {}",
            root.display()
        );

        Ok(Self {
            root,
            package_name,
            settings,
            overrides,
        })
    }

    /// Whether the settings file asks for a server bundle.
    pub fn ssr_requested(&self) -> bool {
        self.settings.as_ref().map(|s| s.ssr).unwrap_or(false)
    }

    /// Produce the ordered build-config list for `env`.
    ///
    /// Layers base, overrides, and settings, then appends the server target
    /// when SSR applies. SSR is force-disabled outside production builds,
    /// whatever the settings file says.
    pub fn build_configs(&self, env: BuildEnv) -> Vec<BuildConfig> {
        let base = base::base_config(env, &self.root, &self.package_name);
        let merged = merge::merge_project_config(
            self.settings.as_ref(),
            self.overrides.as_ref(),
            &base,
            &self.root,
            &self.package_name,
        );

        let enable_ssr = self.ssr_requested() && env.is_production();
        ssr::augment(enable_ssr, vec![merged], &ssr::server_fragment(&self.root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn write(root: &Path, file: &str, contents: &str) {
        fs::write(root.join(file), contents).unwrap();
    }

    #[test]
    fn test_get_and_set_dotted_paths() {
        let mut config = BuildConfig::from_value(json!({ "output": { "path": "a" } }));
        assert_eq!(config.get("output.path"), Some(&json!("a")));
        assert_eq!(config.get("output.missing"), None);

        config.set("output.path", json!("b"));
        config.set("deep.nested.key", json!(1));
        assert_eq!(config.output_path(), Some("b"));
        assert_eq!(config.get("deep.nested.key"), Some(&json!(1)));
    }

    #[test]
    fn test_plugin_accessors() {
        let config = BuildConfig::from_value(json!({
            "plugins": [
                { "id": "define-env", "options": { "process.env.NODE_ENV": "production" } },
                { "id": "minify" },
            ],
        }));
        assert!(config.has_plugin(PluginId::Minify));
        assert!(!config.has_plugin(PluginId::CleanOutput));
        assert_eq!(
            config.plugin_options(PluginId::DefineEnv),
            Some(&json!({ "process.env.NODE_ENV": "production" }))
        );
        assert_eq!(config.plugin_options(PluginId::Minify), None);
    }

    #[test]
    fn test_package_name_requires_a_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package.json", r#"{ "version": "1.0.0" }"#);
        let err = package_name(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPackageName { .. }));

        write(dir.path(), "package.json", r#"{ "name": "widget" }"#);
        assert_eq!(package_name(dir.path()).unwrap(), "widget");
    }

    #[test]
    fn test_missing_optional_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_settings(dir.path()).unwrap().is_none());
        assert!(load_overrides(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_settings_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SETTINGS_FILE, "{ not json");
        let err = load_settings(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_overrides_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), OVERRIDES_FILE, "[1, 2]");
        let err = load_overrides(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotAnObject { .. }));
    }

    #[test]
    fn test_build_configs_gate_ssr_by_environment() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package.json", r#"{ "name": "widget" }"#);
        write(dir.path(), SETTINGS_FILE, r#"{ "ssr": true }"#);

        let project = Project::discover(dir.path()).unwrap();
        assert!(project.ssr_requested());

        let prod = project.build_configs(BuildEnv::Production);
        assert_eq!(prod.len(), 2);
        assert_eq!(prod[0].name(), Some("client"));
        assert_eq!(prod[1].name(), Some("server"));

        let dev = project.build_configs(BuildEnv::Development);
        assert_eq!(dev.len(), 1, "ssr must stay off in development");
    }
}
