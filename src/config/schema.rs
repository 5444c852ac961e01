//! Configuration schema definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Build environment, selected per command and overridable via `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEnv {
    Development,
    Production,
}

impl BuildEnv {
    /// Read the environment from `NODE_ENV`, falling back to `default` when
    /// the variable is unset or carries an unrecognized value.
    pub fn detect(default: BuildEnv) -> Self {
        match std::env::var("NODE_ENV") {
            Ok(raw) => Self::parse(&raw).unwrap_or(default),
            Err(_) => default,
        }
    }

    /// Parse a `NODE_ENV`-style value. Accepts the short and long spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dev" | "development" => Some(Self::Development),
            "prod" | "production" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Stable identifiers for the plugin descriptors carried in a build config.
///
/// Plugins are matched by these ids everywhere (SSR filtering, engine flag
/// translation), never by the name of whatever implements them downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginId {
    /// Inline a `process.env.*` definition into the bundle
    DefineEnv,
    /// Emit imported CSS as a sibling stylesheet instead of inlining it
    CssExtract,
    /// Minify emitted bundles
    Minify,
    /// Write the asset manifest mapping logical names to emitted files
    AssetManifest,
    /// Empty the output directory before building
    CleanOutput,
    /// Marks the server-side-rendering bundle target
    SsrServer,
}

impl PluginId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefineEnv => "define-env",
            Self::CssExtract => "css-extract",
            Self::Minify => "minify",
            Self::AssetManifest => "asset-manifest",
            Self::CleanOutput => "clean-output",
            Self::SsrServer => "ssr-server",
        }
    }
}

/// Project-level settings file (`prefab.config.json`).
///
/// Everything is optional; an absent file behaves like an empty object.
/// Unknown fields are tolerated so projects can annotate freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Output directory override, relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSettings>,

    /// Entry mapping: bundle name to an ordered list of relative paths.
    /// When present and non-empty it replaces the default entries entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<BTreeMap<String, Vec<String>>>,

    /// Emit a second, server-targeted bundle alongside the client bundle
    #[serde(default)]
    pub ssr: bool,
}

impl ProjectSettings {
    /// The entry mapping, only when it is present *and* non-empty.
    /// A `{"entry": {}}` settings file deliberately does not replace entries.
    pub fn declared_entries(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.entry.as_ref().filter(|entries| !entries.is_empty())
    }

    /// The output path override, when declared.
    pub fn declared_output_path(&self) -> Option<&str> {
        self.output.as_ref().and_then(|output| output.path.as_deref())
    }
}

/// Output settings within [`ProjectSettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse() {
        assert_eq!(BuildEnv::parse("dev"), Some(BuildEnv::Development));
        assert_eq!(BuildEnv::parse("development"), Some(BuildEnv::Development));
        assert_eq!(BuildEnv::parse("prod"), Some(BuildEnv::Production));
        assert_eq!(BuildEnv::parse("production"), Some(BuildEnv::Production));
        assert_eq!(BuildEnv::parse("staging"), None);
    }

    #[test]
    fn test_plugin_id_serializes_kebab_case() {
        let json = serde_json::to_value(PluginId::AssetManifest).unwrap();
        assert_eq!(json, serde_json::json!("asset-manifest"));
        let back: PluginId = serde_json::from_value(json).unwrap();
        assert_eq!(back, PluginId::AssetManifest);
        assert_eq!(PluginId::CleanOutput.as_str(), "clean-output");
    }

    #[test]
    fn test_settings_minimal() {
        let settings: ProjectSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.output.is_none());
        assert!(settings.entry.is_none());
        assert!(!settings.ssr);
    }

    #[test]
    fn test_settings_full() {
        let raw = r#"{
            "output": { "path": "./build" },
            "entry": { "app": ["src/a.js", "src/b.css"] },
            "ssr": true,
            "comment": "unknown fields pass through"
        }"#;
        let settings: ProjectSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.declared_output_path(), Some("./build"));
        assert_eq!(
            settings.declared_entries().unwrap()["app"],
            vec!["src/a.js".to_string(), "src/b.css".to_string()]
        );
        assert!(settings.ssr);
    }

    #[test]
    fn test_empty_entry_map_is_not_declared() {
        let settings: ProjectSettings = serde_json::from_str(r#"{"entry": {}}"#).unwrap();
        assert!(settings.entry.is_some());
        assert!(settings.declared_entries().is_none());
    }
}
