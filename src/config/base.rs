//! Default build configuration
//!
//! The lowest-precedence layer of the merge: conventional entries, an output
//! directory namespaced by the consumer package name, and the plugin roster
//! for the selected environment. Everything here can be overridden by
//! `prefab.overrides.json` or `prefab.config.json`.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::{BuildConfig, BuildEnv, PluginId, MANIFEST_FILE};
use crate::utils;

/// Conventional client entry files, relative to the project root.
pub const DEFAULT_ENTRY_FILES: [&str; 2] = ["src/js/entry.js", "src/style/entry.css"];

/// Build the environment-parameterized base configuration.
pub fn base_config(env: BuildEnv, root: &Path, package_name: &str) -> BuildConfig {
    let output_path = utils::resolve(root, ["dist", package_name]);
    let entry_files: Vec<String> = DEFAULT_ENTRY_FILES
        .iter()
        .map(|file| utils::resolve(root, [file]).display().to_string())
        .collect();

    let filename = match env {
        BuildEnv::Production => "[name].bundle-[hash].js",
        BuildEnv::Development => "[name].bundle.js",
    };
    let devtool = match env {
        BuildEnv::Production => "source-map",
        BuildEnv::Development => "eval-source-map",
    };

    let value = json!({
        "name": "client",
        "mode": env.as_str(),
        "devtool": devtool,
        "entry": { "app": entry_files },
        "output": {
            "path": output_path.display().to_string(),
            "filename": filename,
            "publicPath": "/dist/",
        },
        "module": {
            "rules": [
                { "ext": ".png", "loader": "file" },
                { "ext": ".jpg", "loader": "file" },
                { "ext": ".svg", "loader": "dataurl" },
                { "ext": ".woff2", "loader": "file" },
            ],
        },
        "plugins": plugin_roster(env),
    });

    BuildConfig::from_value(value)
}

/// The plugin descriptors enabled for `env`, in application order.
fn plugin_roster(env: BuildEnv) -> Vec<Value> {
    let mut plugins = vec![
        json!({
            "id": PluginId::DefineEnv,
            "options": { "process.env.NODE_ENV": env.as_str() },
        }),
        json!({ "id": PluginId::CssExtract }),
    ];

    if env.is_production() {
        plugins.push(json!({ "id": PluginId::Minify }));
    }

    plugins.push(json!({
        "id": PluginId::AssetManifest,
        "options": { "fileName": MANIFEST_FILE },
    }));

    if env.is_production() {
        plugins.push(json!({ "id": PluginId::CleanOutput }));
    }

    plugins
}
