//! Server-side-rendering augmentation
//!
//! When SSR is on, the build list grows a second, node-targeted config
//! derived from the client config: deny-listed plugins are stripped from a
//! copy, then the server fragment is merged over it with entries replaced
//! and plugins appended. The client config itself is never touched.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::merge::{deep_merge_with, MergePolicy, MergeRules};
use crate::config::{BuildConfig, PluginId};
use crate::utils;

/// Plugins that make no sense in a server bundle: the manifest would
/// clobber the client's, and a second clean would delete the client output.
pub const SSR_PLUGIN_DENYLIST: &[PluginId] = &[PluginId::AssetManifest, PluginId::CleanOutput];

/// Conventional server entry file, relative to the project root.
pub const SERVER_ENTRY_FILE: &str = "src/js/entry-server.js";

/// Append the server-target config when `enable_ssr` is set.
///
/// `configs[0]` is the client config; the result is `[client, server]`.
/// With `enable_ssr` false the list passes through untouched.
pub fn augment(
    enable_ssr: bool,
    mut configs: Vec<BuildConfig>,
    server_fragment: &Value,
) -> Vec<BuildConfig> {
    if !enable_ssr {
        return configs;
    }
    let Some(client) = configs.first() else {
        return configs;
    };

    let filtered = strip_denied_plugins(client);
    let rules = MergeRules::default()
        .with("entry", MergePolicy::Replace)
        .with("plugins", MergePolicy::Append);
    let server = BuildConfig::from_value(deep_merge_with(
        filtered.as_value(),
        server_fragment,
        &rules,
    ));

    configs.push(server);
    configs
}

/// The fragment merged over the filtered client config to form the server
/// target. Dependencies stay external; the bundle is a commonjs module run
/// by node, not served to a browser.
pub fn server_fragment(root: &Path) -> Value {
    let entry = utils::resolve(root, [SERVER_ENTRY_FILE]).display().to_string();
    json!({
        "name": "server",
        "target": "node",
        "devtool": "source-map",
        "entry": { "server": [entry] },
        "output": {
            "filename": "[name].bundle.js",
            "libraryTarget": "commonjs2",
        },
        "externals": ["./node_modules/*"],
        "plugins": [ { "id": PluginId::SsrServer } ],
    })
}

/// Copy `config` minus the deny-listed plugin descriptors.
fn strip_denied_plugins(config: &BuildConfig) -> BuildConfig {
    let mut copy = config.clone();
    let kept: Vec<Value> = config
        .plugins()
        .iter()
        .filter(|descriptor| {
            descriptor_id(descriptor)
                .map(|id| !SSR_PLUGIN_DENYLIST.iter().any(|denied| denied.as_str() == id))
                .unwrap_or(true)
        })
        .cloned()
        .collect();
    copy.set("plugins", Value::Array(kept));
    copy
}

fn descriptor_id(descriptor: &Value) -> Option<&str> {
    descriptor.get("id").and_then(Value::as_str)
}
