//! Deterministic configuration layering
//!
//! Precedence, lowest to highest: base config, `prefab.overrides.json`,
//! `prefab.config.json`. Objects merge key by key; arrays are replaced
//! wholesale, never concatenated, unless a [`MergeRules`] entry says
//! otherwise for a specific dotted path. Inputs are never mutated; every
//! merge produces a fresh value.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::config::{BuildConfig, ProjectSettings};
use crate::utils;

/// How values at one dotted path combine during a deep merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Objects merge recursively; arrays and scalars are replaced
    Deep,
    /// The overlay value wins wholesale, whatever its shape
    Replace,
    /// Arrays concatenate, base elements first; other shapes are replaced
    Append,
}

/// Per-path merge policies, consulted by dotted key path (`"output.path"`).
/// Paths without an entry use [`MergePolicy::Deep`].
#[derive(Debug, Clone, Default)]
pub struct MergeRules {
    rules: Vec<(String, MergePolicy)>,
}

impl MergeRules {
    pub fn with(mut self, path: &str, policy: MergePolicy) -> Self {
        self.rules.push((path.to_string(), policy));
        self
    }

    fn policy_for(&self, path: &str) -> MergePolicy {
        self.rules
            .iter()
            .find(|(rule_path, _)| rule_path == path)
            .map(|(_, policy)| *policy)
            .unwrap_or(MergePolicy::Deep)
    }
}

/// Deep-merge `overlay` over `base` with default rules (arrays replace).
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    deep_merge_with(base, overlay, &MergeRules::default())
}

/// Deep-merge `overlay` over `base`, consulting `rules` at each dotted path.
pub fn deep_merge_with(base: &Value, overlay: &Value, rules: &MergeRules) -> Value {
    merge_at("", base, overlay, rules)
}

fn merge_at(path: &str, base: &Value, overlay: &Value, rules: &MergeRules) -> Value {
    match rules.policy_for(path) {
        MergePolicy::Replace => overlay.clone(),
        MergePolicy::Append => match (base, overlay) {
            (Value::Array(head), Value::Array(tail)) => {
                Value::Array(head.iter().chain(tail).cloned().collect())
            }
            _ => overlay.clone(),
        },
        MergePolicy::Deep => match (base, overlay) {
            (Value::Object(base_map), Value::Object(overlay_map)) => {
                let mut merged = base_map.clone();
                for (key, overlay_value) in overlay_map {
                    let child_path = join_path(path, key);
                    let value = match base_map.get(key) {
                        Some(base_value) => {
                            merge_at(&child_path, base_value, overlay_value, rules)
                        }
                        None => overlay_value.clone(),
                    };
                    merged.insert(key.clone(), value);
                }
                Value::Object(merged)
            }
            _ => overlay.clone(),
        },
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Layer a project's configuration sources into one build config.
///
/// Step 1 merges `overrides` over `base`. Step 2 applies the settings file's
/// `output.path`, resolved as `<root>/<path>/<package_name>`; without one the
/// step-1 output path is kept verbatim. Step 3 replaces the entry mapping
/// with the settings file's entries, each path resolved against `root`.
/// Absent settings skip steps 2 and 3 entirely.
pub fn merge_project_config(
    settings: Option<&ProjectSettings>,
    overrides: Option<&Map<String, Value>>,
    base: &BuildConfig,
    root: &Path,
    package_name: &str,
) -> BuildConfig {
    let mut merged = match overrides {
        Some(fragment) => {
            if fragment
                .get("output")
                .and_then(|output| output.get("path"))
                .is_some()
            {
                warn!(
                    "prefab.overrides.json declares output.path; \
                     prefab.config.json wins when it declares one too"
                );
            }
            let overlay = Value::Object(fragment.clone());
            BuildConfig::from_value(deep_merge(base.as_value(), &overlay))
        }
        None => base.clone(),
    };

    let Some(settings) = settings else {
        // No settings file: the layered result passes through as-is,
        // output path included.
        return merged;
    };

    if let Some(output_path) = settings.declared_output_path() {
        let resolved = utils::resolve(root, [output_path, package_name]);
        merged.set("output.path", Value::String(resolved.display().to_string()));
    }

    if let Some(entries) = settings.declared_entries() {
        merged.set("entry", Value::Object(qualify_entries(entries, root)));
    }

    merged
}

/// Resolve every entry path against the project root, preserving both the
/// per-entry path order and the entry names.
fn qualify_entries(entries: &BTreeMap<String, Vec<String>>, root: &Path) -> Map<String, Value> {
    entries
        .iter()
        .map(|(name, paths)| {
            let qualified: Vec<Value> = paths
                .iter()
                .map(|path| Value::String(utils::resolve(root, [path]).display().to_string()))
                .collect();
            (name.clone(), Value::Array(qualified))
        })
        .collect()
}
