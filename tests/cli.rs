//! CLI surface tests
//!
//! Exercise the binary for the paths that do not need node or esbuild
//! installed: help output, scaffolding, and failures raised before any
//! child process is spawned.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn prefab() -> Command {
    Command::cargo_bin("prefab").unwrap()
}

#[test]
fn help_lists_every_subcommand() {
    prefab()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("build")
                .and(predicate::str::contains("dev"))
                .and(predicate::str::contains("test"))
                .and(predicate::str::contains("init")),
        );
}

#[test]
fn version_flag_reports_the_package_version() {
    prefab()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn init_scaffolds_a_runnable_package() {
    let dir = TempDir::new().unwrap();

    prefab()
        .current_dir(dir.path())
        .args(["init", "widgets"])
        .assert()
        .success();

    let root = dir.path().join("widgets");
    assert!(root.join("package.json").exists());
    assert!(root.join("prefab.config.json").exists());
    assert!(root.join("src/js/entry.js").exists());
    assert!(root.join("src/style/entry.css").exists());
    assert!(root.join("test/example.spec.js").exists());
    assert!(root.join("index.html").exists());

    let package = std::fs::read_to_string(root.join("package.json")).unwrap();
    assert!(package.contains(r#""name": "widgets""#));

    // The starter entry must come through whole, mount selector included.
    let entry = std::fs::read_to_string(root.join("src/js/entry.js")).unwrap();
    assert!(entry.contains(r##"querySelector("#app")"##));
    assert!(entry.contains("save to reload"));
}

#[test]
fn init_with_ssr_adds_the_server_entry() {
    let dir = TempDir::new().unwrap();

    prefab()
        .current_dir(dir.path())
        .args(["init", "widgets", "--ssr"])
        .assert()
        .success();

    let root = dir.path().join("widgets");
    assert!(root.join("src/js/entry-server.js").exists());
    let settings = std::fs::read_to_string(root.join("prefab.config.json")).unwrap();
    assert!(settings.contains(r#""ssr": true"#));
}

#[test]
fn init_refuses_to_clobber_an_existing_package() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("package.json"), "{}").unwrap();

    prefab()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn test_without_a_directory_names_the_requirement() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("package.json"), r#"{"name": "widgets"}"#).unwrap();

    prefab()
        .current_dir(dir.path())
        .arg("test")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please specify a test directory."));
}

#[test]
fn build_outside_a_package_fails_with_context() {
    let dir = TempDir::new().unwrap();

    prefab()
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("package.json"));
}
