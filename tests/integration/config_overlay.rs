//! Integration tests for persisted configuration discovery and overlay

use clio::config::candidate_paths;
use clio::{ConfigError, ConfigOverlay, Identification, ProcessContext};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Thing {
    stuff: String,
    sizes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AppSettings {
    name: String,
    retries: i64,
    ratio: f64,
    thing: Thing,
}

fn defaults() -> AppSettings {
    AppSettings {
        name: "name!".into(),
        retries: 3,
        ratio: 0.5,
        thing: Thing {
            stuff: "stuff!".into(),
            sizes: vec!["s".into()],
        },
    }
}

fn app() -> Identification {
    Identification::new("app", "1.0.0")
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

#[test]
fn test_environment_overrides_nested_field() {
    let ctx = ProcessContext::default().with_var("APP_THING_STUFF", "ruff-ruff!");
    let mut settings = defaults();
    ConfigOverlay::new(&app(), &ctx).apply(&mut settings).unwrap();

    assert_eq!(settings.thing.stuff, "ruff-ruff!");
    assert_eq!(settings.name, "name!");
    assert_eq!(settings.retries, 3);
    assert_eq!(settings.thing.sizes, vec!["s".to_string()]);
}

#[test]
fn test_missing_document_equals_env_only_merge() {
    let temp = TempDir::new().unwrap();
    let ctx = ProcessContext::new(temp.path())
        .with_var("HOME", temp.path().to_string_lossy())
        .with_var("APP_RETRIES", "7");

    let searched = ConfigOverlay::load(&app(), &ctx, None, true).unwrap();
    assert!(searched.document_path().is_none());

    let mut from_search = defaults();
    searched.apply(&mut from_search).unwrap();
    let mut env_only = defaults();
    ConfigOverlay::new(&app(), &ctx).apply(&mut env_only).unwrap();

    assert_eq!(from_search, env_only);
    assert_eq!(from_search.retries, 7);
}

#[test]
fn test_document_discovered_in_working_directory() {
    let temp = TempDir::new().unwrap();
    write(
        &temp.path().join(".app.yaml"),
        "name: from-yaml\nthing:\n  stuff: yaml stuff\n",
    );
    let ctx = ProcessContext::new(temp.path());

    let overlay = ConfigOverlay::load(&app(), &ctx, None, true).unwrap();
    assert_eq!(overlay.document_path(), Some(temp.path().join(".app.yaml").as_path()));

    let mut settings = defaults();
    overlay.apply(&mut settings).unwrap();
    assert_eq!(settings.name, "from-yaml");
    assert_eq!(settings.thing.stuff, "yaml stuff");
    assert_eq!(settings.ratio, 0.5);
}

#[test]
fn test_document_discovered_in_xdg_config_home() {
    let temp = TempDir::new().unwrap();
    let cwd = temp.path().join("work");
    let xdg = temp.path().join("xdg");
    std::fs::create_dir_all(&cwd).unwrap();
    write(&xdg.join("app").join("config.json"), r#"{"retries": 9}"#);

    let ctx = ProcessContext::new(&cwd).with_var("XDG_CONFIG_HOME", xdg.to_string_lossy());
    let overlay = ConfigOverlay::load(&app(), &ctx, None, true).unwrap();

    let mut settings = defaults();
    overlay.apply(&mut settings).unwrap();
    assert_eq!(settings.retries, 9);
}

#[test]
fn test_search_disabled_ignores_documents() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join(".app.toml"), "name = \"from-toml\"\n");
    let ctx = ProcessContext::new(temp.path());

    let overlay = ConfigOverlay::load(&app(), &ctx, None, false).unwrap();
    assert!(overlay.document_path().is_none());
}

#[test]
fn test_environment_beats_document_for_every_type() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("custom.toml");
    write(
        &path,
        r#"
name = "file"
retries = 1
ratio = 0.25

[thing]
stuff = "file stuff"
sizes = ["m"]
"#,
    );
    let ctx = ProcessContext::new(temp.path())
        .with_var("APP_NAME", "env")
        .with_var("APP_RETRIES", "42")
        .with_var("APP_RATIO", "1.5")
        .with_var("APP_THING_SIZES", "l,xl");

    let overlay = ConfigOverlay::load(&app(), &ctx, Some(Path::new("custom.toml")), true).unwrap();
    let mut settings = defaults();
    overlay.apply(&mut settings).unwrap();

    assert_eq!(
        settings,
        AppSettings {
            name: "env".into(),
            retries: 42,
            ratio: 1.5,
            thing: Thing {
                stuff: "file stuff".into(),
                sizes: vec!["l".into(), "xl".into()],
            },
        }
    );
}

#[test]
fn test_malformed_document_fails_to_load() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join(".app.json"), "{ not json");
    let ctx = ProcessContext::new(temp.path());

    let err = ConfigOverlay::load(&app(), &ctx, None, true).unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }));
}

#[test]
fn test_type_mismatch_in_document_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.yaml");
    write(&path, "retries: lots\n");
    let ctx = ProcessContext::new(temp.path());

    let overlay = ConfigOverlay::load(&app(), &ctx, Some(&path), true).unwrap();
    let mut settings = defaults();
    assert!(overlay.apply(&mut settings).is_err());
    assert_eq!(settings, defaults());
}

#[test]
fn test_candidate_paths_follow_search_order() {
    let ctx = ProcessContext::new("/work")
        .with_var("XDG_CONFIG_HOME", "/xdg")
        .with_var("HOME", "/home/user");
    let candidates = candidate_paths("app", &ctx);

    assert_eq!(candidates.first().map(|p| p.as_path()), Some(Path::new("/work/.app.toml")));
    assert!(candidates.contains(&Path::new("/xdg/app/config.yaml").to_path_buf()));
    assert_eq!(
        candidates.last().map(|p| p.as_path()),
        Some(Path::new("/home/user/.config/app/config.json"))
    );
}
