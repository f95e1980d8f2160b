//! Loading application configuration from disk.

mod common;

use std::path::PathBuf;

use bundlerouter::config::{AppConfig, DEFAULT_PORT};
use common::app::TestApp;
use serde_yaml::Value;

#[test]
fn test_each_file_becomes_a_section() {
    let app = TestApp::with_config(&[
        ("http", "middlewares:\n  - Auth.check\n"),
        ("routes", "home:\n  path: /\n  handler: Home.index\n"),
    ]);
    app.write("config/notes.txt", "ignored");
    app.write("config/server.yaml", "http:\n  port: 9000\n");

    let config = AppConfig::load(app.path()).unwrap();
    let mut names = config.section_names();
    names.sort_unstable();
    assert_eq!(names, vec!["http", "routes", "server"]);
    assert_eq!(config.middlewares(), vec!["Auth.check".to_string()]);
    assert_eq!(config.server().port, 9000);
    assert_eq!(config.app_dir(), app.path());
}

#[test]
fn test_local_file_overrides_other_sections() {
    let app = TestApp::with_config(&[
        ("server", "http:\n  port: 1400\n  secure: true\nassets: public\n"),
        ("local", "server:\n  http:\n    port: 1500\n"),
    ]);

    let config = AppConfig::load(app.path()).unwrap();
    let server = config.server();
    assert_eq!(server.port, 1500);
    assert!(server.secure);
    assert_eq!(config.asset_root(), app.path().join("public"));
}

#[test]
fn test_missing_config_dir_is_empty() {
    let app = TestApp::with_config(&[]);
    let config = AppConfig::load(app.path()).unwrap();
    assert!(config.section_names().is_empty());
    assert_eq!(config.server().port, DEFAULT_PORT);
    assert_eq!(config.asset_root(), app.path().to_path_buf());
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let app = TestApp::with_config(&[("routes", "home: [unclosed\n")]);
    let err = AppConfig::load(app.path()).unwrap_err();
    assert!(format!("{err:#}").contains("routes.yml"));
}

#[test]
fn test_mime_types_and_plugins_dir() {
    let app = TestApp::with_config(&[("mimetypes", "md: text/markdown\n.WASM: application/wasm\n")]);
    let config = AppConfig::load(app.path()).unwrap();
    let mime = config.mime_types();
    assert_eq!(mime.len(), 2);
    assert_eq!(mime.lookup(&PathBuf::from("a.wasm")), "application/wasm");
    assert_eq!(config.plugins_dir(), app.path().join("src").join("plugins"));
}

#[test]
fn test_dotted_lookup() {
    let app = TestApp::with_config(&[("app", "name: demo\nlimits:\n  body: 1024\n")]);
    let config = AppConfig::load(app.path()).unwrap();
    assert_eq!(config.get("app.name").and_then(Value::as_str), Some("demo"));
    assert_eq!(config.get("app.limits.body").and_then(Value::as_u64), Some(1024));
    assert!(config.get("app.limits.headers").is_none());
    assert!(config.get("nothing").is_none());
}
