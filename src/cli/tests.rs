use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::cli::{describe_routes, serve, Cli, Commands};
use crate::registry::Registries;
use crate::router::RouteTable;

#[test]
fn test_serve_command_with_addr() {
    let cli = Cli::try_parse_from([
        "bundlerouter",
        "serve",
        "--app-dir",
        "myapp",
        "--addr",
        "127.0.0.1:8080",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve { app_dir, addr } => {
            assert_eq!(app_dir, PathBuf::from("myapp"));
            assert_eq!(addr, Some("127.0.0.1:8080".parse::<SocketAddr>().unwrap()));
        }
        other => panic!("Expected Serve command, got {other:?}"),
    }
}

#[test]
fn test_serve_rejects_bad_addr() {
    let result = Cli::try_parse_from(["bundlerouter", "serve", "--addr", "nowhere"]);
    assert!(result.is_err());
}

#[test]
fn test_routes_command() {
    let cli = Cli::try_parse_from(["bundlerouter", "routes", "--app-dir", "app"]).unwrap();
    assert!(matches!(cli.command, Commands::Routes { ref app_dir } if app_dir == &PathBuf::from("app")));
}

#[test]
fn test_describe_routes_lists_entries_and_warnings() {
    let section: serde_yaml::Value = serde_yaml::from_str(
        r#"
home:
  path: /
  method: get
  handler: Home.index
assets:
  path: /assets/*
  static: true
broken:
  method: get
"#,
    )
    .unwrap();
    let text = describe_routes(&RouteTable::build(&section));
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("GET"));
    assert!(lines[0].ends_with("Home.index"));
    assert!(lines[1].contains("/assets/*"));
    assert!(lines[1].ends_with("static"));
    assert_eq!(lines[2], "skipped: broken route does not have any path defined");
}

#[test]
fn test_serve_refuses_plugin_without_manifest() {
    let app = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(app.path().join("src/plugins/views")).unwrap();

    let err = serve(app.path(), Some("127.0.0.1:0".parse().unwrap()), Registries::new())
        .err()
        .expect("boot must fail");
    let message = format!("{err:#}");
    assert!(message.contains("Failed to install plugins"), "{message}");
    assert!(message.contains("views"), "{message}");
}
