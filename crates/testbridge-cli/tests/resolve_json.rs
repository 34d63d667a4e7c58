//! Integration tests for `testbridge resolve --json` output.

use std::path::Path;
use std::process::{Command, Output};

/// Variables the resolve command reads or writes; cleared so the parent
/// environment cannot leak into the child.
const CLEARED_ENV: &[&str] = &[
    "BASE_URL", "MODE", "PROD", "DEV", "SSR", "NODE_ENV", "CI", "API_URL",
];

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "testbridge-cli", "--bin", "testbridge", "--"]);
    for key in CLEARED_ENV {
        cmd.env_remove(key);
    }
    cmd
}

fn resolve(root: &Path, args: &[&str]) -> Output {
    cargo_bin()
        .arg("--cwd")
        .arg(root)
        .args(["--json", "resolve"])
        .args(args)
        .output()
        .expect("Failed to run resolve command")
}

fn parse(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "resolve failed: {stderr}");
    assert!(
        stdout.trim().starts_with('{'),
        "stdout should begin with '{{': {stdout}"
    );
    serde_json::from_str(&stdout).expect("stdout should be valid JSON")
}

const PROJECT_CONFIG: &str = r#"
import { defineConfig } from 'vitest/config'

export default defineConfig({
    mode: 'staging',
    base: '/app/',
    define: {
        __APP_VERSION__: '"1.2.3"',
        'import.meta.env.API_URL': '"http://localhost:3000"',
        'process.env.SHARED': 'process.env.OTHER',
    },
    test: {
        environment: 'jsdom',
        testTimeout: 2000,
    },
})
"#;

#[test]
fn test_resolve_run_closes_watcher() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vitest.config.ts"), PROJECT_CONFIG).unwrap();

    let json = parse(&resolve(dir.path(), &["--run"]));

    assert!(json["configFile"]
        .as_str()
        .unwrap()
        .ends_with("vitest.config.ts"));
    assert_eq!(json["config"]["watch"], false);
    assert_eq!(json["config"]["run"], true);
    assert_eq!(json["config"]["environment"], "jsdom");
    assert_eq!(json["config"]["testTimeout"], 2000);
    assert_eq!(json["config"]["hookTimeout"], 10000);
    assert_eq!(json["watcherClosed"], true);
    assert_eq!(json["events"], serde_json::json!([]));
}

#[test]
fn test_resolve_backfills_env_from_host() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vitest.config.ts"), PROJECT_CONFIG).unwrap();

    let json = parse(&resolve(dir.path(), &["--run"]));

    let env = &json["env"];
    assert_eq!(env["BASE_URL"], "/app/");
    assert_eq!(env["MODE"], "staging");
    assert_eq!(env["PROD"], "");
    assert_eq!(env["DEV"], "1");
    assert_eq!(env["SSR"], "1");
}

#[test]
fn test_resolve_moves_literal_defines_to_runtime() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vitest.config.ts"), PROJECT_CONFIG).unwrap();

    let json = parse(&resolve(dir.path(), &["--run"]));

    assert_eq!(json["globals"]["__APP_VERSION__"], "1.2.3");
    let define = json["host"]["define"].as_object().unwrap();
    assert!(!define.contains_key("__APP_VERSION__"));
    assert!(!define.contains_key("import.meta.env.API_URL"));
    assert_eq!(define["process.env.SHARED"], "process.env.OTHER");
    assert_eq!(define["import.meta.env"], "process.env");
}

#[test]
fn test_resolve_without_config_file() {
    let dir = tempfile::tempdir().unwrap();

    let json = parse(&resolve(dir.path(), &["--run"]));

    assert!(json["configFile"].is_null());
    assert_eq!(json["host"]["mode"], "test");
    assert_eq!(json["env"]["MODE"], "test");
    assert_eq!(json["env"]["BASE_URL"], "/");
    assert_eq!(
        json["plugins"],
        serde_json::json!(["vitest", "vitest:global-setup", "vitest:mocks"])
    );
}

#[test]
fn test_resolve_mode_flag_wins_over_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vitest.config.ts"), PROJECT_CONFIG).unwrap();

    let json = parse(&resolve(dir.path(), &["--run", "--mode", "production"]));

    assert_eq!(json["host"]["mode"], "production");
    assert_eq!(json["env"]["PROD"], "1");
    assert_eq!(json["env"]["DEV"], "");
}

#[test]
fn test_resolve_restarts_report_events() {
    let dir = tempfile::tempdir().unwrap();

    let json = parse(&resolve(dir.path(), &["--watch", "--restarts", "2"]));

    assert_eq!(json["config"]["watch"], true);
    assert_eq!(json["watcherClosed"], false);
    assert_eq!(
        json["events"],
        serde_json::json!(["onServerRestart", "onServerRestart"])
    );
}

#[test]
fn test_resolve_api_port() {
    let dir = tempfile::tempdir().unwrap();

    let json = parse(&resolve(dir.path(), &["--run", "--api", "4321"]));

    assert_eq!(json["config"]["api"]["port"], 4321);
}

#[test]
fn test_resolve_ui_requires_package() {
    let dir = tempfile::tempdir().unwrap();

    let output = resolve(dir.path(), &["--ui"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("@vitest/ui"), "stderr: {stderr}");
}

#[test]
fn test_resolve_ui_with_package_installed() {
    let dir = tempfile::tempdir().unwrap();
    let ui_dir = dir.path().join("node_modules").join("@vitest").join("ui");
    std::fs::create_dir_all(&ui_dir).unwrap();
    std::fs::write(
        ui_dir.join("package.json"),
        r#"{ "name": "@vitest/ui", "version": "1.6.0" }"#,
    )
    .unwrap();

    let json = parse(&resolve(
        dir.path(),
        &["--run", "--ui", "--open", "--ui-base", "/dash/"],
    ));

    assert_eq!(
        json["plugins"],
        serde_json::json!(["vitest", "vitest:global-setup", "vitest:ui", "vitest:mocks"])
    );
    assert_eq!(json["openTarget"], "/dash/");
}
