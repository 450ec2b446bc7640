//! Command-line behaviour of the controller binary.

use std::path::PathBuf;
use std::process::{Command, Output};

/// Writes `content` to a per-test file in the temp directory.
fn write_temp(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("appgw-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Runs the binary without an ARM token in the environment.
fn run_without_token(args: &[&str]) -> (Output, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_appgw-ingress-controller"))
        .args([
            "--subscription-id",
            "sub",
            "--resource-group",
            "rg",
            "--gateway-name",
            "gw",
            "--log-json",
        ])
        .args(args)
        .env_remove("AZURE_ACCESS_TOKEN")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output, text)
}

#[test]
fn test_dry_run_needs_no_token() {
    let desired = write_temp("dry-run-desired.json", r#"{"name":"gw","location":"westeurope"}"#);

    let (output, text) = run_without_token(&[
        "--gateway-config",
        desired.to_str().unwrap(),
        "--dry-run",
    ]);

    assert!(output.status.success(), "binary failed: {}", text);
    assert!(text.contains("configuration changed; dry run"), "output: {}", text);
}

#[test]
fn test_unchanged_configuration_needs_no_token() {
    let desired = write_temp(
        "unchanged-desired.json",
        r#"{"name":"gw","etag":"W/\"2\"","location":"westeurope"}"#,
    );
    let baseline = write_temp(
        "unchanged-baseline.json",
        r#"{"name":"gw","etag":"W/\"1\"","location":"westeurope"}"#,
    );

    let (output, text) = run_without_token(&[
        "--gateway-config",
        desired.to_str().unwrap(),
        "--baseline",
        baseline.to_str().unwrap(),
    ]);

    assert!(output.status.success(), "binary failed: {}", text);
    assert!(text.contains("configuration unchanged"), "output: {}", text);
}

#[test]
fn test_deployment_requires_token() {
    let desired = write_temp("deploy-desired.json", r#"{"name":"gw"}"#);

    let (output, text) = run_without_token(&["--gateway-config", desired.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(text.contains("missing ARM bearer token"), "output: {}", text);
}
