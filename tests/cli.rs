//! Drives the compiled binary.

use std::fs;
use std::process::Command;
use tempfile::TempDir;
use topic_zim::config::ExportConfig;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_topic-zim"))
}

#[test]
fn gen_config_prints_parseable_defaults() {
    let output = bin().arg("gen-config").output().unwrap();

    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    let parsed: ExportConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, ExportConfig::default());
}

#[test]
fn check_prints_fixture_tree() {
    let tmp = TempDir::new().unwrap();
    let output = bin()
        .current_dir(tmp.path())
        .args(["check", "--test"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Khan Academy\n"));
    assert!(stdout.contains("001 Basic addition [Video]"));
    assert!(stdout.contains("==> Topic tree is valid"));
}

#[test]
fn non_empty_destination_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("build");
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("leftover.html"), "x").unwrap();
    let fake_packager = tmp.path().join("zimwriterfs");
    fs::write(&fake_packager, "").unwrap();

    let output = bin()
        .current_dir(tmp.path())
        .arg("export")
        .arg(tmp.path().join("out.zim"))
        .arg("--test")
        .arg("--tmp-dir")
        .arg(&dest)
        .arg("--zimwriterfs")
        .arg(&fake_packager)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not empty"), "stderr: {stderr}");
    assert!(dest.join("leftover.html").exists());
}

#[test]
fn missing_packager_path_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let output = bin()
        .current_dir(tmp.path())
        .arg("export")
        .arg(tmp.path().join("out.zim"))
        .args(["--test", "--zimwriterfs", "/nonexistent/zimwriterfs"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid zimwriterfs path"));
}

#[test]
fn unknown_config_key_is_fatal() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("topic-zim.toml"), "langauge = \"es\"\n").unwrap();

    let output = bin().current_dir(tmp.path()).args(["check", "--test"]).output().unwrap();

    assert!(!output.status.success());
}
