use std::path::PathBuf;

use assert_cmd::Command;

fn config_dir(name: &str, base: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("thebook-cli-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("base.toml"), base).unwrap();
    dir
}

fn thebook(dir: &PathBuf, env: &str) -> Command {
    let mut cmd = Command::cargo_bin("thebook").unwrap();
    cmd.env("THEBOOK_CONFIG_DIR", dir)
        .env("THEBOOK_ENV", env)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn check_config_prints_resolved_settings() {
    let dir = config_dir(
        "ok",
        "[pagination]\npage_size = 4\n[books]\nedit_policy = \"creator_only\"\n",
    );

    let output = thebook(&dir, "staging")
        .arg("check-config")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("environment: Staging"));
    assert!(stdout.contains("page_size: 4"));
    assert!(stdout.contains("book_edit_policy: CreatorOnly"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn environment_variables_override_files() {
    let dir = config_dir("env", "[pagination]\npage_size = 4\n");

    let output = thebook(&dir, "local")
        .env("THEBOOK_PAGINATION__PAGE_SIZE", "7")
        .arg("check-config")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("page_size: 7"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unknown_environment_fails() {
    let dir = config_dir("bad-env", "");
    thebook(&dir, "moon").arg("check-config").assert().failure();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn zero_page_size_is_rejected() {
    let dir = config_dir("zero", "[pagination]\npage_size = 0\n");
    thebook(&dir, "local").arg("check-config").assert().failure();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn subcommand_is_required() {
    Command::cargo_bin("thebook").unwrap().assert().failure();
}
