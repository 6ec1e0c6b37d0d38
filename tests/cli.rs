// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 tagflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// tagflow confined to `dir`, with no parameters leaking in from the environment
fn tagflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tagflow").unwrap();
    cmd.current_dir(dir.path());
    for var in [
        "REGISTRY_HOST",
        "IMAGE_NAME",
        "DOCKERFILE",
        "BUILD_CONTEXT",
        "REGISTRY_AUTH",
        "REGISTRY_CREDENTIALS_ID",
        "BUILD_NUMBER",
        "TAGFLOW_CREDENTIALS_FILE",
        "SOURCE_REPOSITORY",
        "SOURCE_REVISION",
        "CONTAINER_ENGINE",
    ] {
        cmd.env_remove(var);
    }
    // keep git from finding a repository above the temp dir
    if let Some(parent) = dir.path().parent() {
        cmd.env("GIT_CEILING_DIRECTORIES", parent);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    tagflow(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("tags"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn init_writes_config_once() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir).arg("init").assert().success();
    assert!(dir.path().join(".tagflow.yaml").exists());

    tagflow(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    tagflow(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn tags_without_git_use_nogit() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir)
        .args([
            "tags",
            "--build-number",
            "42",
            "--registry-host",
            "reg:5000",
            "--image-name",
            "svc",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("#42 nogit"))
        .stdout(predicate::str::contains("reg:5000/svc:latest"))
        .stdout(predicate::str::contains("reg:5000/svc:42"))
        .stdout(predicate::str::contains("reg:5000/svc:nogit"));
}

#[test]
fn tags_reads_parameters_from_environment() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir)
        .env("REGISTRY_HOST", "env-reg:5000")
        .env("IMAGE_NAME", "from-env")
        .env("BUILD_NUMBER", "7")
        .arg("tags")
        .assert()
        .success()
        .stdout(predicate::str::contains("env-reg:5000/from-env:7"));
}

#[test]
fn tags_rejects_invalid_registry_host() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir)
        .args(["tags", "--registry-host", "http://reg:5000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("host[:port]"));
}

#[test]
fn validate_reports_bad_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(".tagflow.yaml"),
        "registry_auth: true\nregistry_credentials_id: \"\"\n",
    )
    .unwrap();

    tagflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("no credentials id"));
}

#[test]
fn validate_rejects_unknown_keys() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".tagflow.yaml"), "registy_host: typo\n").unwrap();

    tagflow(&dir).arg("validate").assert().failure();
}

#[test]
fn missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir)
        .args(["run", "--config", "nope.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn history_starts_empty() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No recorded runs"));

    tagflow(&dir)
        .args(["history", "show", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("build number 3"));
}

#[test]
fn dry_run_executes_nothing() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir)
        .args(["run", "--dry-run", "--build-number", "5", "--engine", "tagflow-no-such-engine"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("Push Image"));

    assert!(!dir.path().join(".tagflow").join("run.lock").exists());
}

#[test]
fn failing_engine_surfaces_exit_code() {
    let dir = TempDir::new().unwrap();
    let engine = dir.path().join("fake-engine.sh");
    std::fs::write(&engine, "#!/bin/sh\nexit 3\n").unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        tagflow(&dir)
            .args(["run", "--build-number", "1", "--engine"])
            .arg(&engine)
            .assert()
            .code(3);

        // the failed run is recorded and the lock released
        assert!(dir.path().join(".tagflow/history/1.json").exists());
        assert!(!dir.path().join(".tagflow/run.lock").exists());
    }
}

#[test]
fn validate_reads_parameters_from_environment() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir)
        .env("REGISTRY_AUTH", "true")
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("no credentials id"));

    tagflow(&dir)
        .env("CONTAINER_ENGINE", "tagflow-no-such-engine")
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("'tagflow-no-such-engine' not found"));
}

#[test]
fn history_list_creates_nothing() {
    let dir = TempDir::new().unwrap();

    tagflow(&dir).args(["history", "list"]).assert().success();
    tagflow(&dir).args(["history", "clear", "--yes"]).assert().success();

    assert!(!dir.path().join(".tagflow").exists());
}

#[test]
fn history_follows_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ci.yaml"), "history:\n  directory: runs\n").unwrap();
    let engine = dir.path().join("fake-engine.sh");
    std::fs::write(&engine, "#!/bin/sh\nexit 3\n").unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        tagflow(&dir)
            .args(["run", "--config", "ci.yaml", "--build-number", "9", "--engine"])
            .arg(&engine)
            .assert()
            .code(3);
        assert!(dir.path().join("runs/9.json").exists());

        tagflow(&dir)
            .args(["history", "show", "9", "--config", "ci.yaml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("#9"));

        tagflow(&dir)
            .args(["history", "show", "9"])
            .assert()
            .failure();
    }
}

/// Run git with a fixed identity, failing the test on error
fn git(dir: &std::path::Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .current_dir(dir)
        .args(["-c", "user.name=tagflow", "-c", "user.email=tagflow@example.com"])
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn checkout_populates_initialized_workspace() {
    let source = TempDir::new().unwrap();
    git(source.path(), &["init", "--quiet"]);
    std::fs::write(source.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    std::fs::write(source.path().join("app.txt"), "hello\n").unwrap();
    git(source.path(), &["add", "."]);
    git(source.path(), &["commit", "--quiet", "-m", "initial"]);
    let commit = git(source.path(), &["rev-parse", "--short", "HEAD"]);

    // a workspace set up the usual way is never empty
    let dir = TempDir::new().unwrap();
    tagflow(&dir).arg("init").assert().success();

    tagflow(&dir)
        .args([
            "run",
            "--build-number",
            "1",
            "--engine",
            "true",
            "--registry-host",
            "127.0.0.1:9",
            "--repository",
        ])
        .arg(source.path())
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("app.txt")).unwrap(),
        "hello\n"
    );
    assert!(dir.path().join(".tagflow.yaml").exists());

    let record = std::fs::read_to_string(dir.path().join(".tagflow/history/1.json")).unwrap();
    assert!(record.contains(&commit));
}
