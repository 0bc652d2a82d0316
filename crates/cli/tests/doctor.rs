mod common;

use assert_cmd::prelude::*;
use common::{Fixture, write_file};
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn doctor_reports_resolved_profile() {
    let fixture = Fixture::new("");
    fixture
        .cmd()
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK   cardx doctor"))
        .stdout(predicate::str::contains("profile: default"))
        .stdout(predicate::str::contains("realm_url: http://test/realm/"))
        .stdout(predicate::str::contains("index.backend: memory"))
        .stdout(predicate::str::contains("index.dispatch: in-process"));
}

#[test]
fn doctor_shows_sqlite_db_path() {
    let fixture = Fixture::new("[index]\nbackend = \"sqlite\"\ndispatch = \"queue\"\n");
    let expected = fixture.root().join(".cardindex/index.db");
    fixture
        .cmd()
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("index.db_path: {}", expected.display())))
        .stdout(predicate::str::contains("index.dispatch: queue"));
}

#[test]
fn doctor_uses_xdg_default_when_present() {
    let tmp = tempdir().unwrap();
    let cfg_dir = tmp.path().join("cardindex");
    fs::create_dir_all(&cfg_dir).unwrap();
    write_file(
        &cfg_dir.join("config.toml"),
        r#"
version = 1
[profiles.default]
realm_url = "http://localhost:4201/demo/"
realm_root = "/tmp/demo"
"#,
    );

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cardx"));
    cmd.env("XDG_CONFIG_HOME", tmp.path());
    cmd.arg("doctor");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("realm_url: http://localhost:4201/demo/"));
}

#[test]
fn doctor_fails_on_missing_config() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope.toml");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cardx"));
    cmd.arg("--config").arg(&missing).arg("doctor");
    cmd.assert().failure().stdout(predicate::str::contains("FAIL cardx doctor"));
}

#[test]
fn doctor_fails_on_realm_url_without_trailing_slash() {
    let tmp = tempdir().unwrap();
    let cfg = tmp.path().join("config.toml");
    write_file(
        &cfg,
        r#"
version = 1
[profiles.default]
realm_url = "http://test/realm"
realm_root = "/tmp/realm"
"#,
    );
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cardx"));
    cmd.arg("--config").arg(&cfg).arg("doctor");
    cmd.assert().failure().stdout(predicate::str::contains("FAIL cardx doctor"));
}
