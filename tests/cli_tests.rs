//! Binary-level argument handling checks.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_the_release_flow() {
    Command::cargo_bin("relpilot")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--release-version"))
        .stdout(predicate::str::contains("--instance"));
}

#[test]
fn extension_flag_requires_an_instance_root() {
    Command::cargo_bin("relpilot")
        .unwrap()
        .args(["--extension", "ext-foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--instance"));
}

#[test]
fn non_semver_release_version_is_rejected() {
    Command::cargo_bin("relpilot")
        .unwrap()
        .args(["--release-version", "1.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--release-version"));
}

#[test]
fn quiet_and_verbose_conflict() {
    Command::cargo_bin("relpilot")
        .unwrap()
        .args(["--quiet", "--verbose"])
        .assert()
        .failure();
}
