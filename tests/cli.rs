//! Command line tests.

mod common;

use assert_cmd::Command;
use common::{fixture_project, write_config};
use predicates::prelude::*;

fn packager() -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_package").unwrap();
    cmd.env_remove("CSC_LINK").env("RUST_LOG", "info");
    cmd
}

#[test]
fn packages_fixture_into_unpacked_directory() {
    let project = fixture_project();
    write_config(project.path(), "product_name = \"Fixture\"\n");

    packager()
        .arg(project.path())
        .args(["--platform", "linux", "--arch", "x64", "--target", "dir"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Unpacked application"));

    let resources = project.path().join("dist/linux-unpacked/resources");
    assert!(resources.join("app.tar").is_file());
    assert!(resources.join("app.tar.unpacked/node_modules/dep/addon.node").is_file());
}

#[test]
fn writes_tar_gz_into_custom_output_directory() {
    let project = fixture_project();
    let output = project.path().join("out");

    packager()
        .arg(project.path())
        .args(["-p", "win", "-a", "arm64", "-t", "tar.gz", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Created artifact"));

    assert!(output.join("win-arm64-unpacked/resources/app.tar").is_file());
    assert!(output.join("My-App-1.0.0-arm64.tar.gz").is_file());
}

#[test]
fn rejects_unknown_target() {
    let project = fixture_project();

    packager()
        .arg(project.path())
        .args(["--target", "msi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid target: msi"));
}

#[test]
fn reports_missing_manifest() {
    let project = tempfile::tempdir().unwrap();

    packager()
        .arg(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading application manifest"));
}

#[test]
fn sanity_check_failure_prints_suggestions() {
    let project = fixture_project();
    write_config(project.path(), "files = [\"**/*\", \"!index.js\"]\n");

    packager()
        .arg(project.path())
        .args(["--platform", "linux", "--arch", "x64", "--target", "dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist in"))
        .stderr(predicate::str::contains("Set `main` in package.json"));
}
