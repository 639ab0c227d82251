// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! CLI smoke tests over a temp-dir store.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn vexil(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("vexil").expect("binary");
    cmd.arg("--dir").arg(dir);
    cmd
}

#[test]
fn set_then_get_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    vexil(dir.path()).args(["set", "dark_mode", "true"]).assert().success();
    vexil(dir.path())
        .args(["get", "dark_mode"])
        .assert()
        .success()
        .stdout(predicate::str::diff("true\n"));
}

#[test]
fn get_absent_key_exits_nonzero() {
    let dir = tempfile::tempdir().expect("tempdir");
    vexil(dir.path()).args(["get", "missing"]).assert().failure();
}

#[test]
fn values_parse_as_bool_number_or_string() {
    let dir = tempfile::tempdir().expect("tempdir");
    vexil(dir.path()).args(["set", "b", "false"]).assert().success();
    vexil(dir.path()).args(["set", "n", "2.5"]).assert().success();
    vexil(dir.path()).args(["set", "s", "hello"]).assert().success();

    vexil(dir.path())
        .args(["all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"b\": false"))
        .stdout(predicate::str::contains("\"n\": 2.5"))
        .stdout(predicate::str::contains("\"s\": \"hello\""));
}

#[test]
fn counters_and_toggles_print_the_new_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    vexil(dir.path())
        .args(["incr", "hits"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));
    vexil(dir.path())
        .args(["incr", "hits", "--by", "4"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5\n"));
    vexil(dir.path())
        .args(["toggle", "on"])
        .assert()
        .success()
        .stdout(predicate::str::diff("true\n"));
}

#[test]
fn type_mismatch_is_reported_as_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    vexil(dir.path()).args(["set", "s", "text"]).assert().success();
    vexil(dir.path())
        .args(["incr", "s"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("type mismatch"));
}

#[test]
fn check_evaluates_against_the_persisted_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    vexil(dir.path()).args(["set", "dark_mode", "true"]).assert().success();
    vexil(dir.path()).args(["set", "visits", "5"]).assert().success();
    vexil(dir.path())
        .args(["check", "dark_mode AND visits > 3"])
        .assert()
        .success()
        .stdout(predicate::str::diff("true\n"));
    vexil(dir.path())
        .args(["check", "visits > 9"])
        .assert()
        .success()
        .stdout(predicate::str::diff("false\n"));
}

#[test]
fn clear_then_keys_prints_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    vexil(dir.path()).args(["set", "a", "1"]).assert().success();
    vexil(dir.path()).args(["set", "b", "2"]).assert().success();
    vexil(dir.path()).args(["clear"]).assert().success();
    vexil(dir.path())
        .args(["keys"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
