use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const BUGGY: &str = r#"#include <stdio.h>
#include <stdlib.h>

int main(int argc, char **argv) {
    if (argc < 2) {
        return 2;
    }
    int x = atoi(argv[1]);
    if (x == 0) {
        puts("CRASH");
        abort();
    }
    printf("%d\n", 100 / x);
    return 0;
}
"#;

const ENV_KEYS: &[&str] = &[
    "AUTOPATCH_CONFIG",
    "AUTOPATCH_API_KEY",
    "OPENAI_API_KEY",
    "AUTOPATCH_DATABASE_URL",
    "AUTOPATCH_PASSWORD_PEPPER",
    "AUTOPATCH_WORKSPACE",
    "AUTOPATCH_CORS_ALLOWED_ORIGINS",
    "AUTOPATCH_DEV_MODE",
];

/// Command isolated from host configuration, running inside `dir`.
fn autopatchctl(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("autopatchctl");
    cmd.current_dir(dir.path());
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    let output = autopatchctl(&dir)
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    for command in ["patch", "compile", "find", "run", "users"] {
        assert!(text.contains(command), "help missing '{command}'");
    }
}

#[test]
fn template_patch_writes_destination() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("bugprog.c");
    let dst = dir.path().join("bugprog_fixed.c");
    fs::write(&src, BUGGY).unwrap();

    autopatchctl(&dir)
        .args(["patch"])
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("Patched file written to"));

    let patched = fs::read_to_string(&dst).unwrap();
    assert!(patched.contains("AUTO-PATCH (template)"));
    assert!(patched.contains("if (x == 0) {"));
}

#[test]
fn missing_pattern_fails_without_writing() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("plain.c");
    let dst = dir.path().join("plain_fixed.c");
    fs::write(&src, "int main(void) { return 0; }\n").unwrap();

    autopatchctl(&dir)
        .arg("patch")
        .arg(&src)
        .arg(&dst)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "could not find the expected pattern to patch",
        ));
    assert!(!dst.exists());
}

#[test]
fn remote_mode_requires_api_key() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("bugprog.c");
    let dst = dir.path().join("bugprog_fixed.c");
    fs::write(&src, BUGGY).unwrap();

    autopatchctl(&dir)
        .arg("patch")
        .arg(&src)
        .arg(&dst)
        .args(["--mode", "remote"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires an API key"));
    assert!(!dst.exists());
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    autopatchctl(&dir)
        .args(["patch", "a.c", "b.c", "--mode", "magic"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown patch mode"));
}

#[test]
fn patch_ignores_front_end_settings() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("bugprog.c");
    let dst = dir.path().join("bugprog_fixed.c");
    fs::write(&src, BUGGY).unwrap();

    autopatchctl(&dir)
        .env("AUTOPATCH_PASSWORD_PEPPER", "short")
        .env("AUTOPATCH_CORS_ALLOWED_ORIGINS", "*")
        .arg("patch")
        .arg(&src)
        .arg(&dst)
        .assert()
        .success()
        .stdout(predicate::str::contains("Patched file written to"));
    assert!(dst.exists());
}

#[test]
fn users_commands_reject_a_short_pepper() {
    let dir = TempDir::new().unwrap();
    let db = format!("sqlite://{}", dir.path().join("users.db").display());

    autopatchctl(&dir)
        .env("AUTOPATCH_DATABASE_URL", &db)
        .env("AUTOPATCH_PASSWORD_PEPPER", "short")
        .args(["users", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 16 characters"));
}

#[test]
fn users_round_trip_through_the_table() {
    let dir = TempDir::new().unwrap();
    let db = format!("sqlite://{}", dir.path().join("users.db").display());

    autopatchctl(&dir)
        .env("AUTOPATCH_DATABASE_URL", &db)
        .args(["users", "add", "alice", "--password", "correct-horse-battery"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created user alice"));

    autopatchctl(&dir)
        .env("AUTOPATCH_DATABASE_URL", &db)
        .args(["users", "add", "alice", "--password", "another-password"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already taken"));

    autopatchctl(&dir)
        .env("AUTOPATCH_DATABASE_URL", &db)
        .args(["users", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"));

    autopatchctl(&dir)
        .env("AUTOPATCH_DATABASE_URL", &db)
        .args(["users", "remove", "alice"])
        .assert()
        .success();

    autopatchctl(&dir)
        .env("AUTOPATCH_DATABASE_URL", &db)
        .args(["users", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No users"));
}

#[test]
fn compile_and_run_with_gcc() {
    if which::which("gcc").is_err() {
        eprintln!("skipping: gcc not found");
        return;
    }
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("bugprog.c");
    fs::write(&src, BUGGY).unwrap();

    autopatchctl(&dir)
        .arg("compile")
        .arg(&src)
        .assert()
        .success()
        .stdout(predicate::str::contains("Compiled"));
    assert!(dir.path().join("bugprog").exists());

    autopatchctl(&dir)
        .env("AUTOPATCH_PYTHON", dir.path().join("no-such-python"))
        .env("AUTOPATCH_WORKSPACE", dir.path().join("runs"))
        .arg("run")
        .arg(&src)
        .assert()
        .success()
        .stdout(predicate::str::contains("== Patch [ok] =="))
        .stdout(predicate::str::contains("auto-patched"));
}
