use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

const AUTHOR: &str = "cli-test <cli-test@example.com>";

fn gitsave(repo: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gitsave").expect("binary");
    cmd.arg("--repo").arg(repo).arg("--author").arg(AUTHOR);
    cmd.env_remove("RUST_LOG");
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.arg("--json").output().expect("run gitsave");
    serde_json::from_slice(&output.stdout).expect("json envelope")
}

#[test]
fn gitsave_help_works() {
    Command::cargo_bin("gitsave")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("gitsave"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "put", "rm", "rmdir", "mv", "mvdir", "cat", "ls", "files", "log", "unlock",
    ];

    for cmd in subcommands {
        Command::cargo_bin("gitsave")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn put_then_read_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path();

    gitsave(repo).arg("init").assert().success();
    assert!(repo.join(".git").join("gitsave.toml").exists());

    gitsave(repo)
        .args(["put", "docs/a.md", "-", "-m", "add a"])
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout(contains("gitsave put: docs/a.md"));

    gitsave(repo)
        .args(["cat", "docs/a.md"])
        .assert()
        .success()
        .stdout("hello\n");

    gitsave(repo)
        .args(["ls", "docs"])
        .assert()
        .success()
        .stdout("a.md\n");

    gitsave(repo)
        .args(["log", "docs/a.md"])
        .assert()
        .success()
        .stdout(contains("add a"));
}

#[test]
fn edits_move_and_remove() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path();
    let source = dir.path().join("local.txt");
    std::fs::write(&source, "payload").expect("write source");

    gitsave(repo).arg("init").assert().success();
    gitsave(repo)
        .arg("put")
        .arg("src/one.txt")
        .arg(&source)
        .assert()
        .success();
    gitsave(repo)
        .args(["put", "src/two.txt", "-"])
        .write_stdin("two")
        .assert()
        .success();

    gitsave(repo)
        .args(["mvdir", "src", "lib"])
        .assert()
        .success();
    gitsave(repo)
        .args(["rm", "lib/two.txt"])
        .assert()
        .success();

    gitsave(repo)
        .arg("files")
        .assert()
        .success()
        .stdout("lib/one.txt\n");
}

#[test]
fn json_envelope_reports_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path();
    gitsave(repo).arg("init").assert().success();
    gitsave(repo)
        .args(["put", "a.txt", "-"])
        .write_stdin("a")
        .assert()
        .success();

    let value = json_output(gitsave(repo).args(["files", "--pattern", "*.txt"]));

    assert_eq!(value["schema_version"], "gitsave.v1");
    assert_eq!(value["command"], "files");
    assert_eq!(value["status"], "success");
    assert_eq!(value["data"]["entries"], serde_json::json!(["a.txt"]));
}

#[test]
fn missing_path_is_a_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path();
    gitsave(repo).arg("init").assert().success();

    gitsave(repo)
        .args(["cat", "missing.txt"])
        .assert()
        .code(2)
        .stderr(contains("Entry missing: missing.txt"));

    let value = json_output(gitsave(repo).args(["cat", "missing.txt"]));
    assert_eq!(value["status"], "error");
    assert_eq!(value["command"], "cat");
    assert_eq!(value["error"]["code"], 2);
    assert_eq!(value["error"]["kind"], "user_error");
    assert_eq!(value["error"]["details"]["path"], "missing.txt");
}

#[test]
fn unlock_without_token_succeeds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path();
    gitsave(repo).arg("init").assert().success();

    gitsave(repo).arg("unlock").assert().success();
}

#[test]
fn removing_a_missing_path_saves_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path();
    gitsave(repo).arg("init").assert().success();
    gitsave(repo)
        .args(["put", "a.txt", "-"])
        .write_stdin("a")
        .assert()
        .success();
    let tip = || {
        git2::Repository::open(repo)
            .and_then(|git| git.refname_to_id("refs/heads/master"))
            .expect("mainline")
    };
    let before = tip();

    gitsave(repo)
        .args(["rm", "missing.txt"])
        .assert()
        .success()
        .stdout(contains("nothing was saved"));
    gitsave(repo)
        .args(["mv", "missing.txt", "b.txt"])
        .assert()
        .success();

    assert_eq!(tip(), before);
    let value = json_output(gitsave(repo).args(["rmdir", "nowhere"]));
    assert_eq!(value["data"]["changed"], 0);
    assert!(value["data"].get("save").is_none());
    assert_eq!(tip(), before);
}
