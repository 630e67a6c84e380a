//! Integration tests for the `warden` CLI binary.
//!
//! These drive the compiled binary as a subprocess against a scratch
//! `game_root`/`backup_root` pair, the way the storage-backed sibling
//! crates in this workspace test their own CLI front ends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::Path;
use std::process::Command;

fn warden_bin() -> String {
    let path = env!("CARGO_BIN_EXE_warden");
    assert!(Path::new(path).exists(), "warden binary not found at {path}");
    path.to_owned()
}

struct Scratch {
    dir: tempfile::TempDir,
}

impl Scratch {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        fs::create_dir_all(dir.path().join("game")).expect("create game root");
        fs::create_dir_all(dir.path().join("backups")).expect("create backup root");
        Self { dir }
    }

    fn game_root(&self) -> std::path::PathBuf {
        self.dir.path().join("game")
    }

    fn backup_root(&self) -> std::path::PathBuf {
        self.dir.path().join("backups")
    }

    fn run(&self, args: &[&str]) -> (i32, String, String) {
        let output = Command::new(warden_bin())
            .arg("--game-root")
            .arg(self.game_root())
            .arg("--backup-root")
            .arg(self.backup_root())
            .args(args)
            .output()
            .expect("failed to execute warden");
        let code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        (code, stdout, stderr)
    }
}

// ── Version & help ───────────────────────────────────────────────────

#[test]
fn test_version_flag() {
    let output = Command::new(warden_bin())
        .arg("--version")
        .output()
        .expect("failed to execute warden");
    assert!(output.status.success(), "warden --version should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("warden"), "version output should contain 'warden': {stdout}");
}

#[test]
fn test_help_lists_subcommands() {
    let output = Command::new(warden_bin())
        .arg("--help")
        .output()
        .expect("failed to execute warden");
    assert!(output.status.success(), "warden --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["create", "modify", "delete", "move", "copy", "compile", "decompile", "restore", "backups", "policy", "audit"] {
        assert!(stdout.contains(sub), "help should list '{sub}': {stdout}");
    }
}

// ── Create / Modify / Delete round trip ──────────────────────────────

#[test]
fn test_create_then_modify_then_delete() {
    let scratch = Scratch::new();

    let (code, stdout, stderr) = scratch.run(&["create", "shared/greeting.txt", "--contents", "hello"]);
    assert_eq!(code, 0, "create should succeed: {stderr}");
    assert!(stdout.contains("ok:"), "create should report success: {stdout}");
    assert_eq!(fs::read_to_string(scratch.game_root().join("shared/greeting.txt")).unwrap(), "hello");

    let (code, stdout, stderr) = scratch.run(&["modify", "shared/greeting.txt", "--contents", "goodbye"]);
    assert_eq!(code, 0, "modify should succeed: {stderr}");
    assert!(stdout.contains("backup:"), "modify should report a backup path: {stdout}");
    assert_eq!(fs::read_to_string(scratch.game_root().join("shared/greeting.txt")).unwrap(), "goodbye");

    let (code, _, stderr) = scratch.run(&["delete", "shared/greeting.txt"]);
    assert_eq!(code, 0, "delete should succeed: {stderr}");
    assert!(!scratch.game_root().join("shared/greeting.txt").exists());
}

#[test]
fn test_create_rejects_path_escaping_game_root() {
    let scratch = Scratch::new();
    let (code, _, stderr) = scratch.run(&["create", "../outside.txt", "--contents", "x"]);
    assert_ne!(code, 0, "a path escaping the game root should fail the call");
    assert!(stderr.contains("error"), "should report a normalization error: {stderr}");
}

#[test]
fn test_role_restricts_access_outside_server_tree() {
    let scratch = Scratch::new();
    fs::create_dir_all(scratch.game_root().join("admin")).unwrap();

    let output = Command::new(warden_bin())
        .arg("--game-root")
        .arg(scratch.game_root())
        .arg("--backup-root")
        .arg(scratch.backup_root())
        .arg("--role")
        .arg("game-master")
        .args(["create", "admin/secret.txt", "--contents", "x"])
        .output()
        .expect("failed to execute warden");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("denied"),
        "game master should be denied outside server/logs trees: {stdout}"
    );
}

// ── Backups ───────────────────────────────────────────────────────────

#[test]
fn test_backups_list_after_modify() {
    let scratch = Scratch::new();
    scratch.run(&["create", "shared/a.txt", "--contents", "v1"]);
    scratch.run(&["modify", "shared/a.txt", "--contents", "v2"]);

    let (code, stdout, stderr) = scratch.run(&["backups", "list"]);
    assert_eq!(code, 0, "backups list should succeed: {stderr}");
    assert!(stdout.contains("backup(s)"), "should summarize per-origin backup counts: {stdout}");
}

#[test]
fn test_backups_prune_accepts_keep_override() {
    let scratch = Scratch::new();
    scratch.run(&["create", "shared/a.txt", "--contents", "v1"]);
    for i in 0..3 {
        scratch.run(&["modify", "shared/a.txt", "--contents", &format!("v{i}")]);
    }

    let (code, stdout, stderr) = scratch.run(&["backups", "prune", "--keep", "1"]);
    assert_eq!(code, 0, "backups prune should succeed: {stderr}");
    assert!(stdout.contains("pruned"), "should report pruned count: {stdout}");
}

// ── Policy ────────────────────────────────────────────────────────────

#[test]
fn test_policy_save_then_load_round_trips() {
    let scratch = Scratch::new();
    let policy_path = scratch.dir.path().join("policy.json");

    let (code, _, stderr) = scratch.run(&["policy", "save", policy_path.to_str().unwrap()]);
    assert_eq!(code, 0, "policy save should succeed: {stderr}");
    assert!(policy_path.exists());

    let (code, stdout, stderr) = scratch.run(&["policy", "load", policy_path.to_str().unwrap()]);
    assert_eq!(code, 0, "policy load should succeed: {stderr}");
    assert!(stdout.contains("loaded"));
}

// ── Audit ─────────────────────────────────────────────────────────────

#[test]
fn test_audit_history_reports_denied_and_allowed_calls() {
    let scratch = Scratch::new();
    scratch.run(&["create", "shared/a.txt", "--contents", "v1"]);
    scratch.run(&["create", "../escape.txt", "--contents", "v1"]);

    let (code, stdout, stderr) = scratch.run(&["audit", "history"]);
    assert_eq!(code, 0, "audit history should succeed: {stderr}");
    assert!(stdout.contains("ok") || stdout.contains("denied"), "should print outcomes: {stdout}");
}

// ── Decompile / compile ──────────────────────────────────────────────

#[test]
fn test_decompile_produces_json_document_with_hex_dump() {
    let scratch = Scratch::new();
    let source = scratch.game_root().join("shared/data.bin");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, vec![0xABu8; 512]).unwrap();

    let (code, stdout, stderr) = scratch.run(&["decompile", "shared/data.bin", "shared/data.json", "--hex"]);
    assert_eq!(code, 0, "decompile should succeed: {stderr}");
    assert!(stdout.contains("0000:"), "--hex should print an offset-prefixed hex dump: {stdout}");
    let doc_bytes = fs::read(scratch.game_root().join("shared/data.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&doc_bytes).unwrap();
    assert!(doc.get("hexDump").is_some(), "decompiled document should carry a hexDump field: {doc}");
}

#[test]
fn test_compile_without_known_layout_is_rejected() {
    // The CLI has no way to supply a `RecordLayout`, so compiling a
    // format the registry has no layout for is expected to fail rather
    // than silently emit a lossy guess.
    let scratch = Scratch::new();
    let doc = serde_json::json!({
        "metadata": {"fileName": "x", "size": 0, "detectedFormat": "GenericBinary", "compressed": false, "encrypted": false},
        "extractedStrings": [],
        "sections": [],
        "hexDump": "",
        "int32Values": [],
        "floatValues": [],
        "formatSpecificData": null,
    });
    fs::write(scratch.game_root().join("doc.json"), serde_json::to_vec_pretty(&doc).unwrap()).unwrap();

    let (code, _, stderr) = scratch.run(&["compile", "doc.json", "out.bin"]);
    assert_ne!(code, 0, "compiling without a known record layout should fail");
    assert!(stderr.contains("error"), "should surface the compile error: {stderr}");
}
