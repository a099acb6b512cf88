//! CLI Integration Tests
//!
//! These tests run the `parrot` binary end-to-end against a temporary
//! configuration directory. Without `--relay` the agent runs on the offline
//! loopback session, and the directory URL points at a closed local port so
//! nothing leaves the machine.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::process::Stdio;
use std::time::{Duration, Instant};

use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::Command;
use parrot_core::{Identity, InboundMessage, MessageId, RelayFrame};
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a CLI command with a temporary configuration directory
fn cli_cmd(confdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("parrot").expect("Failed to find parrot binary");
    cmd.arg("--confdir")
        .arg(confdir.path())
        .arg("--directory-url")
        .arg("http://127.0.0.1:9");
    cmd
}

/// Extract the identity from "  Using ID XXXXXXXX and public nickname: ..."
fn extract_identity(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.strip_prefix("  Using ID ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    })
}

// ============================================================================
// Startup
// ============================================================================

#[test]
fn test_help_lists_options() {
    Command::cargo_bin("parrot")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--confdir"))
        .stdout(predicate::str::contains("--createid"))
        .stdout(predicate::str::contains("--hexpass"))
        .stdout(predicate::str::contains("--testid"));
}

#[test]
fn test_createid_creates_identity_file() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Saving ID to"))
        .stdout(predicate::str::contains("Using ID"))
        .stdout(predicate::str::contains("public nickname: parrot"));

    assert!(confdir.path().join("threema.id").exists());
}

#[test]
fn test_identity_is_reloaded() {
    let confdir = TempDir::new().unwrap();

    let first = cli_cmd(&confdir)
        .arg("--createid")
        .write_stdin("")
        .assert()
        .success();
    let first_id = extract_identity(&String::from_utf8_lossy(&first.get_output().stdout))
        .expect("identity in output");

    let second = cli_cmd(&confdir)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loading ID from"));
    let second_id = extract_identity(&String::from_utf8_lossy(&second.get_output().stdout))
        .expect("identity in output");

    assert_eq!(first_id, second_id);
}

#[test]
fn test_prompt_answer_no_exits_with_error() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .write_stdin("NO\n")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Enter YES (upper case) or NO"));

    assert!(!confdir.path().join("threema.id").exists());
}

#[test]
fn test_prompt_lowercase_yes_is_refused() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir).write_stdin("yes\n").assert().code(1);
    assert!(!confdir.path().join("threema.id").exists());
}

#[test]
fn test_prompt_answer_yes_creates_identity() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .write_stdin("YES\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Saving ID to"));

    assert!(confdir.path().join("threema.id").exists());
}

#[test]
fn test_wrong_passphrase_is_fatal() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .arg("--pass")
        .arg("correct horse")
        .write_stdin("")
        .assert()
        .success();

    cli_cmd(&confdir)
        .arg("--pass")
        .arg("battery staple")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("wrong passphrase"));
}

#[test]
fn test_hexpass_matches_plain_pass() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .arg("--pass")
        .arg("MyTinyPW")
        .write_stdin("")
        .assert()
        .success();

    cli_cmd(&confdir)
        .arg("--hexpass")
        .arg("4d7954696e795057")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loading ID from"));
}

#[test]
fn test_invalid_hexpass_is_fatal() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--hexpass")
        .arg("not-hex")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("hexpass"));
}

#[test]
fn test_short_password_warns() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .arg("--pass")
        .arg("short")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Warning: Password"));
}

#[test]
fn test_invalid_testid_is_rejected() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .arg("--testid")
        .arg("SHORT")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--testid"));
}

#[test]
fn test_long_nickname_is_truncated() {
    let confdir = TempDir::new().unwrap();
    let nick = "n".repeat(40);

    cli_cmd(&confdir)
        .arg("--createid")
        .arg("--pubnick")
        .arg(&nick)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Setting public nickname to: {}\n",
            "n".repeat(32)
        )));
}

#[test]
fn test_store_paths_printed_only_when_present() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loading addressbook from").not())
        .stdout(predicate::str::contains("Loading group directory from").not());

    std::fs::write(confdir.path().join("address.book"), "[]").unwrap();

    cli_cmd(&confdir)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loading addressbook from"))
        .stdout(predicate::str::contains("Loading group directory from").not());
}

// ============================================================================
// Interactive input
// ============================================================================

#[test]
fn test_invalid_line_reports_invalid_id() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .write_stdin("hello\nBAD-ID!!text\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ID is invalid!").count(2));
}

#[test]
fn test_unreachable_directory_is_not_fatal() {
    let confdir = TempDir::new().unwrap();

    cli_cmd(&confdir)
        .arg("--createid")
        .write_stdin("ECHOECHOhello\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Directory lookup for ECHOECHO failed"));

    assert!(!confdir.path().join("address.book").exists());
}

#[test]
fn test_log_dir_receives_jsonl() {
    let confdir = TempDir::new().unwrap();
    let logs = confdir.path().join("logs");

    cli_cmd(&confdir)
        .arg("--createid")
        .arg("--log-dir")
        .arg(&logs)
        .arg("-v")
        .write_stdin("")
        .assert()
        .success();

    let files: Vec<_> = std::fs::read_dir(&logs).unwrap().collect();
    assert_eq!(files.len(), 1);
}

// ============================================================================
// Relay
// ============================================================================

#[test]
fn test_fatal_session_error_exits_with_stdin_open() {
    let confdir = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    // Deliver one text, take the receipt for it and hang up without an ack.
    let relay = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();

        let frame = RelayFrame::Deliver {
            message: InboundMessage::Text {
                sender: Identity::parse("ABCD1234").unwrap(),
                id: MessageId::new(),
                nickname: "Bob".into(),
                body: "Hi".into(),
            },
        };
        writeln!(writer, "{}", serde_json::to_string(&frame).unwrap()).unwrap();

        line.clear();
        reader.read_line(&mut line).unwrap();
        line
    });

    let mut child = std::process::Command::cargo_bin("parrot")
        .unwrap()
        .arg("--confdir")
        .arg(confdir.path())
        .arg("--directory-url")
        .arg("http://127.0.0.1:9")
        .arg("--createid")
        .arg("--relay")
        .arg(&addr)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // Keep stdin open for the whole run.
    let _stdin = child.stdin.take();

    let submitted = relay.join().unwrap();
    assert!(submitted.contains("delivery_receipt"));

    let deadline = Instant::now() + Duration::from_secs(15);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("parrot kept running after the relay closed");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(status.code(), Some(1));

    let output = child.wait_with_output().unwrap();
    assert!(String::from_utf8_lossy(&output.stderr).contains("Session closed"));
}
