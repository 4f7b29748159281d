// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

pub const HEADER: &str = "tag_number_masked,date_of_infraction,infraction_code,infraction_description,set_fine_amount,time_of_infraction,location1,location2,location3,location4,province";

/// One well-formed export row.
pub fn ticket(address: &str, fine: i64) -> String {
    format!(
        "***{:05},20120101,29,PARK PROHIBITED TIME NO PERMIT,{},1200,NR,{},,,ON",
        fine, fine, address
    )
}

/// Header plus `rows`, LF-terminated.
pub fn export(rows: &[String]) -> String {
    let mut content = String::from(HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    content
}

fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_streetfines"));
    cmd.args(args)
        // Keep the developer's own config files out of the tests.
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("streetfines-tests-no-config"))
        .env_remove("RUST_LOG");
    cmd
}

/// Run streetfines with `input` on stdin
pub fn run_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    let mut child = command(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start streetfines");

    if let Some(mut stdin) = child.stdin.take() {
        // The child may exit (e.g. on a usage error) before reading stdin.
        if let Err(e) = stdin.write_all(input.as_bytes()) {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                panic!("Failed to write to stdin: {e:?}");
            }
        }
    }

    let output = child.wait_with_output().expect("Failed to read output");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run streetfines with `file_content` in a temporary file appended as the last argument
pub fn run_with_file(args: &[&str], file_content: &str) -> (String, String, i32) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(file_content.as_bytes())
        .expect("Failed to write to temp file");
    temp_file.flush().expect("Failed to flush temp file");

    let mut full_args = args.to_vec();
    full_args.push(temp_file.path().to_str().unwrap());
    run_in_dir(&full_args, None)
}

/// Run streetfines with no stdin, optionally from another working directory
pub fn run_in_dir(args: &[&str], dir: Option<&Path>) -> (String, String, i32) {
    let mut cmd = command(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute streetfines");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}
