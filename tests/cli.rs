//! End-to-end checks for the paths that exit before any window opens

use std::ffi::OsStr;
use std::process::{Command, Output};

fn command<I, S>(args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(env!("CARGO_BIN_EXE_largetype"));
    command.args(args).env_remove("LARGETYPE_LOG");
    command
}

fn largetype(args: &[&str]) -> Output {
    command(args).output().expect("failed to spawn largetype")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_prints_usage_and_succeeds() {
    let output = largetype(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
    assert!(stdout(&output).contains("--hide-after"));
}

#[test]
fn help_wins_over_text_and_bad_font() {
    let output = largetype(&["hello", "--font-family", "No Such Font 0xDEAD", "--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn version_prints_version_line() {
    let output = largetype(&["--version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("largetype version: {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn missing_text_is_an_error() {
    let output = largetype(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No text provided."));
    assert!(stderr(&output).contains("Usage:"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn only_options_is_an_error() {
    let output = largetype(&["--color", "ff0000"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No text provided."));
}

#[test]
fn unknown_font_is_rejected_before_the_window_opens() {
    let output = largetype(&["hello", "--font-family", "No Such Font 0xDEAD"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Font 'No Such Font 0xDEAD' not found"));
}

#[cfg(unix)]
#[test]
fn non_utf8_arguments_do_not_panic() {
    use std::os::unix::ffi::OsStrExt;

    let output = command([OsStr::from_bytes(b"\xff"), OsStr::new("--help")])
        .output()
        .expect("failed to spawn largetype");
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Usage:"));
}

#[cfg(all(unix, not(target_os = "macos")))]
#[test]
fn missing_display_is_an_error() {
    let output = command(["hello"])
        .env_remove("DISPLAY")
        .env_remove("WAYLAND_DISPLAY")
        .output()
        .expect("failed to spawn largetype");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error: No display available"));
}

#[test]
fn fatal_errors_are_reported_once() {
    let output = largetype(&["hello", "--font-family", "No Such Font 0xDEAD"]);
    let stderr = stderr(&output);
    let reports = stderr.lines().filter(|line| line.contains("not found")).count();
    assert_eq!(reports, 1, "{stderr}");
}
