//! Tests for spawning real processes through `LocalHandle`.
//!
//! These rely on `sh`, `cat` and `sleep` being on the PATH, so they only
//! run on unix.
#![cfg(unix)]

use std::time::Duration;

use rigging_core::{Description, Error, RiggingConfig};
use rigging_runtime::{Handle, LocalHandle, PersistentReader};
use tokio::io::AsyncReadExt;

fn sh(script: &str) -> Description {
    Description::new("sh").with_arg("-c").with_arg(script)
}

async fn read_all(mut reader: PersistentReader) -> String {
    let mut out = String::new();
    tokio::time::timeout(Duration::from_secs(10), reader.read_to_string(&mut out))
        .await
        .expect("console should reach end of stream")
        .unwrap();
    out
}

async fn run_to_exit(handle: &LocalHandle) {
    handle.start().await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("process should exit")
        .unwrap();
}

#[tokio::test]
async fn test_captures_stdout_and_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(sh("echo hello; exit 3"), RiggingConfig::new(dir.path()));

    run_to_exit(&handle).await;

    assert_eq!(handle.exit_code().unwrap(), 3);
    assert!(!handle.is_running());
    assert_eq!(read_all(handle.console().unwrap().output().unwrap()).await, "hello\n");
}

#[tokio::test]
async fn test_separate_streams_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        sh("echo out; echo err 1>&2"),
        RiggingConfig::new(dir.path()),
    );

    run_to_exit(&handle).await;
    let console = handle.console().unwrap();

    assert_eq!(read_all(console.output().unwrap()).await, "out\n");
    assert_eq!(read_all(console.error().unwrap()).await, "err\n");
}

#[tokio::test]
async fn test_error_to_output_merges_streams() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        sh("echo out; echo err 1>&2").with_error_to_output(true),
        RiggingConfig::new(dir.path()),
    );

    run_to_exit(&handle).await;
    let console = handle.console().unwrap();

    assert_eq!(read_all(console.output().unwrap()).await, "out\nerr\n");
    assert!(read_all(console.error().unwrap()).await.is_empty());
}

#[tokio::test]
async fn test_environment_and_working_directory_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        sh("printf '%s' \"$GREETING\"; pwd")
            .with_env("GREETING", "hi:")
            .with_working_directory(work.path()),
        RiggingConfig::new(dir.path()),
    );

    run_to_exit(&handle).await;
    let output = read_all(handle.console().unwrap().output().unwrap()).await;

    let expected_dir = work.path().canonicalize().unwrap();
    assert_eq!(output.trim_end(), format!("hi:{}", expected_dir.display()));
}

#[tokio::test]
async fn test_stdin_round_trip_through_cat() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(Description::new("cat"), RiggingConfig::new(dir.path()));
    handle.start().await.unwrap();
    let console = handle.console().unwrap();

    let input = console.input();
    input.write_all(b"ping\n").await.unwrap();
    input.flush().await.unwrap();
    console.close().await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.exit_code().unwrap(), 0);
    assert_eq!(read_all(console.output().unwrap()).await, "ping\n");
    assert_eq!(
        tokio::fs::read(console.input_file()).await.unwrap(),
        b"ping\n"
    );
}

#[tokio::test]
async fn test_late_reader_replays_from_start() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        sh("for i in 1 2 3; do echo line $i; done"),
        RiggingConfig::new(dir.path()),
    );
    handle.start().await.unwrap();
    let console = handle.console().unwrap();
    let early = console.output().unwrap();

    handle.wait().await.unwrap();
    let early = read_all(early).await;
    let late = read_all(console.output().unwrap()).await;

    assert_eq!(early, "line 1\nline 2\nline 3\n");
    assert_eq!(late, early);
}

#[tokio::test]
async fn test_stop_terminates_process() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        Description::new("sleep").with_arg("30"),
        RiggingConfig::new(dir.path()),
    );
    handle.start().await.unwrap();
    assert!(handle.is_running());
    assert!(handle.pid().is_some());

    handle.stop().await.unwrap();
    assert!(!handle.is_started());

    tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(!handle.is_running());
    assert_eq!(handle.exit_code().unwrap(), 128 + 15);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        Description::new("sleep").with_arg("30"),
        RiggingConfig::new(dir.path()),
    );
    handle.start().await.unwrap();
    let pid = handle.pid();
    handle.start().await.unwrap();

    assert_eq!(handle.pid(), pid);
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_queries_before_start_are_illegal() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(Description::new("true"), RiggingConfig::new(dir.path()));

    assert!(matches!(handle.exit_code(), Err(Error::IllegalState(_))));
    assert!(matches!(handle.console(), Err(Error::IllegalState(_))));
    assert!(matches!(handle.wait().await, Err(Error::IllegalState(_))));
    assert!(!handle.is_running());
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_exit_code_while_running_is_illegal() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        Description::new("sleep").with_arg("30"),
        RiggingConfig::new(dir.path()),
    );
    handle.start().await.unwrap();

    assert!(matches!(handle.exit_code(), Err(Error::IllegalState(_))));
    handle.stop().await.unwrap();
}

#[tokio::test]
async fn test_missing_executable_is_an_application_error() {
    let dir = tempfile::tempdir().unwrap();
    let handle = LocalHandle::new(
        Description::new("/nonexistent/rigging-test-binary"),
        RiggingConfig::new(dir.path()),
    );

    let err = handle.start().await.unwrap_err();
    assert!(matches!(err, Error::Application(_)));
    assert!(!handle.is_started());
}
