//! Runs the `bfjit` binary on whole programs.
#![cfg(all(target_os = "linux", target_arch = "x86_64"))]

use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn bfjit(source: &str, dir: &Path) -> Output {
    let file = dir.join("prog.bf");
    fs::write(&file, source).unwrap();

    Command::new(env!("CARGO_BIN_EXE_bfjit"))
        .arg(&file)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

#[test]
fn runs_a_program() {
    let dir = tempfile::tempdir().unwrap();
    let output = bfjit("++++++[>+++++++++++<-]>-.", dir.path());

    assert!(output.status.success());
    assert_eq!(b"A".to_vec(), output.stdout);
}

#[test]
fn writing_past_the_end_of_the_tape_faults() {
    let dir = tempfile::tempdir().unwrap();
    let output = bfjit(&format!("{}+", ">".repeat(5000)), dir.path());

    assert_eq!(Some(libc::SIGSEGV), output.status.signal());
}

#[test]
fn writing_far_before_the_start_of_the_tape_faults() {
    let dir = tempfile::tempdir().unwrap();
    let output = bfjit(&format!("{}-", "<".repeat(4000)), dir.path());

    assert_eq!(Some(libc::SIGSEGV), output.status.signal());
}

#[test]
fn bracket_errors_are_reported_but_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let output = bfjit("+]", dir.path());

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[0003]: line 1"), "{}", stderr);
}
