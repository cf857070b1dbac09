use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Writes an executable stub script standing in for an external tool.
fn write_script(path: &Path, body: &str) -> PathBuf {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
    path.to_owned()
}

#[test]
fn test_align_writes_tool_stdout() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("genomes.fasta");
    let output = temp.path().join("genomes_msa.fasta");
    fs::write(&input, ">a\nACGT\n>b\nACGA\n").unwrap();
    let mafft = write_script(&temp.path().join("mafft"), r#"shift 2
cat "$1""#);

    let mut cmd = Command::cargo_bin("phylopipe").unwrap();
    cmd.arg("align")
        .arg("-i").arg(&input)
        .arg("-o").arg(&output)
        .arg("--mafft").arg(&mafft)
        .assert()
        .success()
        .stderr(predicate::str::contains("Alignment written to"));
    assert_eq!(fs::read(&output).unwrap(), fs::read(&input).unwrap());
}

#[test]
fn test_align_thread_flag() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("genomes.fasta");
    fs::write(&input, ">a\nACGT\n").unwrap();
    let args_file = temp.path().join("args.txt");
    let mafft = write_script(&temp.path().join("mafft"), &format!(
        r#"printf '%s ' "$@" > {}"#, args_file.display()));

    let mut cmd = Command::cargo_bin("phylopipe").unwrap();
    cmd.arg("align")
        .arg("-i").arg(&input)
        .arg("-o").arg(temp.path().join("out.fasta"))
        .arg("--mafft").arg(&mafft)
        .args(&["-@", "7"])
        .assert()
        .success();

    let recorded = fs::read_to_string(&args_file).unwrap();
    assert!(recorded.starts_with("--thread 7 "), "Unexpected arguments: {}", recorded);
}

#[test]
fn test_align_missing_input() {
    let temp = TempDir::new().unwrap();
    let mafft = write_script(&temp.path().join("mafft"), "exit 0");

    let mut cmd = Command::cargo_bin("phylopipe").unwrap();
    cmd.arg("align")
        .arg("-i").arg(temp.path().join("no_such.fasta"))
        .arg("-o").arg(temp.path().join("out.fasta"))
        .arg("--mafft").arg(&mafft)
        .assert()
        .failure();
}

#[test]
fn test_align_tool_failure() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("genomes.fasta");
    fs::write(&input, ">a\nACGT\n").unwrap();
    let mafft = write_script(&temp.path().join("mafft"), r#"echo "out of memory" >&2
exit 2"#);

    let mut cmd = Command::cargo_bin("phylopipe").unwrap();
    cmd.arg("align")
        .arg("-i").arg(&input)
        .arg("-o").arg(temp.path().join("out.fasta"))
        .arg("--mafft").arg(&mafft)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed with exit code 2"))
        .stderr(predicate::str::contains("out of memory"));
}
