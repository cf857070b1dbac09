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

/// Stub aligner: `mafft --thread N input`, echoes the input file to stdout.
fn fake_mafft(dir: &Path) -> PathBuf {
    write_script(&dir.join("mafft"), r#"shift 2
cat "$1""#)
}

/// Stub tree builder: finds `-pre` among its arguments and writes `<prefix>.treefile`.
fn fake_iqtree(dir: &Path) -> PathBuf {
    write_script(&dir.join("iqtree2"), r#"pre=
while [ "$#" -gt 0 ]; do
    if [ "$1" = "-pre" ]; then pre="$2"; fi
    shift
done
printf '(a,b);\n' > "$pre.treefile""#)
}

/// Creates `<root>/<sample>/SARS-CoV-2_<sample>_5+1.fasta` (tests run with `-n 5`).
fn make_sample(root: &Path, sample: &str) -> PathBuf {
    let dir = root.join(sample);
    fs::create_dir(&dir).unwrap();
    let input = dir.join(format!("SARS-CoV-2_{}_5+1.fasta", sample));
    fs::write(&input, format!(">genome_{}\nACGTACGT\n", sample)).unwrap();
    input
}

fn run_cmd(root: &Path, mafft: &Path, iqtree: &Path) -> Command {
    let mut cmd = Command::cargo_bin("phylopipe").unwrap();
    cmd.arg("run")
        .arg("-i").arg(root)
        .arg("-n").arg("5")
        .arg("--mafft").arg(mafft)
        .arg("--iqtree").arg(iqtree);
    cmd
}

#[test]
fn test_run_empty_root() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    run_cmd(root.path(), &fake_mafft(bin.path()), &fake_iqtree(bin.path()))
        .assert()
        .success()
        .stderr(predicate::str::contains("No sample directories found"));
}

#[test]
fn test_run_two_samples() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let input1 = make_sample(root.path(), "S1");
    make_sample(root.path(), "S2");

    run_cmd(root.path(), &fake_mafft(bin.path()), &fake_iqtree(bin.path()))
        .assert()
        .success()
        .stderr(predicate::str::contains("Found 2 samples"))
        .stderr(predicate::str::contains("Processed 2 samples"));

    // The stub aligner echoes its input, so the alignment must match it byte for byte.
    let msa = root.path().join("S1/SARS-CoV-2_S1_5+1_msa.fasta");
    assert_eq!(fs::read(&msa).unwrap(), fs::read(&input1).unwrap());
    assert!(root.path().join("S1/S1.treefile").exists());
    assert!(root.path().join("S2/S2.treefile").exists());
}

#[test]
fn test_run_stage_order() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    for sample in ["S2", "S1", "S3"] {
        make_sample(root.path(), sample);
    }

    // Both stubs append a marker to a shared call log.
    let call_log = root.path().join("calls.txt");
    let mafft = write_script(&bin.path().join("mafft"), &format!(
        r#"shift 2
echo "align $(basename "$1")" >> {log}
cat "$1""#, log = call_log.display()));
    let iqtree = write_script(&bin.path().join("iqtree2"), &format!(
        r#"pre=
while [ "$#" -gt 0 ]; do
    if [ "$1" = "-pre" ]; then pre="$2"; fi
    shift
done
echo "tree $(basename "$pre")" >> {log}
printf '(a,b);\n' > "$pre.treefile""#, log = call_log.display()));

    run_cmd(root.path(), &mafft, &iqtree).assert().success();

    // Samples are processed in sorted order, alignment strictly before tree inference.
    let calls = fs::read_to_string(&call_log).unwrap();
    let lines: Vec<&str> = calls.lines().collect();
    assert_eq!(lines, [
        "align SARS-CoV-2_S1_5+1.fasta", "tree S1",
        "align SARS-CoV-2_S2_5+1.fasta", "tree S2",
        "align SARS-CoV-2_S3_5+1.fasta", "tree S3",
    ]);
}

#[test]
fn test_run_failure_is_isolated() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    make_sample(root.path(), "S1");
    make_sample(root.path(), "S2");

    // The aligner fails for S1 only.
    let mafft = write_script(&bin.path().join("mafft"), r#"shift 2
case "$1" in
    (*S1*) echo "broken input" >&2; exit 3 ;;
esac
cat "$1""#);

    run_cmd(root.path(), &mafft, &fake_iqtree(bin.path()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed with exit code 3"))
        .stderr(predicate::str::contains("Skipping tree inference for S1"))
        .stderr(predicate::str::contains("1 of 2 samples failed"));

    // The dependent stage was skipped for S1, while S2 ran to completion.
    assert!(!root.path().join("S1/S1.treefile").exists());
    assert!(root.path().join("S2/S2.treefile").exists());
}

#[test]
fn test_run_keep_going() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    make_sample(root.path(), "S1");

    // Partial alignment on stdout, then failure.
    let mafft = write_script(&bin.path().join("mafft"), r#"shift 2
cat "$1"
exit 3"#);

    let mut cmd = run_cmd(root.path(), &mafft, &fake_iqtree(bin.path()));
    cmd.arg("--keep-going")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 samples failed"));

    // Tree inference was still attempted against the partial alignment.
    assert!(root.path().join("S1/S1.treefile").exists());
}

#[test]
fn test_run_missing_input_file() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    fs::create_dir(root.path().join("S1")).unwrap();

    run_cmd(root.path(), &fake_mafft(bin.path()), &fake_iqtree(bin.path()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 1 samples failed"));
    assert!(!root.path().join("S1/S1.treefile").exists());
}

#[test]
fn test_run_empty_alignment_fails_tree_stage() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    make_sample(root.path(), "S1");

    // Aligner exits cleanly without producing any output.
    let mafft = write_script(&bin.path().join("mafft"), "exit 0");

    run_cmd(root.path(), &mafft, &fake_iqtree(bin.path()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("is empty"))
        .stderr(predicate::str::contains("1 of 1 samples failed"));
    assert!(!root.path().join("S1/S1.treefile").exists());
}

#[test]
fn test_run_parallel_jobs() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    for sample in ["S1", "S2", "S3"] {
        make_sample(root.path(), sample);
    }

    let mut cmd = run_cmd(root.path(), &fake_mafft(bin.path()), &fake_iqtree(bin.path()));
    cmd.args(&["-j", "2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Processed 3 samples"));
    for sample in ["S1", "S2", "S3"] {
        assert!(root.path().join(sample).join(format!("{}.treefile", sample)).exists());
    }
}

#[test]
fn test_run_timeout() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    make_sample(root.path(), "S1");

    let mafft = write_script(&bin.path().join("mafft"), "sleep 30");

    let mut cmd = run_cmd(root.path(), &mafft, &fake_iqtree(bin.path()));
    cmd.args(&["--timeout", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timed out"))
        .stderr(predicate::str::contains("1 of 1 samples failed"));
}

#[test]
fn test_run_overwrites_previous_outputs() {
    let root = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    let input = make_sample(root.path(), "S1");
    let mafft = fake_mafft(bin.path());
    let iqtree = fake_iqtree(bin.path());

    run_cmd(root.path(), &mafft, &iqtree).assert().success();

    // Re-running after the input changed must replace the old outputs.
    fs::write(&input, ">genome_S1_v2\nTTTT\n").unwrap();
    run_cmd(root.path(), &mafft, &iqtree).assert().success();

    let msa = root.path().join("S1/SARS-CoV-2_S1_5+1_msa.fasta");
    assert_eq!(fs::read(&msa).unwrap(), fs::read(&input).unwrap());
}
