//! IQ-TREE 2 invocation: rooted tree inference over one alignment.

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};
use crate::{
    Error,
    ext,
};

/// Parameters of a single tree-inference invocation, fixed once per run.
/// Defaults reproduce the historical pipeline behavior exactly.
#[derive(Clone)]
pub struct TreeParams {
    pub iqtree: PathBuf,
    /// Sequence name the tree is rooted at. Must be present in every alignment.
    pub outgroup: String,
    /// Substitution model passed to `-m`.
    pub model: String,
    /// Accelerated tree-search heuristic (`-fast`).
    pub fast: bool,
    /// Ancestral state reconstruction (`-asr`).
    pub ancestral: bool,
    /// Overwrite results of a previous run instead of reusing its checkpoint (`-redo`).
    pub redo: bool,
    pub threads: u16,
    pub timeout: Option<Duration>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            iqtree: PathBuf::from("iqtree2"),
            outgroup: "NC_045512.2".to_owned(),
            model: "GTR+F+I+G4".to_owned(),
            fast: true,
            ancestral: true,
            redo: true,
            threads: 3,
            timeout: None,
        }
    }
}

fn build_command(params: &TreeParams, alignment: &Path, prefix: &Path) -> Command {
    let mut command = Command::new(&params.iqtree);
    command
        .arg("-s").arg(alignment) // Input alignment.
        .args(&[
            "-o", &params.outgroup, // Root the tree at the outgroup.
            "-m", &params.model,    // Substitution model.
            "-nt", &params.threads.to_string(),
            ]);
    if params.redo {
        command.arg("-redo");
    }
    if params.fast {
        command.arg("-fast");
    }
    if params.ancestral {
        command.arg("-asr");
    }
    // Tree, log and state files all land under this prefix.
    command.arg("-pre").arg(prefix);
    command
}

/// Infers a rooted phylogenetic tree from `alignment`,
/// writing all output files under the path `prefix`.
pub fn infer(params: &TreeParams, alignment: &Path, prefix: &Path) -> crate::Result<()> {
    let start = Instant::now();
    let mut command = build_command(params, alignment, prefix);
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    log::debug!("    {}", ext::fmt::command(&command));

    let out = ext::sys::run_limited(command, params.timeout)?;
    log::debug!("    Finished in {}", ext::fmt::Duration(start.elapsed()));
    if out.status.success() {
        Ok(())
    } else {
        Err(Error::SubprocessFail("iqtree2".to_owned(), out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_args(params: &TreeParams) -> Vec<String> {
        build_command(params, Path::new("aln.fasta"), Path::new("out/S1/S1"))
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_build_command_defaults() {
        let args = command_args(&TreeParams::default());
        assert_eq!(args, ["-s", "aln.fasta", "-o", "NC_045512.2", "-m", "GTR+F+I+G4",
            "-nt", "3", "-redo", "-fast", "-asr", "-pre", "out/S1/S1"]);
    }

    #[test]
    fn test_build_command_toggles() {
        let params = TreeParams {
            outgroup: "OUT1".to_owned(),
            model: "HKY".to_owned(),
            fast: false,
            ancestral: false,
            threads: 12,
            ..Default::default()
        };
        let args = command_args(&params);
        assert_eq!(args, ["-s", "aln.fasta", "-o", "OUT1", "-m", "HKY",
            "-nt", "12", "-redo", "-pre", "out/S1/S1"]);
    }
}
