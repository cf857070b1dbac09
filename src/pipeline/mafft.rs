//! MAFFT invocation: one external process per input file, alignment taken from its stdout.

use std::{
    fs::File,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};
use crate::{
    Error,
    err::add_path,
    ext,
};

/// Parameters of a single aligner invocation, fixed once per run.
#[derive(Clone)]
pub struct AlignParams {
    pub mafft: PathBuf,
    pub threads: u16,
    pub timeout: Option<Duration>,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            mafft: PathBuf::from("mafft"),
            threads: 3,
            timeout: None,
        }
    }
}

fn build_command(params: &AlignParams, input: &Path) -> Command {
    let mut command = Command::new(&params.mafft);
    command
        .args(&["--thread", &params.threads.to_string()])
        .arg(input);
    command
}

/// Aligns `input` with MAFFT, writing the tool's stdout verbatim to `output`
/// (MAFFT has no output-file flag). `output` is created or truncated.
pub fn align(params: &AlignParams, input: &Path, output: &Path) -> crate::Result<()> {
    let start = Instant::now();
    let out_file = File::create(output).map_err(add_path!(output))?;
    let mut command = build_command(params, input);
    command
        .stdout(Stdio::from(out_file))
        .stderr(Stdio::piped());
    log::debug!("    {} > {}", ext::fmt::command(&command), ext::fmt::path(output));

    let out = ext::sys::run_limited(command, params.timeout)?;
    log::debug!("    Finished in {}", ext::fmt::Duration(start.elapsed()));
    if out.status.success() {
        Ok(())
    } else {
        Err(Error::SubprocessFail("mafft".to_owned(), out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_command() {
        let params = AlignParams {
            mafft: PathBuf::from("/opt/bin/mafft"),
            threads: 8,
            timeout: None,
        };
        let command = build_command(&params, Path::new("in.fasta"));
        assert_eq!(command.get_program(), "/opt/bin/mafft");
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["--thread", "8", "in.fasta"]);
    }
}
