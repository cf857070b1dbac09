//! Two-stage pipeline over independent genome samples:
//! multiple sequence alignment, then rooted tree inference.

pub mod naming;
pub mod mafft;
pub mod iqtree;

use std::{
    fs,
    path::{Path, PathBuf},
};
use crate::{
    Error,
    err::add_path,
    ext::{fmt as fmt_ext, sys as sys_ext},
};
use naming::Naming;

/// One genome sample: a subdirectory of the root folder.
/// All input and output files live inside that subdirectory.
#[derive(Clone)]
pub struct Sample {
    pub name: String,
    /// Input set of genomes.
    pub input: PathBuf,
    /// Alignment, produced by the first stage.
    pub msa: PathBuf,
    /// Prefix, under which tree inference writes its output files.
    pub prefix: PathBuf,
}

impl Sample {
    pub fn new(root: &Path, name: &str, naming: &Naming) -> Self {
        let dir = root.join(name);
        Self {
            input: dir.join(naming.input_name(name)),
            msa: dir.join(naming.msa_name(name)),
            prefix: dir.join(name),
            name: name.to_owned(),
        }
    }
}

/// Collects samples from the immediate subdirectories of `root`.
/// Directory listing order is arbitrary, so samples are sorted by name for reproducible runs.
pub fn discover_samples(root: &Path, naming: &Naming) -> crate::Result<Vec<Sample>> {
    let mut samples = Vec::new();
    for entry in fs::read_dir(root).map_err(add_path!(root))? {
        let entry = entry.map_err(add_path!(root))?;
        if !entry.file_type().map_err(add_path!(root))?.is_dir() {
            continue;
        }
        let path = entry.path();
        match path.file_name().unwrap().to_str() {
            None => log::error!("Skipping directory {:?}: name is not valid UTF-8", path),
            Some(name) if name.starts_with('.') => log::trace!("Skipping hidden directory {}", name),
            Some(name) => samples.push(Sample::new(root, name, naming)),
        }
    }
    samples.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(samples)
}

/// Result of one pipeline stage.
#[derive(Debug)]
pub enum StageStatus {
    Done,
    Failed(Error),
    /// Stage was not attempted because an earlier stage failed.
    Skipped,
}

impl StageStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Typed per-sample result, collected by the driver.
#[derive(Debug)]
pub struct SampleOutcome {
    pub name: String,
    pub alignment: StageStatus,
    pub tree: StageStatus,
}

impl SampleOutcome {
    /// Returns the name of the first failed stage, if any.
    pub fn failed_stage(&self) -> Option<&'static str> {
        if self.alignment.is_failed() {
            Some("alignment")
        } else if self.tree.is_failed() {
            Some("tree")
        } else {
            None
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_stage().is_none()
    }
}

/// Process-wide pipeline configuration, built once from command-line arguments.
#[derive(Clone)]
pub struct PipelineParams {
    pub align: mafft::AlignParams,
    pub tree: iqtree::TreeParams,
    /// Attempt tree inference even when the alignment stage failed.
    pub keep_going: bool,
}

fn align_stage(sample: &Sample, params: &mafft::AlignParams) -> StageStatus {
    match sys_ext::nonempty_file(&sample.input)
        .and_then(|()| mafft::align(params, &sample.input, &sample.msa))
    {
        Ok(()) => StageStatus::Done,
        Err(e) => {
            log::error!("    Alignment of {} failed: {}", sample.name, e.display());
            StageStatus::Failed(e)
        }
    }
}

fn tree_stage(sample: &Sample, params: &iqtree::TreeParams) -> StageStatus {
    match sys_ext::nonempty_file(&sample.msa)
        .and_then(|()| iqtree::infer(params, &sample.msa, &sample.prefix))
    {
        Ok(()) => StageStatus::Done,
        Err(e) => {
            log::error!("    Tree inference for {} failed: {}", sample.name, e.display());
            StageStatus::Failed(e)
        }
    }
}

/// Runs both pipeline stages for one sample.
/// Failures are returned in the outcome, never propagated: one bad sample must not stop the batch.
pub fn process_sample(sample: &Sample, params: &PipelineParams) -> SampleOutcome {
    log::info!("Processing sample {}", sample.name);
    let alignment = align_stage(sample, &params.align);
    let tree = if alignment.is_failed() && !params.keep_going {
        log::warn!("    Skipping tree inference for {} ({})",
            sample.name, fmt_ext::path(&sample.msa));
        StageStatus::Skipped
    } else {
        tree_stage(sample, &params.tree)
    };
    SampleOutcome {
        name: sample.name.clone(),
        alignment,
        tree,
    }
}
