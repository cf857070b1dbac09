//! File naming conventions within sample directories.

/// Alignment files carry this suffix before the extension.
const MSA_SUFFIX: &'static str = "_msa";

/// Derives per-sample file names from the file prefix and the sample size.
/// All names are pure functions of `(prefix, sample, size)`.
#[derive(Clone)]
pub struct Naming {
    prefix: String,
    size: u32,
}

impl Naming {
    pub fn new(prefix: impl Into<String>, size: u32) -> Self {
        Self {
            prefix: prefix.into(),
            size,
        }
    }

    /// Name of the input file: `<prefix>_<sample>_<size>+1.fasta`
    /// (`+1`: sample genomes plus the outgroup).
    pub fn input_name(&self, sample: &str) -> String {
        format!("{}_{}_{}+1.fasta", self.prefix, sample, self.size)
    }

    /// Name of the alignment file: same as the input, with `_msa` before the extension.
    pub fn msa_name(&self, sample: &str) -> String {
        format!("{}_{}_{}+1{}.fasta", self.prefix, sample, self.size, MSA_SUFFIX)
    }
}
