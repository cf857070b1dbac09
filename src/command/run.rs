//! Batch driver: the full two-stage pipeline over every sample in a directory.

use std::{
    cmp::{max, min},
    path::PathBuf,
    sync::{
        Arc,
        mpsc::{self, Sender, Receiver},
    },
    thread,
    time::Instant,
};
use colored::Colorize;
use const_format::str_repeat;
use crate::{
    Error,
    err::{error, validate_param},
    ext::{fmt as fmt_ext, sys as sys_ext},
    pipeline::{
        self, Sample, SampleOutcome, PipelineParams,
        naming::Naming,
        mafft::AlignParams,
        iqtree::TreeParams,
    },
};

struct Args {
    input: Option<PathBuf>,
    file_prefix: String,
    size: u32,
    jobs: u16,
    keep_going: bool,
    align: AlignParams,
    tree: TreeParams,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            file_prefix: "SARS-CoV-2".to_owned(),
            size: 3600,
            jobs: 1,
            keep_going: false,
            align: Default::default(),
            tree: Default::default(),
        }
    }
}

impl Args {
    /// Validate arguments, modifying some, if needed.
    fn validate(mut self) -> Result<Self, Error> {
        self.jobs = max(self.jobs, 1);
        self.align.threads = max(self.align.threads, 1);
        self.tree.threads = max(self.tree.threads, 1);
        validate_param!(self.input.is_some(), "Root directory is not provided (see -i/--input)");
        validate_param!(!self.tree.outgroup.is_empty(),
            "Outgroup sequence name cannot be empty (see -g/--outgroup)");
        self.align.mafft = sys_ext::find_exe(&self.align.mafft)?;
        self.tree.iqtree = sys_ext::find_exe(&self.tree.iqtree)?;

        // Both external tools parallelize internally on top of the sample-level jobs.
        if let Ok(cores) = thread::available_parallelism() {
            let total = usize::from(self.jobs) * usize::from(max(self.align.threads, self.tree.threads));
            if total > cores.get() {
                log::warn!("Jobs x threads = {} oversubscribes the {} available cores", total, cores);
            }
        }
        Ok(self)
    }
}

fn print_help() {
    const KEY: usize = 18;
    const VAL: usize = 4;
    const EMPTY: &'static str = str_repeat!(" ", KEY + VAL + 5);

    let defaults = Args::default();
    println!("{}", "Align and build rooted trees for every sample in a directory.".yellow());

    println!("\n{} {} run -i samples [arguments]",
        "Usage:".bold(), super::PKG_NAME);

    println!("\n{}", "Input/output arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Root directory with one subdirectory per sample.\n\
        {EMPTY}  All output files are written next to the corresponding input.",
        "-i, --input".green(), "DIR".yellow());

    println!("\n{}", "File naming:".bold());
    println!("    {:KEY$} {:VAL$}  Number of genomes per sample [{}]. Input files are expected\n\
        {EMPTY}  at <sample>/<prefix>_<sample>_<size>+1.fasta.",
        "-n, --size".green(), "INT".yellow(), defaults.size);
    println!("    {:KEY$} {:VAL$}  Input file name prefix [{}].",
        "    --file-prefix".green(), "STR".yellow(), defaults.file_prefix);

    println!("\n{}", "Tree inference:".bold());
    println!("    {:KEY$} {:VAL$}  Outgroup sequence, at which each tree is rooted [{}].",
        "-g, --outgroup".green(), "STR".yellow(), defaults.tree.outgroup);
    println!("    {:KEY$} {:VAL$}  Substitution model [{}].",
        "-m, --model".green(), "STR".yellow(), defaults.tree.model);
    println!("    {:KEY$} {:VAL$}  Disable the accelerated tree-search heuristic.",
        "    --thorough".green(), "");
    println!("    {:KEY$} {:VAL$}  Skip ancestral state reconstruction.",
        "    --no-asr".green(), "");

    println!("\n{}", "Execution parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Number of threads per external tool invocation [{}].",
        "-@, --threads".green(), "INT".yellow(), defaults.align.threads);
    println!("    {:KEY$} {:VAL$}  Number of samples processed concurrently [{}].",
        "-j, --jobs".green(), "INT".yellow(), defaults.jobs);
    println!("    {:KEY$} {:VAL$}  Kill an external tool after this many seconds, 0 = unlimited [0].",
        "    --timeout".green(), "SEC".yellow());
    println!("    {:KEY$} {:VAL$}  Attempt tree inference even if the alignment step failed.",
        "-k, --keep-going".green(), "");
    println!("    {:KEY$} {:VAL$}  MAFFT executable [{}].",
        "    --mafft".green(), "EXE".yellow(), defaults.align.mafft.display());
    println!("    {:KEY$} {:VAL$}  IQ-TREE 2 executable [{}].",
        "    --iqtree".green(), "EXE".yellow(), defaults.tree.iqtree.display());

    println!("\n{}", "Other parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Show this help message.", "-h, --help".green(), "");
    println!("    {:KEY$} {:VAL$}  Show version.", "-V, --version".green(), "");
}

fn parse_args(argv: &[String]) -> Result<Args, lexopt::Error> {
    use lexopt::prelude::*;
    let mut args = Args::default();
    let mut parser = lexopt::Parser::from_args(argv);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('i') | Long("input") => args.input = Some(parser.value()?.parse()?),
            Short('n') | Long("size") => args.size = parser.value()?.parse()?,
            Long("file-prefix") => args.file_prefix = parser.value()?.parse()?,

            Short('g') | Long("outgroup") => args.tree.outgroup = parser.value()?.parse()?,
            Short('m') | Long("model") => args.tree.model = parser.value()?.parse()?,
            Long("thorough") => args.tree.fast = false,
            Long("no-asr") => args.tree.ancestral = false,

            Short('@') | Long("threads") => {
                let threads: u16 = parser.value()?.parse()?;
                args.align.threads = threads;
                args.tree.threads = threads;
            }
            Short('j') | Long("jobs") => args.jobs = parser.value()?.parse()?,
            Long("timeout") => {
                let timeout = super::parse_timeout(&mut parser)?;
                args.align.timeout = timeout;
                args.tree.timeout = timeout;
            }
            Short('k') | Long("keep-going") => args.keep_going = true,
            Long("mafft") => args.align.mafft = parser.value()?.parse()?,
            Long("iqtree") => args.tree.iqtree = parser.value()?.parse()?,

            Short('V') | Long("version") => {
                super::print_version();
                std::process::exit(0);
            }
            Short('h') | Long("help") => {
                print_help();
                std::process::exit(0);
            }
            _ => Err(arg.unexpected())?,
        }
    }
    Ok(args)
}

/// Task, sent to the workers: sample index in the sorted list + the sample itself.
type Task = (usize, Sample);

struct MainWorker {
    senders: Vec<Sender<Task>>,
    receiver: Receiver<(usize, SampleOutcome)>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl MainWorker {
    fn new(params: &Arc<PipelineParams>, n_workers: usize) -> Self {
        let mut senders = Vec::with_capacity(n_workers);
        let mut handles = Vec::with_capacity(n_workers);
        let (out_sender, receiver) = mpsc::channel();
        for _ in 0..n_workers {
            let (task_sender, task_receiver) = mpsc::channel();
            let worker = Worker {
                params: Arc::clone(params),
                receiver: task_receiver,
                sender: out_sender.clone(),
            };
            senders.push(task_sender);
            handles.push(thread::spawn(move || worker.run()));
        }
        MainWorker { senders, receiver, handles }
    }

    /// Distributes samples round-robin across workers, gathers outcomes back in input order.
    fn run(self, samples: Vec<Sample>) -> Vec<SampleOutcome> {
        let n = samples.len();
        for (i, sample) in samples.into_iter().enumerate() {
            self.senders[i % self.senders.len()].send((i, sample)).expect("Pipeline worker has failed!");
        }
        // Closing the task channels stops the workers after the last sample.
        std::mem::drop(self.senders);

        let mut outcomes: Vec<_> = self.receiver.iter().take(n).collect();
        for handle in self.handles.into_iter() {
            handle.join().expect("Pipeline worker has panicked");
        }
        outcomes.sort_by_key(|(i, _)| *i);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

struct Worker {
    params: Arc<PipelineParams>,
    receiver: Receiver<Task>,
    sender: Sender<(usize, SampleOutcome)>,
}

impl Worker {
    fn run(self) {
        for (i, sample) in self.receiver.iter() {
            let outcome = pipeline::process_sample(&sample, &self.params);
            if self.sender.send((i, outcome)).is_err() {
                return;
            }
        }
    }
}

fn summarize(outcomes: &[SampleOutcome], elapsed: std::time::Duration) -> Result<(), Error> {
    let total = outcomes.len();
    let failed: Vec<String> = outcomes.iter()
        .filter_map(|outcome| outcome.failed_stage()
            .map(|stage| format!("{} ({})", outcome.name, stage)))
        .collect();
    if failed.is_empty() {
        log::info!("Success! Processed {} sample{} in {}",
            total, if total == 1 { "" } else { "s" }, fmt_ext::Duration(elapsed));
        Ok(())
    } else {
        log::error!("Failed samples: {}", failed.join(", "));
        Err(error!(RuntimeError, "{} of {} samples failed", failed.len(), total))
    }
}

pub(super) fn run(argv: &[String]) -> Result<(), Error> {
    let args = parse_args(argv)?.validate()?;
    // unwrap as args.input was checked to be Some in validate().
    let root = args.input.as_ref().unwrap();
    let naming = Naming::new(args.file_prefix.clone(), args.size);
    let samples = pipeline::discover_samples(root, &naming)?;
    if samples.is_empty() {
        log::warn!("No sample directories found under {}", fmt_ext::path(root));
        return Ok(());
    }
    log::info!("Found {} sample{} under {}", samples.len(),
        if samples.len() == 1 { "" } else { "s" }, fmt_ext::path(root));

    let params = PipelineParams {
        align: args.align.clone(),
        tree: args.tree.clone(),
        keep_going: args.keep_going,
    };
    let start = Instant::now();
    let n_workers = min(usize::from(args.jobs), samples.len());
    let outcomes = if n_workers == 1 {
        samples.iter().map(|sample| pipeline::process_sample(sample, &params)).collect()
    } else {
        MainWorker::new(&Arc::new(params), n_workers).run(samples)
    };
    summarize(&outcomes, start.elapsed())
}
