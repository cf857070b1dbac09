//! Infer a rooted phylogenetic tree from a single alignment.

use std::{
    cmp::max,
    path::PathBuf,
};
use colored::Colorize;
use crate::{
    Error,
    err::validate_param,
    ext::{fmt as fmt_ext, sys as sys_ext},
    pipeline::iqtree::{self, TreeParams},
};

struct Args {
    input: Option<PathBuf>,
    prefix: Option<PathBuf>,
    params: TreeParams,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            prefix: None,
            params: Default::default(),
        }
    }
}

impl Args {
    fn validate(mut self) -> Result<Self, Error> {
        self.params.threads = max(self.params.threads, 1);
        validate_param!(self.input.is_some(), "Input alignment is not provided (see -i/--input)");
        validate_param!(self.prefix.is_some(), "Output prefix is not provided (see -p/--prefix)");
        validate_param!(!self.params.outgroup.is_empty(),
            "Outgroup sequence name cannot be empty (see -g/--outgroup)");
        self.params.iqtree = sys_ext::find_exe(&self.params.iqtree)?;
        Ok(self)
    }
}

fn print_help() {
    const KEY: usize = 16;
    const VAL: usize = 4;

    let defaults = Args::default();
    println!("{}", "Infer a rooted phylogenetic tree from one alignment.".yellow());

    println!("\n{} {} tree -i genomes_msa.fasta -p out/sample1 [arguments]",
        "Usage:".bold(), super::PKG_NAME);

    println!("\n{}", "Input/output arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Input alignment file.",
        "-i, --input".green(), "FILE".yellow());
    println!("    {:KEY$} {:VAL$}  Prefix for tree, log and state output files (overwritten if present).",
        "-p, --prefix".green(), "PATH".yellow());

    println!("\n{}", "Tree inference:".bold());
    println!("    {:KEY$} {:VAL$}  Outgroup sequence, at which the tree is rooted [{}].",
        "-g, --outgroup".green(), "STR".yellow(), defaults.params.outgroup);
    println!("    {:KEY$} {:VAL$}  Substitution model [{}].",
        "-m, --model".green(), "STR".yellow(), defaults.params.model);
    println!("    {:KEY$} {:VAL$}  Disable the accelerated tree-search heuristic.",
        "    --thorough".green(), "");
    println!("    {:KEY$} {:VAL$}  Skip ancestral state reconstruction.",
        "    --no-asr".green(), "");

    println!("\n{}", "Execution parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Number of threads [{}].",
        "-@, --threads".green(), "INT".yellow(), defaults.params.threads);
    println!("    {:KEY$} {:VAL$}  Kill the tree builder after this many seconds, 0 = unlimited [0].",
        "    --timeout".green(), "SEC".yellow());
    println!("    {:KEY$} {:VAL$}  IQ-TREE 2 executable [{}].",
        "    --iqtree".green(), "EXE".yellow(), defaults.params.iqtree.display());

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
            Short('p') | Long("prefix") => args.prefix = Some(parser.value()?.parse()?),

            Short('g') | Long("outgroup") => args.params.outgroup = parser.value()?.parse()?,
            Short('m') | Long("model") => args.params.model = parser.value()?.parse()?,
            Long("thorough") => args.params.fast = false,
            Long("no-asr") => args.params.ancestral = false,

            Short('@') | Long("threads") => args.params.threads = parser.value()?.parse()?,
            Long("timeout") => args.params.timeout = super::parse_timeout(&mut parser)?,
            Long("iqtree") => args.params.iqtree = parser.value()?.parse()?,

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

pub(super) fn run(argv: &[String]) -> Result<(), Error> {
    let args = parse_args(argv)?.validate()?;
    // unwrap as both paths were checked to be Some in validate().
    let input = args.input.as_ref().unwrap();
    let prefix = args.prefix.as_ref().unwrap();

    sys_ext::nonempty_file(input)?;
    iqtree::infer(&args.params, input, prefix)?;
    log::info!("Tree files written under prefix {}", fmt_ext::path(prefix));
    Ok(())
}
