//! Align a single FASTA file.

use std::{
    cmp::max,
    path::PathBuf,
};
use colored::Colorize;
use crate::{
    Error,
    err::validate_param,
    ext::{fmt as fmt_ext, sys as sys_ext},
    pipeline::mafft::{self, AlignParams},
};

struct Args {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    params: AlignParams,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            params: Default::default(),
        }
    }
}

impl Args {
    fn validate(mut self) -> Result<Self, Error> {
        self.params.threads = max(self.params.threads, 1);
        validate_param!(self.input.is_some(), "Input FASTA file is not provided (see -i/--input)");
        validate_param!(self.output.is_some(), "Output alignment path is not provided (see -o/--output)");
        self.params.mafft = sys_ext::find_exe(&self.params.mafft)?;
        Ok(self)
    }
}

fn print_help() {
    const KEY: usize = 16;
    const VAL: usize = 4;

    let defaults = Args::default();
    println!("{}", "Align one FASTA file with MAFFT.".yellow());

    println!("\n{} {} align -i genomes.fasta -o genomes_msa.fasta [arguments]",
        "Usage:".bold(), super::PKG_NAME);

    println!("\n{}", "Input/output arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Input FASTA file.",
        "-i, --input".green(), "FILE".yellow());
    println!("    {:KEY$} {:VAL$}  Output alignment file (overwritten if present).",
        "-o, --output".green(), "FILE".yellow());

    println!("\n{}", "Execution parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Number of threads [{}].",
        "-@, --threads".green(), "INT".yellow(), defaults.params.threads);
    println!("    {:KEY$} {:VAL$}  Kill the aligner after this many seconds, 0 = unlimited [0].",
        "    --timeout".green(), "SEC".yellow());
    println!("    {:KEY$} {:VAL$}  MAFFT executable [{}].",
        "    --mafft".green(), "EXE".yellow(), defaults.params.mafft.display());

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
            Short('o') | Long("output") => args.output = Some(parser.value()?.parse()?),

            Short('@') | Long("threads") => args.params.threads = parser.value()?.parse()?,
            Long("timeout") => args.params.timeout = super::parse_timeout(&mut parser)?,
            Long("mafft") => args.params.mafft = parser.value()?.parse()?,

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
    let output = args.output.as_ref().unwrap();

    sys_ext::nonempty_file(input)?;
    mafft::align(&args.params, input, output)?;
    log::info!("Alignment written to {}", fmt_ext::path(output));
    Ok(())
}
