mod align;
mod run;
mod tree;

use std::time::Duration;
use colored::Colorize;
use crate::Error;

const PKG_NAME: &'static str = env!("CARGO_PKG_NAME");

/// Print tool version.
fn print_version() {
    println!("{} {}", PKG_NAME.underline(), format!("v{}", env!("CARGO_PKG_VERSION")).green());
}

fn print_citation() {
    print_version();
    println!();
    println!("{}", "This tool only orchestrates external programs, please cite them instead:".bold());
    println!("* Katoh K, Standley DM. MAFFT multiple sequence alignment software version 7:");
    println!("  improvements in performance and usability. Mol Biol Evol. 2013;30(4):772-780.");
    println!("* Minh BQ, Schmidt HA, Chernomor O, et al. IQ-TREE 2: new models and efficient");
    println!("  methods for phylogenetic inference in the genomic era. Mol Biol Evol. 2020;37(5):1530-1534.");
}

fn print_help() {
    print_version();
    println!("\n{} {} command [arguments]",
        "Usage:".bold(), PKG_NAME);

    println!("\n{}", "[ Batch pipeline ]".bold());
    println!("    {:<7}  Align and build rooted trees for every sample in a directory.", "run".red());

    println!("\n{}", "[ Single steps ]".bold());
    println!("    {:<7}  Align one FASTA file with MAFFT.", "align".red());
    println!("    {:<7}  Infer a rooted phylogenetic tree from one alignment.", "tree".red());

    println!("\n{}", "[ General help ]".bold());
    println!("    {:<7}  Show this help message.", "help".red());
    println!("    {:<7}  Show version.", "version".red());
    println!("    {:<7}  Show citation information.", "cite".red());
}

/// Parses a `--timeout` value in seconds; 0 disables the limit.
fn parse_timeout(parser: &mut lexopt::Parser) -> Result<Option<Duration>, lexopt::Error> {
    use lexopt::prelude::*;
    let seconds: u64 = parser.value()?.parse()?;
    Ok((seconds > 0).then(|| Duration::from_secs(seconds)))
}

pub fn run(argv: &[String]) -> Result<(), Error> {
    if argv.len() <= 1 {
        print_help();
        std::process::exit(1);
    }
    match &argv[1] as &str {
        "run" => run::run(&argv[2..])?,
        "align" => align::run(&argv[2..])?,
        "tree" => tree::run(&argv[2..])?,
        "help" | "h" | "--help" | "-h" => print_help(),
        "version" | "--version" | "-V" => print_version(),
        "cite" => print_citation(),
        cmd => Err(lexopt::Error::from(format!("Unknown command '{}'", cmd)))?,
    }
    Ok(())
}
