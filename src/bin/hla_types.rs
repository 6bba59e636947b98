//! CLI binary normalizing one caller output into the sorted hla_types.txt format

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use std::io::Write;
use std::path::PathBuf;
use hlama_rs::{genotype::load_genotype, utils::write_atomically, Locus};

#[derive(Parser)]
#[command(name = "hla_types")]
#[command(about = "Normalize an HLA caller result into a sorted allele list")]
#[command(long_about = "
Reads the raw output of an HLA caller for a single sample, either one allele
per line or a result table with A1 A2 B1 B2 C1 C2 columns, and writes the six
class-I alleles normalized to group:protein resolution, one per line, sorted
by locus, group and protein.
")]
struct Args {
    /// Caller output file (plain or gzip compressed)
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Output file; standard output when omitted
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let genotype = load_genotype(&args.input)
        .with_context(|| format!("Failed to load genotype from {:?}", args.input))?;

    for locus in Locus::ALL {
        if genotype.is_homozygous(locus) {
            log::info!("Locus {} is homozygous", locus);
        }
    }

    let text = genotype.to_sorted_lines();
    match &args.output {
        Some(path) => {
            write_atomically(path, text.as_bytes())
                .with_context(|| format!("Failed to write {:?}", path))?;
            log::info!("Wrote {:?}", path);
        }
        None => {
            std::io::stdout()
                .write_all(text.as_bytes())
                .context("Failed to write to standard output")?;
        }
    }

    Ok(())
}
