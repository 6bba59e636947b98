//! Combined CLI binary for hlama - types every sample and compares donors in one step

use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use hlama_rs::{
    caller::{CommandCaller, DEFAULT_CALLER_CMD, DEFAULT_CALLER_RESULT},
    compare::{validate_compare_config, DonorOutcome},
    report::REPORT_FILE,
    utils::{get_num_cpus, validate_dir_exists, validate_file_readable, Timer},
    workflow::{run_tumor_normal, WorkflowConfig},
    CompareConfig, HlamaError, HlamaResult, ReferencePolicy,
};

#[derive(Parser)]
#[command(name = "hlama")]
#[command(about = "hlama - HLA genotype comparison between samples of the same donor")]
#[command(long_about = "
hlama types the class-I HLA loci (A, B, C) of every sample listed in a
donor/sample description table and compares the genotypes of each donor's
samples, reporting concordance, discordance and loss of heterozygosity.

The description table is tab-separated without header: donor, role (e.g.
normal, tumor, tumor_rna) and one or more reads files. Relative reads paths
are resolved against --reads-base-dir.

For every sample a directory <donor>_<role>.d is created below the work
directory holding the caller output and hla_types.txt, the sorted normalized
allele list. The comparison report is written to <work-dir>/report.txt.

The caller command template may use the placeholders {reads}, {outdir},
{prefix} and {seqtype}.
")]
struct Args {
    /// Path to the donor/sample description table (TSV)
    #[arg(long, value_name = "FILE")]
    tumor_normal: PathBuf,

    /// Directory against which relative reads paths are resolved
    #[arg(long, value_name = "DIR", default_value = ".")]
    reads_base_dir: PathBuf,

    /// Directory receiving per-sample directories and the report
    #[arg(long, value_name = "DIR")]
    work_dir: PathBuf,

    /// Command template used to type one sample
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_CALLER_CMD)]
    caller_cmd: String,

    /// Result file written by the caller, relative to the sample directory
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_CALLER_RESULT)]
    caller_result: String,

    /// Reuse caller results left by an earlier run
    #[arg(long)]
    reuse_results: bool,

    /// Role of the reference sample; repeat to give a priority list
    #[arg(long = "reference-role", value_name = "ROLE", default_value = "normal")]
    reference_roles: Vec<String>,

    /// Use the first sample of each donor as reference regardless of role
    #[arg(long, conflicts_with = "reference_roles")]
    reference_first: bool,

    /// Also write report.json
    #[arg(long)]
    json_report: bool,

    /// Number of caller runs executed in parallel
    #[arg(long, default_value_t = get_num_cpus())]
    num_processes: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of an existing report
    #[arg(short, long)]
    force: bool,
}

fn run() -> HlamaResult<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    log::info!("Starting hlama tumor/normal comparison");
    log::info!("Description table: {:?}", args.tumor_normal);
    log::info!("Reads base directory: {:?}", args.reads_base_dir);
    log::info!("Work directory: {:?}", args.work_dir);
    log::info!("Number of processes: {}", args.num_processes);

    validate_file_readable(&args.tumor_normal)?;
    validate_dir_exists(&args.reads_base_dir)?;

    let report_path = args.work_dir.join(REPORT_FILE);
    if report_path.exists() && !args.force {
        return Err(HlamaError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("Report {:?} already exists. Use --force to overwrite.", report_path),
        )));
    }

    let compare = CompareConfig {
        reference: ReferencePolicy::from_args(args.reference_roles, args.reference_first),
    };
    validate_compare_config(&compare)?;
    log::info!("Reference sample policy: {}", compare.reference);

    let caller = CommandCaller::from_template(&args.caller_cmd, &args.caller_result)?
        .reuse_existing(args.reuse_results);

    let config = WorkflowConfig {
        description_table: args.tumor_normal,
        reads_base_dir: args.reads_base_dir,
        work_dir: args.work_dir,
        compare,
        num_processes: args.num_processes,
        json_report: args.json_report,
    };

    let _timer = Timer::new("hlama run");
    let results = run_tumor_normal(&config, &caller)?;

    let compared = results
        .iter()
        .filter(|r| matches!(r.outcome, DonorOutcome::Compared { .. }))
        .count();
    let with_loss = results.iter().filter(|r| !r.loss_loci().is_empty()).count();

    log::info!("Comparison summary:");
    log::info!("  Donors: {}", results.len());
    log::info!("  Compared: {}", compared);
    log::info!("  With allele loss: {}", with_loss);
    log::info!("Report written to: {:?}", report_path);

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: HlamaError) -> ! {
    match error {
        HlamaError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the description table and reads directory exist.");
        }
        HlamaError::InvalidTable(msg) => {
            eprintln!("Error: Invalid description table: {}", msg);
            eprintln!("Expected tab-separated rows of donor, role and reads path.");
        }
        HlamaError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check the caller and reference options.");
        }
        HlamaError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        HlamaError::Csv(ref e) => {
            eprintln!("Error: Could not read description table: {}", e);
        }
        other => {
            eprintln!("Error: {}", other);
            eprintln!("This is unexpected at run level. Please report this issue.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from([
            "hlama",
            "--tumor-normal",
            "donors.tsv",
            "--work-dir",
            "work",
        ])
        .unwrap();

        assert_eq!(args.reference_roles, vec!["normal".to_string()]);
        assert!(!args.reference_first);
        assert_eq!(args.caller_cmd, DEFAULT_CALLER_CMD);
        assert_eq!(args.caller_result, DEFAULT_CALLER_RESULT);
        assert_eq!(args.reads_base_dir, PathBuf::from("."));
        assert!(args.num_processes >= 1);
    }

    #[test]
    fn test_reference_options() {
        let args = Args::try_parse_from([
            "hlama",
            "--tumor-normal",
            "donors.tsv",
            "--work-dir",
            "work",
            "--reference-role",
            "germline",
            "--reference-role",
            "normal",
        ])
        .unwrap();
        assert_eq!(args.reference_roles, vec!["germline", "normal"]);

        let conflicting = Args::try_parse_from([
            "hlama",
            "--tumor-normal",
            "donors.tsv",
            "--work-dir",
            "work",
            "--reference-role",
            "germline",
            "--reference-first",
        ]);
        assert!(conflicting.is_err());
    }
}
