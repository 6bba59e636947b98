//! CLI binary comparing existing per-sample hla_types.txt files without calling

use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use hlama_rs::{
    compare::validate_compare_config,
    report::{HLA_TYPES_FILE, REPORT_FILE},
    utils::{validate_dir_exists, validate_file_readable, Timer},
    workflow::{run_compare_only, WorkflowConfig},
    CompareConfig, HlamaError, HlamaResult, ReferencePolicy,
};

#[derive(Parser)]
#[command(name = "hla_compare")]
#[command(about = "Compare already typed samples of each donor and write the report")]
#[command(long_about = "
This tool reruns only the comparison step of hlama. It expects the work
directory of an earlier run, where every sample directory <donor>_<role>.d
holds an hla_types.txt file, and rewrites <work-dir>/report.txt.

Samples whose hla_types.txt is missing or invalid are reported as
unavailable; the other samples of the donor are still compared.
")]
struct Args {
    /// Path to the donor/sample description table (TSV)
    #[arg(long, value_name = "FILE")]
    tumor_normal: PathBuf,

    /// Work directory of an earlier run
    #[arg(long, value_name = "DIR")]
    work_dir: PathBuf,

    /// Role of the reference sample; repeat to give a priority list
    #[arg(long = "reference-role", value_name = "ROLE", default_value = "normal")]
    reference_roles: Vec<String>,

    /// Use the first sample of each donor as reference regardless of role
    #[arg(long, conflicts_with = "reference_roles")]
    reference_first: bool,

    /// Also write report.json
    #[arg(long)]
    json_report: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
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

    log::info!("Description table: {:?}", args.tumor_normal);
    log::info!("Work directory: {:?}", args.work_dir);
    log::info!("Reading {} files of each sample", HLA_TYPES_FILE);

    validate_file_readable(&args.tumor_normal)?;
    validate_dir_exists(&args.work_dir)?;

    let compare = CompareConfig {
        reference: ReferencePolicy::from_args(args.reference_roles, args.reference_first),
    };
    validate_compare_config(&compare)?;

    let config = WorkflowConfig {
        description_table: args.tumor_normal,
        reads_base_dir: PathBuf::from("."),
        work_dir: args.work_dir,
        compare,
        num_processes: 1,
        json_report: args.json_report,
    };

    let _timer = Timer::new("Comparing typed samples");
    let results = run_compare_only(&config)?;

    log::info!("Compared {} donors", results.len());
    log::info!("Report written to: {:?}", config.work_dir.join(REPORT_FILE));

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: HlamaError) -> ! {
    match error {
        HlamaError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check the description table and work directory paths.");
        }
        HlamaError::InvalidTable(msg) => {
            eprintln!("Error: Invalid description table: {}", msg);
        }
        HlamaError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
        }
        HlamaError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        other => {
            eprintln!("Error: {}", other);
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
    use hlama_rs::genotype::Genotype;
    use hlama_rs::report::persist_genotype;
    use tempfile::TempDir;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_compare_existing_work_dir() {
        let temp_dir = TempDir::new().unwrap();
        let table = temp_dir.path().join("donors.tsv");
        std::fs::write(&table, "donor2\tnormal\tn.fq\ndonor2\ttumor\tt.fq\n").unwrap();

        let work_dir = temp_dir.path().join("work");
        let alleles = ["A*01:01", "A*24:02", "B*27:04", "B*27:05", "C*02:02", "C*18:01"];
        let genotype =
            Genotype::from_alleles(alleles.iter().map(|a| a.parse().unwrap()).collect()).unwrap();
        for role in ["normal", "tumor"] {
            persist_genotype(&work_dir.join(format!("donor2_{}.d", role)), &genotype).unwrap();
        }

        let config = WorkflowConfig {
            description_table: table,
            reads_base_dir: PathBuf::from("."),
            work_dir: work_dir.clone(),
            compare: CompareConfig::default(),
            num_processes: 1,
            json_report: false,
        };
        let results = run_compare_only(&config).unwrap();
        assert!(results[0].loss_loci().is_empty());

        let report = std::fs::read_to_string(work_dir.join(REPORT_FILE)).unwrap();
        assert_eq!(report.matches("CONCORDANT").count(), 3);
        assert!(!report.contains("UNAVAILABLE"));
    }
}
