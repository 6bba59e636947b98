//! Report rendering and persistence of per-sample genotypes

use crate::{
    compare::{DonorOutcome, DonorResult, LocusComparison, SampleStatus, UnavailableSample},
    genotype::Genotype,
    utils::write_atomically,
    Allele, HlamaResult,
};
use std::path::{Path, PathBuf};

/// Normalized allele list written into each sample directory
pub const HLA_TYPES_FILE: &str = "hla_types.txt";
pub const REPORT_FILE: &str = "report.txt";
pub const JSON_REPORT_FILE: &str = "report.json";

pub const REPORT_HEADER: &str = "#donor\tlocus\tsample\tgenotype\tstatus\tdetail";

/// Render the comparison report: one tab-separated statement per line,
/// donors in table order, then loci A, B, C.
pub fn render_report(results: &[DonorResult]) -> String {
    let mut out = String::new();
    out.push_str(REPORT_HEADER);
    out.push('\n');
    for result in results {
        for line in report_lines(result) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Report lines of a single donor
pub fn report_lines(result: &DonorResult) -> Vec<String> {
    let donor = result.donor_id.as_str();
    let mut lines = Vec::new();

    match &result.outcome {
        DonorOutcome::Compared {
            reference,
            loci,
            unavailable,
        } => {
            push_unavailable(&mut lines, donor, unavailable);
            for locus in loci {
                push_locus(&mut lines, donor, reference.as_str(), locus);
            }
        }
        DonorOutcome::Skipped { unavailable } => {
            push_unavailable(&mut lines, donor, unavailable);
            lines.push(line(donor, "*", "*", ".", "SKIPPED", "no loadable samples"));
        }
        DonorOutcome::Failed { message } => {
            lines.push(line(donor, "*", "*", ".", "ERROR", &sanitize(message)));
        }
    }

    lines
}

fn push_unavailable(lines: &mut Vec<String>, donor: &str, unavailable: &[UnavailableSample]) {
    for sample in unavailable {
        lines.push(line(
            donor,
            "*",
            sample.role.as_str(),
            ".",
            "UNAVAILABLE",
            &sanitize(&sample.reason),
        ));
    }
}

fn push_locus(lines: &mut Vec<String>, donor: &str, reference: &str, locus: &LocusComparison) {
    let locus_name = locus.locus.as_str();

    for sample in &locus.samples {
        let genotype = format!("{}/{}", sample.pair[0], sample.pair[1]);
        let (status, detail) = match &sample.status {
            SampleStatus::Reference => ("REFERENCE", ".".to_string()),
            SampleStatus::Match => ("MATCH", ".".to_string()),
            SampleStatus::Loss { lost } => ("LOSS", format!("lost={}", join_alleles(lost))),
            SampleStatus::Gain { gained } => ("GAIN", format!("gained={}", join_alleles(gained))),
            SampleStatus::Mismatch { lost, gained } => (
                "MISMATCH",
                format!("lost={};gained={}", join_alleles(lost), join_alleles(gained)),
            ),
        };
        lines.push(line(
            donor,
            locus_name,
            sample.role.as_str(),
            &genotype,
            status,
            &detail,
        ));
    }

    lines.push(line(
        donor,
        locus_name,
        "*",
        ".",
        locus.class.as_str(),
        &format!("reference={}", reference),
    ));
}

fn line(
    donor: &str,
    locus: &str,
    sample: &str,
    genotype: &str,
    status: &str,
    detail: &str,
) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        donor, locus, sample, genotype, status, detail
    )
}

fn join_alleles(alleles: &[Allele]) -> String {
    alleles
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Keep free text on a single report field
fn sanitize(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

/// Write the text report to `path`
pub fn write_report<P: AsRef<Path>>(path: P, results: &[DonorResult]) -> HlamaResult<()> {
    write_atomically(&path, render_report(results).as_bytes())?;
    log::info!("Report written to {:?}", path.as_ref());
    Ok(())
}

/// Write the comparison results as JSON to `path`
pub fn write_json_report<P: AsRef<Path>>(path: P, results: &[DonorResult]) -> HlamaResult<()> {
    let mut json = serde_json::to_vec_pretty(results)?;
    json.push(b'\n');
    write_atomically(&path, &json)?;
    log::info!("JSON report written to {:?}", path.as_ref());
    Ok(())
}

/// Write the sample's sorted allele list into its directory
pub fn persist_genotype(sample_dir: &Path, genotype: &Genotype) -> HlamaResult<PathBuf> {
    let path = sample_dir.join(HLA_TYPES_FILE);
    write_atomically(&path, genotype.to_sorted_lines().as_bytes())?;
    Ok(path)
}
