//! End-to-end runs: description table to per-sample genotypes and report

use crate::{
    caller::{run_callers, HlaCaller},
    compare::{compare_donor, DonorResult, TypedSample},
    donors::{group_donors, read_description_table},
    genotype::{load_genotype, Genotype},
    report::{
        persist_genotype, write_json_report, write_report, HLA_TYPES_FILE, JSON_REPORT_FILE,
        REPORT_FILE,
    },
    utils::Timer,
    CompareConfig, Donor, HlamaResult, Sample,
};
use std::path::{Path, PathBuf};

/// Inputs and settings of a run
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub description_table: PathBuf,
    pub reads_base_dir: PathBuf,
    pub work_dir: PathBuf,
    pub compare: CompareConfig,
    pub num_processes: usize,
    pub json_report: bool,
}

/// Directory of a sample below the work directory, `<donor>_<role>.d`
pub fn sample_dir(work_dir: &Path, sample: &Sample) -> PathBuf {
    work_dir.join(sample.dir_name())
}

/// Type every sample with `caller`, persist the normalized genotypes and
/// write the comparison report into the work directory.
pub fn run_tumor_normal<C: HlaCaller + ?Sized>(
    config: &WorkflowConfig,
    caller: &C,
) -> HlamaResult<Vec<DonorResult>> {
    let groups = read_groups(config)?;

    let jobs: Vec<(Sample, PathBuf)> = valid_samples(&groups)
        .map(|sample| (sample.clone(), sample_dir(&config.work_dir, sample)))
        .collect();
    log::info!("Typing {} samples", jobs.len());

    let called = {
        let _timer = Timer::new("Running HLA caller");
        run_callers(caller, &jobs, config.num_processes)?
    };

    let _timer = Timer::new("Loading genotypes");
    let typed: Vec<TypedSample> = jobs
        .into_iter()
        .zip(called)
        .map(|((sample, dir), raw)| {
            let genotype = raw.and_then(|path| load_and_persist(&path, &dir));
            if let Err(e) = &genotype {
                log::warn!("Sample {} unavailable: {}", sample.name(), e);
            }
            TypedSample::new(sample, genotype)
        })
        .collect();

    finish(config, groups, typed)
}

/// Compare the `hla_types.txt` files already present in the work directory
/// without invoking the caller.
pub fn run_compare_only(config: &WorkflowConfig) -> HlamaResult<Vec<DonorResult>> {
    let groups = read_groups(config)?;

    let _timer = Timer::new("Loading genotypes");
    let typed: Vec<TypedSample> = valid_samples(&groups)
        .map(|sample| {
            let path = sample_dir(&config.work_dir, sample).join(HLA_TYPES_FILE);
            let genotype = load_genotype(&path);
            if let Err(e) = &genotype {
                log::warn!("Sample {} unavailable: {}", sample.name(), e);
            }
            TypedSample::new(sample.clone(), genotype)
        })
        .collect();

    finish(config, groups, typed)
}

fn read_groups(config: &WorkflowConfig) -> HlamaResult<Vec<(String, HlamaResult<Donor>)>> {
    let samples = read_description_table(&config.description_table, &config.reads_base_dir)?;
    let groups = group_donors(samples);
    log::info!("Found {} donors", groups.len());
    std::fs::create_dir_all(&config.work_dir)?;
    Ok(groups)
}

fn valid_samples(groups: &[(String, HlamaResult<Donor>)]) -> impl Iterator<Item = &Sample> {
    groups
        .iter()
        .filter_map(|(_, donor)| donor.as_ref().ok())
        .flat_map(|donor| donor.samples.iter())
}

fn load_and_persist(raw: &Path, sample_dir: &Path) -> HlamaResult<Genotype> {
    let genotype = load_genotype(raw)?;
    persist_genotype(sample_dir, &genotype)?;
    Ok(genotype)
}

/// Compare donors in table order and write the reports. `typed` holds the
/// samples of all valid donors in the same order.
fn finish(
    config: &WorkflowConfig,
    groups: Vec<(String, HlamaResult<Donor>)>,
    typed: Vec<TypedSample>,
) -> HlamaResult<Vec<DonorResult>> {
    let _timer = Timer::new("Comparing donors");
    let mut typed = typed.into_iter();

    let results: Vec<DonorResult> = groups
        .into_iter()
        .map(|(donor_id, donor)| match donor {
            Ok(donor) => {
                let samples: Vec<TypedSample> =
                    typed.by_ref().take(donor.samples.len()).collect();
                compare_donor(&donor_id, &samples, &config.compare)
            }
            Err(e) => {
                log::warn!("Donor {} not compared: {}", donor_id, e);
                DonorResult::failed(&donor_id, &e)
            }
        })
        .collect();

    for result in &results {
        let loss = result.loss_loci();
        if !loss.is_empty() {
            let loci: Vec<&str> = loss.iter().map(|l| l.as_str()).collect();
            log::info!(
                "Donor {}: allele loss at locus {}",
                result.donor_id,
                loci.join(", ")
            );
        }
    }

    write_report(config.work_dir.join(REPORT_FILE), &results)?;
    if config.json_report {
        write_json_report(config.work_dir.join(JSON_REPORT_FILE), &results)?;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{DonorOutcome, LocusClass};
    use crate::{HlamaError, Locus, ReferencePolicy};
    use std::collections::{HashMap, HashSet};
    use tempfile::TempDir;

    const DONORS_TSV: &str = "donor1\tnormal\tdonor1_normal.fq\n\
                              donor1\ttumor\tdonor1_tumor.fq\n\
                              donor1\ttumor_rna\tdonor1_tumor_rna.fq\n\
                              donor2\tnormal\tdonor2_normal.fq\n\
                              donor2\ttumor\tdonor2_tumor.fq\n";

    const DONOR1: &str = "\tA1\tA2\tB1\tB2\tC1\tC2\tReads\tObjective\n\
                          0\tA*02:01\tA*02:74\tB*15:01\tB*53:01\tC*04:01\tC*07:02\t812.0\t790.3\n";
    const DONOR1_RNA: &str = "\tA1\tA2\tB1\tB2\tC1\tC2\tReads\tObjective\n\
                              0\tA*02:01\tA*02:01\tB*53:01\tB*15:01\tC*07:02\tC*04:01\t301.0\t288.1\n";
    const DONOR2: &str = "C*18:01\nB*27:05:02\nA*24:02:01:01\nA*01:01:01:01\nC*02:02\nB*27:04\n";

    /// Serves canned caller output per sample
    struct FixtureCaller {
        outputs: HashMap<String, &'static str>,
    }

    impl FixtureCaller {
        fn new(outputs: &[(&str, &'static str)]) -> Self {
            Self {
                outputs: outputs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            }
        }
    }

    impl HlaCaller for FixtureCaller {
        fn call(&self, sample: &Sample, out_dir: &Path) -> HlamaResult<PathBuf> {
            let text = self
                .outputs
                .get(&sample.name())
                .ok_or_else(|| HlamaError::CallerInvocation("exited with status 1".to_string()))?;
            std::fs::create_dir_all(out_dir)?;
            let path = out_dir.join(format!("{}_result.tsv", sample.name()));
            std::fs::write(&path, text)?;
            Ok(path)
        }
    }

    fn setup(table: &str) -> (TempDir, WorkflowConfig) {
        let temp_dir = TempDir::new().unwrap();
        let table_path = temp_dir.path().join("donors.tsv");
        std::fs::write(&table_path, table).unwrap();

        let config = WorkflowConfig {
            description_table: table_path,
            reads_base_dir: temp_dir.path().to_path_buf(),
            work_dir: temp_dir.path().join("work"),
            compare: CompareConfig::default(),
            num_processes: 2,
            json_report: false,
        };
        (temp_dir, config)
    }

    fn read_lines(path: PathBuf) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    fn tumor_normal_caller() -> FixtureCaller {
        FixtureCaller::new(&[
            ("donor1_normal", DONOR1),
            ("donor1_tumor", DONOR1),
            ("donor1_tumor_rna", DONOR1_RNA),
            ("donor2_normal", DONOR2),
            ("donor2_tumor", DONOR2),
        ])
    }

    fn expected_report() -> HashSet<String> {
        let mut lines = vec!["#donor\tlocus\tsample\tgenotype\tstatus\tdetail".to_string()];
        let donor1 = [
            ("A", "A*02:01/A*02:74"),
            ("B", "B*15:01/B*53:01"),
            ("C", "C*04:01/C*07:02"),
        ];
        for (locus, genotype) in donor1 {
            lines.push(format!("donor1\t{}\tnormal\t{}\tREFERENCE\t.", locus, genotype));
            lines.push(format!("donor1\t{}\ttumor\t{}\tMATCH\t.", locus, genotype));
        }
        lines.push("donor1\tA\ttumor_rna\tA*02:01/A*02:01\tLOSS\tlost=A*02:74".to_string());
        lines.push("donor1\tB\ttumor_rna\tB*15:01/B*53:01\tMATCH\t.".to_string());
        lines.push("donor1\tC\ttumor_rna\tC*04:01/C*07:02\tMATCH\t.".to_string());
        lines.push("donor1\tA\t*\t.\tPARTIAL_LOSS\treference=normal".to_string());
        lines.push("donor1\tB\t*\t.\tCONCORDANT\treference=normal".to_string());
        lines.push("donor1\tC\t*\t.\tCONCORDANT\treference=normal".to_string());

        let donor2 = [
            ("A", "A*01:01/A*24:02"),
            ("B", "B*27:04/B*27:05"),
            ("C", "C*02:02/C*18:01"),
        ];
        for (locus, genotype) in donor2 {
            lines.push(format!("donor2\t{}\tnormal\t{}\tREFERENCE\t.", locus, genotype));
            lines.push(format!("donor2\t{}\ttumor\t{}\tMATCH\t.", locus, genotype));
            lines.push(format!("donor2\t{}\t*\t.\tCONCORDANT\treference=normal", locus));
        }
        lines.into_iter().collect()
    }

    #[test]
    fn test_tumor_normal_run() {
        let (_temp_dir, config) = setup(DONORS_TSV);
        let results = run_tumor_normal(&config, &tumor_normal_caller()).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].loss_loci(), vec![Locus::A]);
        assert!(results[1].loss_loci().is_empty());

        let report: HashSet<String> =
            read_lines(config.work_dir.join(REPORT_FILE)).into_iter().collect();
        assert_eq!(report, expected_report());

        let donor1 = vec!["A*02:01", "A*02:74", "B*15:01", "B*53:01", "C*04:01", "C*07:02"];
        let donor1_rna = vec!["A*02:01", "A*02:01", "B*15:01", "B*53:01", "C*04:01", "C*07:02"];
        let donor2 = vec!["A*01:01", "A*24:02", "B*27:04", "B*27:05", "C*02:02", "C*18:01"];
        for (dir, expected) in [
            ("donor1_normal.d", &donor1),
            ("donor1_tumor.d", &donor1),
            ("donor1_tumor_rna.d", &donor1_rna),
            ("donor2_normal.d", &donor2),
            ("donor2_tumor.d", &donor2),
        ] {
            assert_eq!(
                &read_lines(config.work_dir.join(dir).join(HLA_TYPES_FILE)),
                expected,
                "{}",
                dir
            );
        }
        assert!(!config.work_dir.join(JSON_REPORT_FILE).exists());
    }

    #[test]
    fn test_compare_only_matches_full_run() {
        let (_temp_dir, mut config) = setup(DONORS_TSV);
        run_tumor_normal(&config, &tumor_normal_caller()).unwrap();
        let full = std::fs::read_to_string(config.work_dir.join(REPORT_FILE)).unwrap();

        config.json_report = true;
        let results = run_compare_only(&config).unwrap();
        let compared = std::fs::read_to_string(config.work_dir.join(REPORT_FILE)).unwrap();

        assert_eq!(full, compared);
        assert_eq!(results[0].loss_loci(), vec![Locus::A]);
        assert!(config.work_dir.join(JSON_REPORT_FILE).exists());
    }

    #[test]
    fn test_failures_are_isolated_and_reported() {
        let table = format!(
            "{}donor3\tnormal\tdonor3_normal.fq\n\
             donor3\tnormal\tdonor3_normal_again.fq\n\
             donor4\tnormal\tdonor4_normal.fq\n",
            DONORS_TSV
        );
        let (_temp_dir, config) = setup(&table);
        let caller = FixtureCaller::new(&[
            ("donor1_normal", DONOR1),
            ("donor1_tumor", "A*02:01\nA*02:74\nC*04:01\nC*07:02\n"),
            ("donor1_tumor_rna", DONOR1_RNA),
            ("donor2_normal", DONOR2),
            ("donor2_tumor", "A*01:01\nA*2401\n"),
        ]);

        let results = run_tumor_normal(&config, &caller).unwrap();
        assert_eq!(results.len(), 4);

        match &results[0].outcome {
            DonorOutcome::Compared { unavailable, loci, .. } => {
                assert_eq!(unavailable.len(), 1);
                assert_eq!(unavailable[0].role.as_str(), "tumor");
                assert_eq!(loci[0].class, LocusClass::PartialLoss);
            }
            other => panic!("donor1 should be compared: {:?}", other),
        }
        assert!(matches!(results[2].outcome, DonorOutcome::Failed { .. }));
        assert!(matches!(results[3].outcome, DonorOutcome::Skipped { .. }));

        let report = read_lines(config.work_dir.join(REPORT_FILE));
        assert!(report.contains(
            &"donor1\t*\ttumor\t.\tUNAVAILABLE\tMissing locus: no calls for locus B".to_string()
        ));
        assert!(report.contains(
            &"donor2\t*\ttumor\t.\tUNAVAILABLE\tMalformed allele: \"A*2401\"".to_string()
        ));
        assert!(report.contains(
            &"donor3\t*\t*\t.\tERROR\tDuplicate role \"normal\" for donor \"donor3\"".to_string()
        ));
        assert!(report.contains(
            &"donor4\t*\tnormal\t.\tUNAVAILABLE\tHLA caller failed: exited with status 1".to_string()
        ));
        assert!(report.contains(&"donor4\t*\t*\t.\tSKIPPED\tno loadable samples".to_string()));
        assert!(report.contains(&"donor2\tA\t*\t.\tCONCORDANT\treference=normal".to_string()));

        assert!(!config.work_dir.join("donor1_tumor.d").join(HLA_TYPES_FILE).exists());
        assert!(!config.work_dir.join("donor3_normal.d").exists());
    }

    #[test]
    fn test_first_sample_reference_policy() {
        let table = "donor1\ttumor_rna\tr.fq\ndonor1\tnormal\tn.fq\n";
        let (_temp_dir, mut config) = setup(table);
        config.compare.reference = ReferencePolicy::FirstSample;

        let results = run_tumor_normal(&config, &tumor_normal_caller()).unwrap();
        match &results[0].outcome {
            DonorOutcome::Compared { reference, loci, .. } => {
                assert_eq!(reference.as_str(), "tumor_rna");
                assert_eq!(loci[0].class, LocusClass::PartialLoss);
            }
            other => panic!("expected comparison, got {:?}", other),
        }
        // normal gains A*02:74 over the homozygous tumor_rna reference
        assert!(results[0].loss_loci().is_empty());
    }

    #[test]
    fn test_invalid_table_is_fatal() {
        let (_temp_dir, config) = setup("donor1\tnormal\n");
        assert!(matches!(
            run_tumor_normal(&config, &tumor_normal_caller()),
            Err(HlamaError::InvalidTable(_))
        ));
        assert!(!config.work_dir.join(REPORT_FILE).exists());
    }

    #[test]
    fn test_colliding_sample_directories_are_fatal() {
        let (_temp_dir, config) = setup("a_b\tc\tr1.fq\na\tb_c\tr2.fq\n");
        let caller = FixtureCaller::new(&[("a_b_c", DONOR1)]);

        assert!(matches!(
            run_tumor_normal(&config, &caller),
            Err(HlamaError::InvalidTable(_))
        ));
        assert!(!config.work_dir.join("a_b_c.d").exists());
        assert!(!config.work_dir.join(REPORT_FILE).exists());
    }
}
