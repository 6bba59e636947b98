//! Cross-sample genotype comparison and loss-of-heterozygosity detection

use crate::{
    genotype::Genotype, Allele, CompareConfig, HlamaError, HlamaResult, Locus,
    ReferencePolicy, Role, Sample,
};
use serde::Serialize;

/// Genotype of a sample, or the reason none could be obtained
#[derive(Debug, Clone)]
pub enum SampleCall {
    Called(Genotype),
    Unavailable(String),
}

/// A sample together with the outcome of typing it
#[derive(Debug, Clone)]
pub struct TypedSample {
    pub sample: Sample,
    pub call: SampleCall,
}

impl TypedSample {
    pub fn new(sample: Sample, call: HlamaResult<Genotype>) -> Self {
        let call = match call {
            Ok(genotype) => SampleCall::Called(genotype),
            Err(e) => SampleCall::Unavailable(e.to_string()),
        };
        Self { sample, call }
    }
}

/// Relation of one sample's alleles at a locus to the reference sample's
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleStatus {
    Reference,
    Match,
    /// Some reference alleles are absent and nothing new appeared.
    /// `lost` lists the reference haplotypes not found in the sample.
    Loss { lost: Vec<Allele> },
    /// The sample carries alleles the reference lacks, and lost none
    Gain { gained: Vec<Allele> },
    Mismatch {
        lost: Vec<Allele>,
        gained: Vec<Allele>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocusClass {
    Concordant,
    PartialLoss,
    Discordant,
}

impl LocusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocusClass::Concordant => "CONCORDANT",
            LocusClass::PartialLoss => "PARTIAL_LOSS",
            LocusClass::Discordant => "DISCORDANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleComparison {
    pub role: Role,
    pub pair: [Allele; 2],
    #[serde(flatten)]
    pub status: SampleStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocusComparison {
    pub locus: Locus,
    pub class: LocusClass,
    pub samples: Vec<SampleComparison>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnavailableSample {
    pub role: Role,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DonorOutcome {
    Compared {
        reference: Role,
        loci: Vec<LocusComparison>,
        unavailable: Vec<UnavailableSample>,
    },
    /// No sample of the donor could be typed
    Skipped { unavailable: Vec<UnavailableSample> },
    /// The donor's table rows were invalid
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DonorResult {
    pub donor_id: String,
    #[serde(flatten)]
    pub outcome: DonorOutcome,
}

impl DonorResult {
    pub fn failed(donor_id: &str, error: &HlamaError) -> Self {
        Self {
            donor_id: donor_id.to_string(),
            outcome: DonorOutcome::Failed {
                message: error.to_string(),
            },
        }
    }

    /// Loci where some sample misses reference alleles without carrying new
    /// ones. A locus that is partial loss only through `Gain` is not listed.
    pub fn loss_loci(&self) -> Vec<Locus> {
        match &self.outcome {
            DonorOutcome::Compared { loci, .. } => loci
                .iter()
                .filter(|l| {
                    l.samples
                        .iter()
                        .any(|s| matches!(s.status, SampleStatus::Loss { .. }))
                })
                .map(|l| l.locus)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Validate comparison configuration parameters
pub fn validate_compare_config(config: &CompareConfig) -> HlamaResult<()> {
    if let ReferencePolicy::Roles(roles) = &config.reference {
        if roles.iter().any(|r| r.trim().is_empty()) {
            return Err(HlamaError::InvalidConfig(
                "reference roles must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Compare the samples of one donor at loci A, B and C
pub fn compare_donor(
    donor_id: &str,
    samples: &[TypedSample],
    config: &CompareConfig,
) -> DonorResult {
    let mut available: Vec<(&Role, &Genotype)> = Vec::new();
    let mut unavailable = Vec::new();

    for typed in samples {
        match &typed.call {
            SampleCall::Called(genotype) => available.push((&typed.sample.role, genotype)),
            SampleCall::Unavailable(reason) => unavailable.push(UnavailableSample {
                role: typed.sample.role.clone(),
                reason: reason.clone(),
            }),
        }
    }

    if available.is_empty() {
        log::warn!("Skipping donor {}: no loadable samples", donor_id);
        return DonorResult {
            donor_id: donor_id.to_string(),
            outcome: DonorOutcome::Skipped { unavailable },
        };
    }

    let roles: Vec<&Role> = available.iter().map(|(role, _)| *role).collect();
    let reference = select_reference(&roles, &config.reference);
    log::debug!(
        "Donor {}: comparing {} samples against {}",
        donor_id,
        available.len(),
        available[reference].0
    );

    let loci = Locus::ALL
        .iter()
        .map(|&locus| compare_locus(locus, reference, &available))
        .collect();

    DonorResult {
        donor_id: donor_id.to_string(),
        outcome: DonorOutcome::Compared {
            reference: available[reference].0.clone(),
            loci,
            unavailable,
        },
    }
}

/// Index of the reference sample among the available ones. `roles` must not
/// be empty.
pub fn select_reference(roles: &[&Role], policy: &ReferencePolicy) -> usize {
    match policy {
        ReferencePolicy::Roles(preferred) => preferred
            .iter()
            .find_map(|want| roles.iter().position(|role| role.as_str() == want.as_str()))
            .unwrap_or(0),
        ReferencePolicy::FirstSample => 0,
    }
}

fn compare_locus(
    locus: Locus,
    reference: usize,
    available: &[(&Role, &Genotype)],
) -> LocusComparison {
    let reference_pair = available[reference].1.pair(locus);

    let samples: Vec<SampleComparison> = available
        .iter()
        .enumerate()
        .map(|(i, (role, genotype))| {
            let pair = genotype.pair(locus);
            let status = if i == reference {
                SampleStatus::Reference
            } else {
                classify_pair(reference_pair, pair)
            };
            SampleComparison {
                role: (*role).clone(),
                pair: pair.clone(),
                status,
            }
        })
        .collect();

    let class = classify_locus(&samples);
    LocusComparison {
        locus,
        class,
        samples,
    }
}

/// Classify a sample's pair against the reference pair.
///
/// The status follows the distinct alleles on each side; the alleles listed
/// as lost are counted per haplotype so a homozygous reference losing both
/// copies reports the allele twice.
pub fn classify_pair(reference: &[Allele; 2], sample: &[Allele; 2]) -> SampleStatus {
    let novel: Vec<Allele> = distinct(sample)
        .into_iter()
        .filter(|allele| !reference.contains(allele))
        .collect();
    let missing = distinct(reference)
        .iter()
        .any(|allele| !sample.contains(allele));

    match (missing, novel.is_empty()) {
        (false, true) => SampleStatus::Match,
        (true, true) => SampleStatus::Loss {
            lost: multiset_difference(reference, sample),
        },
        (false, false) => SampleStatus::Gain { gained: novel },
        (true, false) => SampleStatus::Mismatch {
            lost: multiset_difference(reference, sample),
            gained: multiset_difference(sample, reference),
        },
    }
}

fn classify_locus(samples: &[SampleComparison]) -> LocusClass {
    let mut class = LocusClass::Concordant;
    for sample in samples {
        match sample.status {
            SampleStatus::Mismatch { .. } => return LocusClass::Discordant,
            SampleStatus::Loss { .. } | SampleStatus::Gain { .. } => {
                class = LocusClass::PartialLoss
            }
            SampleStatus::Reference | SampleStatus::Match => {}
        }
    }
    class
}

fn distinct(pair: &[Allele; 2]) -> Vec<Allele> {
    let mut alleles = pair.to_vec();
    alleles.sort();
    alleles.dedup();
    alleles
}

/// Alleles of `from` left after removing one copy per allele of `other`
fn multiset_difference(from: &[Allele; 2], other: &[Allele; 2]) -> Vec<Allele> {
    let mut remaining: Vec<&Allele> = other.iter().collect();
    let mut difference = Vec::new();
    for allele in from {
        match remaining.iter().position(|a| *a == allele) {
            Some(idx) => {
                remaining.swap_remove(idx);
            }
            None => difference.push(allele.clone()),
        }
    }
    difference.sort();
    difference
}
