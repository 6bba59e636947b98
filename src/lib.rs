//! # hlama - HLA genotype comparison across samples of one donor
//!
//! Compares the class-I HLA genotypes (loci A, B and C) called for several
//! samples of the same donor, such as normal tissue, tumor tissue and tumor
//! RNA, and reports matches, mismatches and allele losses between them.

pub mod allele;
pub mod caller;
pub mod compare;
pub mod donors;
pub mod genotype;
pub mod report;
pub mod utils;
pub mod workflow;

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// Classical class-I HLA loci compared by the tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Locus {
    A,
    B,
    C,
}

impl Locus {
    /// All compared loci in report order
    pub const ALL: [Locus; 3] = [Locus::A, Locus::B, Locus::C];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "A" => Some(Locus::A),
            "B" => Some(Locus::B),
            "C" => Some(Locus::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locus::A => "A",
            Locus::B => "B",
            Locus::C => "C",
        }
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HLA allele identified at group/protein resolution.
///
/// Fields beyond the protein field and the expression suffix are kept as they
/// were reported but take no part in equality, ordering or display, so the
/// same allele called at different resolutions compares equal.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "String")]
pub struct Allele {
    pub locus: String,
    pub group: u16,
    pub protein: u16,
    pub extra: Vec<String>,
    pub suffix: Option<char>,
}

impl Allele {
    pub fn new(locus: &str, group: u16, protein: u16) -> Self {
        Self {
            locus: locus.to_ascii_uppercase(),
            group,
            protein,
            extra: Vec::new(),
            suffix: None,
        }
    }

    fn key(&self) -> (&str, u16, u16) {
        (&self.locus, self.group, self.protein)
    }

    /// The name at the resolution it was reported, e.g. `A*02:01:01:02L`
    pub fn full_name(&self) -> String {
        let mut name = self.to_string();
        for field in &self.extra {
            name.push(':');
            name.push_str(field);
        }
        if let Some(suffix) = self.suffix {
            name.push(suffix);
        }
        name
    }
}

impl PartialEq for Allele {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Allele {}

impl Hash for Allele {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Allele {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Allele {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{:02}:{:02}", self.locus, self.group, self.protein)
    }
}

impl From<Allele> for String {
    fn from(allele: Allele) -> Self {
        allele.to_string()
    }
}

/// Tissue or source label of a sample, e.g. `normal`, `tumor`, `tumor_rna`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(label: &str) -> Self {
        Role(label.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the sample was sequenced from RNA rather than DNA
    pub fn is_rna(&self) -> bool {
        self.0.to_ascii_lowercase().contains("rna")
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sequenced sample of a donor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub donor_id: String,
    pub role: Role,
    pub reads: Vec<PathBuf>,
}

impl Sample {
    pub fn new(donor_id: &str, role: &str, reads: Vec<PathBuf>) -> Self {
        Self {
            donor_id: donor_id.to_string(),
            role: Role::new(role),
            reads,
        }
    }

    /// `<donor>_<role>`, used as file prefix for the sample
    pub fn name(&self) -> String {
        format!("{}_{}", self.donor_id, self.role)
    }

    /// Name of the sample's directory below the work directory
    pub fn dir_name(&self) -> String {
        format!("{}.d", self.name())
    }
}

/// A donor and its samples in description-table order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Donor {
    pub id: String,
    pub samples: Vec<Sample>,
}

/// How the reference sample for loss detection is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// First sample whose role matches the earliest listed role, falling
    /// back to the first available sample when none matches
    Roles(Vec<String>),
    /// Always the first available sample in table order
    FirstSample,
}

impl ReferencePolicy {
    pub fn from_args(roles: Vec<String>, first_sample: bool) -> Self {
        if first_sample {
            ReferencePolicy::FirstSample
        } else {
            ReferencePolicy::Roles(roles)
        }
    }
}

impl fmt::Display for ReferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferencePolicy::Roles(roles) => write!(f, "roles [{}]", roles.join(", ")),
            ReferencePolicy::FirstSample => f.write_str("first sample"),
        }
    }
}

/// Configuration of the cross-sample comparison
#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub reference: ReferencePolicy,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            reference: ReferencePolicy::Roles(vec!["normal".to_string()]),
        }
    }
}

/// Error types for the hlama library
#[derive(Debug, thiserror::Error)]
pub enum HlamaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed allele: {0:?}")]
    MalformedAllele(String),

    #[error("Incomplete genotype: locus {locus} has {count} calls, expected 2")]
    IncompleteGenotype { locus: Locus, count: usize },

    #[error("Missing locus: no calls for locus {0}")]
    MissingLocus(Locus),

    #[error("Duplicate role {role:?} for donor {donor:?}")]
    DuplicateRole { donor: String, role: String },

    #[error("HLA caller failed: {0}")]
    CallerInvocation(String),

    #[error("Invalid description table: {0}")]
    InvalidTable(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type HlamaResult<T> = Result<T, HlamaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allele_equality_ignores_resolution() {
        let mut high = Allele::new("A", 2, 1);
        high.extra = vec!["01".to_string(), "02".to_string()];
        high.suffix = Some('L');

        assert_eq!(high, Allele::new("A", 2, 1));
        assert_eq!(high.to_string(), "A*02:01");
        assert_eq!(high.full_name(), "A*02:01:01:02L");
    }

    #[test]
    fn test_allele_ordering() {
        let mut alleles = vec![
            Allele::new("B", 15, 1),
            Allele::new("A", 2, 74),
            Allele::new("A", 2, 1),
            Allele::new("A", 1, 101),
        ];
        alleles.sort();
        let names: Vec<String> = alleles.iter().map(|a| a.to_string()).collect();
        assert_eq!(names, vec!["A*01:101", "A*02:01", "A*02:74", "B*15:01"]);
    }

    #[test]
    fn test_allele_fields_sort_numerically() {
        let short = Allele::new("A", 2, 11);
        let long = Allele::new("A", 2, 101);
        assert!(short < long);
        assert!(Allele::new("A", 9, 1) < Allele::new("A", 10, 1));
    }

    #[test]
    fn test_sample_names() {
        let sample = Sample::new("donor1", "tumor_rna", Vec::new());
        assert_eq!(sample.name(), "donor1_tumor_rna");
        assert_eq!(sample.dir_name(), "donor1_tumor_rna.d");
        assert!(sample.role.is_rna());
        assert!(!Role::new("normal").is_rna());
    }

    #[test]
    fn test_reference_policy_from_args() {
        let roles = vec!["normal".to_string()];
        assert_eq!(
            ReferencePolicy::from_args(roles.clone(), false),
            ReferencePolicy::Roles(roles.clone())
        );
        assert_eq!(ReferencePolicy::from_args(roles, true), ReferencePolicy::FirstSample);
    }

    #[test]
    fn test_locus_names() {
        for locus in Locus::ALL {
            assert_eq!(Locus::from_name(locus.as_str()), Some(locus));
        }
        assert_eq!(Locus::from_name("DRB1"), None);
    }
}
