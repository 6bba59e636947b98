//! Per-sample genotype loading from caller output and `hla_types.txt` files

use crate::{allele::normalize, utils::open_reader, Allele, HlamaError, HlamaResult, Locus};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

/// Result table columns holding the two calls of each locus
const TABLE_COLUMNS: [(&str, Locus); 6] = [
    ("A1", Locus::A),
    ("A2", Locus::A),
    ("B1", Locus::B),
    ("B2", Locus::B),
    ("C1", Locus::C),
    ("C2", Locus::C),
];

/// Diploid genotype of one sample: exactly two alleles at each of A, B and C.
///
/// The two alleles of a locus are stored sorted; a homozygous locus holds the
/// same allele twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genotype {
    calls: BTreeMap<Locus, [Allele; 2]>,
}

impl Genotype {
    /// Group normalized alleles by locus, requiring exactly two calls at each
    /// of A, B and C. Alleles at other loci are ignored.
    pub fn from_alleles(alleles: Vec<Allele>) -> HlamaResult<Self> {
        let mut grouped: BTreeMap<Locus, Vec<Allele>> = BTreeMap::new();
        for allele in alleles {
            match Locus::from_name(&allele.locus) {
                Some(locus) => grouped.entry(locus).or_default().push(allele),
                None => log::debug!("Ignoring call {} outside loci A, B, C", allele.full_name()),
            }
        }

        let mut calls = BTreeMap::new();
        for locus in Locus::ALL {
            let mut alleles = grouped.remove(&locus).ok_or(HlamaError::MissingLocus(locus))?;
            alleles.sort();
            let pair = <[Allele; 2]>::try_from(alleles).map_err(|v| {
                HlamaError::IncompleteGenotype {
                    locus,
                    count: v.len(),
                }
            })?;
            calls.insert(locus, pair);
        }

        Ok(Genotype { calls })
    }

    pub fn pair(&self, locus: Locus) -> &[Allele; 2] {
        // from_alleles guarantees every locus is present
        &self.calls[&locus]
    }

    pub fn is_homozygous(&self, locus: Locus) -> bool {
        let [first, second] = self.pair(locus);
        first == second
    }

    /// All six alleles sorted by locus, group and protein
    pub fn alleles(&self) -> impl Iterator<Item = &Allele> {
        self.calls.values().flat_map(|pair| pair.iter())
    }

    /// The `hla_types.txt` representation: one allele per line, sorted
    pub fn to_sorted_lines(&self) -> String {
        let mut text = String::new();
        for allele in self.alleles() {
            text.push_str(&allele.to_string());
            text.push('\n');
        }
        text
    }
}

/// Parse raw caller output, either one allele per line or a result table
/// with `A1 A2 B1 B2 C1 C2` columns.
pub fn parse_caller_output<R: BufRead>(reader: R) -> HlamaResult<Genotype> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }

    let first = lines
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && !l.starts_with('#'));

    let alleles = match first {
        Some(header) if is_table_header(header) => parse_result_table(&lines.join("\n"))?,
        _ => parse_allele_lines(&lines)?,
    };

    Genotype::from_alleles(alleles)
}

/// Load a sample's genotype from a caller output or `hla_types.txt` file
pub fn load_genotype<P: AsRef<Path>>(path: P) -> HlamaResult<Genotype> {
    let reader = open_reader(&path)?;
    let genotype = parse_caller_output(reader)?;
    log::debug!(
        "Loaded genotype from {}: {}",
        path.as_ref().display(),
        genotype.alleles().map(|a| a.to_string()).collect::<Vec<_>>().join(",")
    );
    Ok(genotype)
}

fn is_table_header(line: &str) -> bool {
    let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();
    fields.contains(&"A1") && fields.contains(&"A2")
}

fn parse_allele_lines(lines: &[String]) -> HlamaResult<Vec<Allele>> {
    let mut alleles = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // trailing columns such as scores are ignored
        let call = line.split_whitespace().next().unwrap_or(line);
        alleles.push(normalize(call)?);
    }
    Ok(alleles)
}

fn parse_result_table(text: &str) -> HlamaResult<Vec<Allele>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = csv_reader.headers()?.clone();
    let columns: Vec<(usize, Locus)> = TABLE_COLUMNS
        .iter()
        .filter_map(|(name, locus)| {
            headers
                .iter()
                .position(|h| h.trim() == *name)
                .map(|idx| (idx, *locus))
        })
        .collect();

    let mut alleles = Vec::new();
    if let Some(result) = csv_reader.records().next() {
        let record = result?;
        for (idx, _) in columns {
            match record.get(idx).map(|f| f.trim()) {
                Some(call) if !call.is_empty() => alleles.push(normalize(call)?),
                _ => {}
            }
        }
    }

    Ok(alleles)
}
