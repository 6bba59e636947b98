//! Donor/sample description table reading and donor grouping

use crate::{utils::open_reader, Donor, HlamaError, HlamaResult, Sample};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read the tab-separated description table: donor, role, reads path and
/// optionally further reads paths (e.g. the second mate of a pair).
pub fn read_description_table<P: AsRef<Path>>(
    path: P,
    reads_base_dir: &Path,
) -> HlamaResult<Vec<Sample>> {
    let reader = open_reader(&path)?;
    parse_description_table(reader, reads_base_dir)
}

/// Parse a description table. A structurally invalid table is an error for
/// the whole run.
pub fn parse_description_table<R: Read>(
    reader: R,
    reads_base_dir: &Path,
) -> HlamaResult<Vec<Sample>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);

    let mut samples = Vec::new();
    let mut dir_owners: HashMap<String, (String, String)> = HashMap::new();

    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        if record.len() < 3 {
            return Err(HlamaError::InvalidTable(format!(
                "line {}: expected at least 3 columns, found {}",
                line,
                record.len()
            )));
        }

        let donor_id = record[0].trim();
        let role = record[1].trim();

        if donor_id.is_empty() || role.is_empty() {
            return Err(HlamaError::InvalidTable(format!(
                "line {}: empty donor or role",
                line
            )));
        }

        for (name, value) in [("donor", donor_id), ("role", role)] {
            if !is_valid_label(value) {
                return Err(HlamaError::InvalidTable(format!(
                    "line {}: invalid {} label {:?}",
                    line, name, value
                )));
            }
        }

        let reads: Vec<PathBuf> = record
            .iter()
            .skip(2)
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .map(|field| resolve_reads_path(reads_base_dir, field))
            .collect();

        if reads.is_empty() {
            return Err(HlamaError::InvalidTable(format!(
                "line {}: no reads path for {} {}",
                line, donor_id, role
            )));
        }

        let sample = Sample::new(donor_id, role, reads);
        // Distinct donor/role pairs must not share a sample directory; an
        // exact repeat is left to `group_donors` as a duplicate role.
        match dir_owners.get(&sample.dir_name()) {
            Some((owner, owner_role)) if owner != donor_id || owner_role != role => {
                return Err(HlamaError::InvalidTable(format!(
                    "line {}: {} {} collides with {} {} on sample directory {}",
                    line,
                    donor_id,
                    role,
                    owner,
                    owner_role,
                    sample.dir_name()
                )));
            }
            Some(_) => {}
            None => {
                dir_owners.insert(sample.dir_name(), (donor_id.to_string(), role.to_string()));
            }
        }

        samples.push(sample);
    }

    if samples.is_empty() {
        return Err(HlamaError::InvalidTable("no samples listed".to_string()));
    }

    log::info!("Read {} samples from description table", samples.len());
    Ok(samples)
}

/// Labels become part of directory names
fn is_valid_label(label: &str) -> bool {
    label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn resolve_reads_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Group samples into donors, keeping the order in which donors first
/// appear and the table order of samples within each donor. A donor listing
/// the same role twice yields a `DuplicateRole` error without affecting the
/// other donors.
pub fn group_donors(samples: Vec<Sample>) -> Vec<(String, HlamaResult<Donor>)> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<Sample>> = HashMap::new();

    for sample in samples {
        if !grouped.contains_key(&sample.donor_id) {
            order.push(sample.donor_id.clone());
        }
        grouped.entry(sample.donor_id.clone()).or_default().push(sample);
    }

    order
        .into_iter()
        .map(|donor_id| {
            let samples = grouped.remove(&donor_id).unwrap_or_default();
            let donor = check_roles(&donor_id, &samples).map(|()| Donor {
                id: donor_id.clone(),
                samples,
            });
            (donor_id, donor)
        })
        .collect()
}

/// Group samples into donors, failing on the first invalid donor
pub fn group(samples: Vec<Sample>) -> HlamaResult<Vec<Donor>> {
    group_donors(samples)
        .into_iter()
        .map(|(_, donor)| donor)
        .collect()
}

fn check_roles(donor_id: &str, samples: &[Sample]) -> HlamaResult<()> {
    for (i, sample) in samples.iter().enumerate() {
        if samples[..i].iter().any(|s| s.role == sample.role) {
            return Err(HlamaError::DuplicateRole {
                donor: donor_id.to_string(),
                role: sample.role.to_string(),
            });
        }
    }
    Ok(())
}
