//! Allele nomenclature normalization

use crate::{Allele, HlamaError, HlamaResult};

/// Expression and ambiguity-group suffixes accepted after the last field
const SUFFIXES: &[char] = &['N', 'L', 'S', 'C', 'A', 'Q', 'G', 'P'];

/// Parse a caller's allele text (e.g. `A*02:01:01`, `HLA-b*15:01`) into a
/// canonical [`Allele`].
pub fn normalize(raw: &str) -> HlamaResult<Allele> {
    let malformed = || HlamaError::MalformedAllele(raw.to_string());

    let text = strip_hla_prefix(raw.trim());
    let (locus, fields) = text.split_once('*').ok_or_else(malformed)?;

    if locus.is_empty() || locus.len() > 2 || !locus.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(malformed());
    }

    let mut fields: Vec<&str> = fields.split(':').collect();
    if fields.len() < 2 {
        return Err(malformed());
    }

    let mut suffix = None;
    if let Some(last) = fields.last_mut() {
        let field: &str = *last;
        if let Some(c) = field.chars().last() {
            let upper = c.to_ascii_uppercase();
            if field.len() > 1 && SUFFIXES.contains(&upper) {
                suffix = Some(upper);
                *last = &field[..field.len() - 1];
            }
        }
    }

    let group = parse_field(fields[0]).ok_or_else(malformed)?;
    let protein = parse_field(fields[1]).ok_or_else(malformed)?;

    let mut extra = Vec::with_capacity(fields.len() - 2);
    for field in &fields[2..] {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        extra.push(field.to_string());
    }

    Ok(Allele {
        locus: locus.to_ascii_uppercase(),
        group,
        protein,
        extra,
        suffix,
    })
}

/// Normalize and render back at group/protein resolution
pub fn normalize_text(raw: &str) -> HlamaResult<String> {
    normalize(raw).map(|allele| allele.to_string())
}

fn strip_hla_prefix(text: &str) -> &str {
    match text.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("HLA-") => &text[4..],
        _ => text,
    }
}

fn parse_field(field: &str) -> Option<u16> {
    if field.is_empty() || field.len() > 3 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

impl std::str::FromStr for Allele {
    type Err = HlamaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}
