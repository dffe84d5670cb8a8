//! Identity claim parsing
//!
//! Two independent passes over one customer message:
//! 1. labeled: `Name: ... DOB: ... ID: ...` in any order and case
//! 2. positional: comma (or newline) separated `name, dob, id`
//!
//! Labeled values win per field; the positional pass only fills gaps.

use crate::models::VerificationClaim;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MARKER: Regex = Regex::new(r"(?i)\b(name|dob|id)\s*:").unwrap();
}

/// Fields recovered from a message, any of which may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialClaim {
    pub name: Option<String>,
    pub dob: Option<String>,
    pub id_number: Option<String>,
}

impl PartialClaim {
    /// Per field, keep our value and take `other`'s only where ours is missing
    pub fn or(self, other: PartialClaim) -> PartialClaim {
        PartialClaim {
            name: self.name.or(other.name),
            dob: self.dob.or(other.dob),
            id_number: self.id_number.or(other.id_number),
        }
    }

    pub fn missing_count(&self) -> usize {
        [self.name.is_none(), self.dob.is_none(), self.id_number.is_none()]
            .iter()
            .filter(|missing| **missing)
            .count()
    }

    /// The complete claim, or how many fields are still missing
    pub fn complete(self) -> Result<VerificationClaim, usize> {
        let missing = self.missing_count();
        match (self.name, self.dob, self.id_number) {
            (Some(name), Some(dob), Some(id_number)) => Ok(VerificationClaim {
                name,
                dob,
                id_number,
            }),
            _ => Err(missing),
        }
    }
}

/// Labeled pass. Each value runs until the next marker or the end of text.
pub fn parse_labeled(text: &str) -> PartialClaim {
    let markers: Vec<(String, usize, usize)> = MARKER
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            let label = cap.get(1)?.as_str().to_lowercase();
            Some((label, whole.start(), whole.end()))
        })
        .collect();

    let mut claim = PartialClaim::default();

    for (i, (label, _, value_start)) in markers.iter().enumerate() {
        let value_end = markers
            .get(i + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(text.len());

        let Some(value) = clean(&text[*value_start..value_end]) else {
            continue;
        };

        let slot = match label.as_str() {
            "name" => &mut claim.name,
            "dob" => &mut claim.dob,
            _ => &mut claim.id_number,
        };

        // First occurrence of a label wins
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    claim
}

/// Positional pass over `name, dob, id`. Needs at least three parts.
pub fn parse_positional(text: &str) -> PartialClaim {
    let normalized = text.replace('\n', ",");
    let parts: Vec<&str> = normalized.split(',').map(str::trim).collect();

    if parts.len() < 3 {
        return PartialClaim::default();
    }

    let pick = |s: &str| (!s.is_empty()).then(|| s.to_string());

    PartialClaim {
        name: pick(parts[0]),
        dob: pick(parts[1]),
        id_number: pick(parts[2]),
    }
}

/// Both passes, labeled values taking precedence
pub fn parse_claim(text: &str) -> PartialClaim {
    parse_labeled(text).or(parse_positional(text))
}

fn clean(raw: &str) -> Option<String> {
    let value = raw.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == ';');
    (!value.is_empty()).then(|| value.to_string())
}
