//! Ordering of `program_versions` lists.
//!
//! A list sorts numerically when every entry parses as a finite number
//! (`"9" < "10" < "47.1"`), and lexicographically otherwise.

use std::cmp::Ordering;

/// Sort `versions` in place, numeric when possible.
pub fn sort_versions(versions: &mut [String]) {
    let numeric: Option<Vec<f64>> = versions.iter().map(|v| parse_numeric(v)).collect();
    match numeric {
        Some(_) => versions.sort_by(|a, b| {
            let (a, b) = (parse_numeric(a), parse_numeric(b));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }),
        None => versions.sort(),
    }
}

/// The sorted list with `version` appended, or `None` if it is already
/// present.
pub fn with_version(existing: &[String], version: &str) -> Option<Vec<String>> {
    if existing.iter().any(|v| v == version) {
        return None;
    }
    let mut merged = existing.to_vec();
    merged.push(version.to_string());
    sort_versions(&mut merged);
    Some(merged)
}

fn parse_numeric(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
