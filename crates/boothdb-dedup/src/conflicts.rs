//! Field disagreements between two near-duplicate records.

use std::sync::LazyLock;

use boothdb_core::similarity::normalize_text;
use boothdb_core::{CandidateRecord, FieldConflict};
use regex::Regex;

static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("valid regex"));

/// Compare operational status, cost, hours, and machine model. A field
/// conflicts only when both records carry a value and the values differ
/// after normalization.
#[must_use]
pub fn detect_conflicts(a: &CandidateRecord, b: &CandidateRecord) -> Vec<FieldConflict> {
    let mut conflicts = Vec::new();

    if let (Some(sa), Some(sb)) = (a.status, b.status) {
        if sa != sb {
            conflicts.push(conflict("status", sa.as_str(), sb.as_str()));
        }
    }
    if let (Some(ca), Some(cb)) = (&a.cost, &b.cost) {
        if !same_cost(ca, cb) {
            conflicts.push(conflict("cost", ca, cb));
        }
    }
    for (field, va, vb) in [
        ("hours", &a.hours, &b.hours),
        ("machine_model", &a.machine_model, &b.machine_model),
    ] {
        if let (Some(va), Some(vb)) = (va, vb) {
            if normalize_text(va) != normalize_text(vb) {
                conflicts.push(conflict(field, va, vb));
            }
        }
    }

    conflicts
}

fn conflict(field: &str, value_a: &str, value_b: &str) -> FieldConflict {
    FieldConflict {
        field: field.to_string(),
        value_a: value_a.to_string(),
        value_b: value_b.to_string(),
    }
}

/// Costs agree when their numeric amounts agree, so `$5` and `5.00 USD`
/// are the same price. Costs without numbers compare as text.
fn same_cost(a: &str, b: &str) -> bool {
    match (amount(a), amount(b)) {
        (Some(x), Some(y)) => (x - y).abs() < 0.005,
        (None, None) => normalize_text(a) == normalize_text(b),
        _ => false,
    }
}

/// The first number in `cost`. A trailing group of exactly three digits
/// marks every separator as a thousands separator (`1,000`, `1.500`);
/// otherwise the last separator is the decimal point (`4,50`, `1,234.56`).
fn amount(cost: &str) -> Option<f64> {
    let digits = AMOUNT.find(cost)?.as_str();
    let normalized = match digits.rfind(['.', ',']) {
        Some(at) if digits.len() - at - 1 != 3 => {
            let (whole, fraction) = digits.split_at(at);
            format!("{}.{}", whole.replace(['.', ','], ""), &fraction[1..])
        }
        _ => digits.replace(['.', ','], ""),
    };
    normalized.parse().ok()
}
