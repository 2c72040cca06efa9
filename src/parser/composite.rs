use crate::record::UNKNOWN;

/// A field of the form `"<label> (<id>)"`, split and normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeled {
    pub label: String,
    pub id: String,
}

/// A race-type cell such as `"Class 4 - 1200M"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceType {
    pub kind: String,
    pub distance: String,
}

/// Trim and join the words of `s` with `_`. Case is left alone.
pub fn normalize_label(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Split `"RICH AND LUCKY (C413)"` into `RICH_AND_LUCKY` and `C413`.
///
/// Without a `(` the whole field is the label. A `(` with no closing `)`
/// after it, or an empty pair, still cuts the label but the id falls back to
/// [`UNKNOWN`].
pub fn split_labeled(field: &str) -> Labeled {
    let field = field.trim();
    let Some(open) = field.find('(') else {
        return Labeled {
            label: normalize_label(field),
            id: UNKNOWN.to_string(),
        };
    };

    let label = normalize_label(&field[..open]);
    let rest = &field[open + 1..];
    let id = rest
        .find(')')
        .map(|close| rest[..close].trim())
        .filter(|id| !id.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    Labeled { label, id }
}

/// Split a race-type cell on `-` into an uppercased type and a distance.
///
/// The distance is the segment after the first `-` (up to any second `-`),
/// uppercased with the trailing `M` unit (and any space before it) removed.
pub fn split_race_type(field: &str) -> RaceType {
    let mut parts = field.split('-');
    let head = parts.next().unwrap_or_default();

    match parts.next() {
        Some(dist) => {
            let dist = dist.trim().to_uppercase();
            let distance = normalize_label(dist.trim_end_matches('M'));
            RaceType {
                kind: normalize_label(head).to_uppercase(),
                distance: if distance.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    distance.to_string()
                },
            }
        }
        None => RaceType {
            kind: normalize_label(field).to_uppercase(),
            distance: UNKNOWN.to_string(),
        },
    }
}

/// Parse a numeric cell. Anything that is not a finite number is missing.
pub fn coerce_numeric(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

// ── Tests ──
