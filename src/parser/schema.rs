use crate::record::{Field, CANONICAL};

/// How a source file narrower than the canonical schema is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaPolicy {
    /// Use the leading canonical names only; the batch simply has fewer columns.
    #[default]
    Lenient,
    /// Reject the file.
    Strict,
}

/// Names assigned to the columns of one source file, position by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub fields: Vec<Field>,
    /// Set when the file had fewer columns than the canonical schema.
    pub truncated: bool,
}

impl ColumnMapping {
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn position(&self, field: Field) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.position(field).is_some()
    }
}

/// Assign semantic names to `width` positional columns.
///
/// Wider rows keep every canonical name and name the surplus
/// `extra_col_0..`; narrower rows get only the leading canonical names.
pub fn map_columns(width: usize) -> ColumnMapping {
    let canonical = CANONICAL.len();
    if width >= canonical {
        let fields = CANONICAL
            .iter()
            .copied()
            .chain((0..width - canonical).map(Field::Extra))
            .collect();
        ColumnMapping {
            fields,
            truncated: false,
        }
    } else {
        ColumnMapping {
            fields: CANONICAL[..width].to_vec(),
            truncated: true,
        }
    }
}

// ── Tests ──
