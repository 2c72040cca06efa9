pub mod clean;
pub mod composite;
pub mod schema;

use tracing::warn;

use crate::error::SkipReason;
use crate::record::{CleanedBatch, CANONICAL};
use crate::source::RawBatch;
use clean::BatchTag;
use schema::SchemaPolicy;

/// Two-step pipeline: raw rows → column mapping → cleaned records.
pub fn process_batch(
    raw: &RawBatch,
    tag: &BatchTag,
    policy: SchemaPolicy,
) -> Result<CleanedBatch, SkipReason> {
    let mapping = schema::map_columns(raw.width);
    if mapping.truncated {
        if policy == SchemaPolicy::Strict {
            return Err(SkipReason::NarrowSchema {
                found: raw.width,
                expected: CANONICAL.len(),
            });
        }
        let missing: Vec<String> = CANONICAL[raw.width..].iter().map(ToString::to_string).collect();
        warn!(
            file = %tag.source_file,
            missing = %missing.join(","),
            "Batch has fewer columns than expected ({} vs {})",
            raw.width,
            CANONICAL.len()
        );
    }
    Ok(clean::clean_batch(raw, &mapping, tag))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn narrow() -> RawBatch {
        RawBatch {
            header: Vec::new(),
            rows: vec![vec!["RACE 1 (284)".into(), "GOOD".into()]],
            width: 2,
        }
    }

    fn tag() -> BatchTag {
        BatchTag {
            sequence: 4,
            source_file: "races4.csv".into(),
            date: "Unknown_4".into(),
        }
    }

    #[test]
    fn lenient_policy_keeps_narrow_batches() {
        let batch = process_batch(&narrow(), &tag(), SchemaPolicy::Lenient).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records[0].race_id, "284");
        assert_eq!(batch.sequence, 4);
    }

    #[test]
    fn strict_policy_rejects_narrow_batches() {
        let err = process_batch(&narrow(), &tag(), SchemaPolicy::Strict).unwrap_err();
        assert!(matches!(err, SkipReason::NarrowSchema { found: 2, expected: 15 }));
    }
}
