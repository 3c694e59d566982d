//! Persisted form of the logistics state.
//!
//! Every field defaults when missing so older or partial saves restore to an
//! empty state instead of failing.

use serde::{Deserialize, Serialize};

use haulx_core::{
    Cell, LogisticsError, LogisticsResult, MixTypeId, MixTypeRegistry, Point, PostingId, RegionId,
    ZoneId,
};
use haulx_inventory::RecordState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Index into [`LogisticsSnapshot::mix_types`].
    pub mix: MixTypeId,
    #[serde(flatten)]
    pub state: RecordState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingState {
    pub id: PostingId,
    pub region: RegionId,
    #[serde(default)]
    pub records: Vec<RecordSnapshot>,
    #[serde(default)]
    pub destinations: Option<Vec<Cell>>,
    #[serde(default)]
    pub cursor: Option<Point>,
    #[serde(default)]
    pub center: Point,
    #[serde(default)]
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub region: RegionId,
    #[serde(default)]
    pub postings: Vec<PostingState>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsSnapshot {
    pub mix_types: MixTypeRegistry,
    pub regions: Vec<RegionSnapshot>,
    pub retaining_zones: Vec<ZoneId>,
    pub next_posting_id: u64,
}

impl LogisticsSnapshot {
    pub fn to_json(&self) -> LogisticsResult<String> {
        serde_json::to_string(self)
            .map_err(|e| LogisticsError::validation(format!("snapshot encode: {e}")))
    }

    pub fn from_json(raw: &str) -> LogisticsResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| LogisticsError::validation(format!("snapshot decode: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_restores_to_defaults() {
        let snapshot = LogisticsSnapshot::from_json("{}").unwrap();
        assert_eq!(snapshot, LogisticsSnapshot::default());
    }

    #[test]
    fn posting_fields_default_individually() {
        let raw = r#"{"regions":[{"region":3,"postings":[{"id":7,"region":3}]}]}"#;
        let snapshot = LogisticsSnapshot::from_json(raw).unwrap();
        let posting = &snapshot.regions[0].postings[0];
        assert_eq!(posting.id, PostingId::new(7));
        assert!(posting.records.is_empty());
        assert!(posting.destinations.is_none());
        assert_eq!(snapshot.next_posting_id, 0);
    }

    #[test]
    fn garbage_is_a_validation_error() {
        let err = LogisticsSnapshot::from_json("not json").unwrap_err();
        assert!(matches!(err, LogisticsError::Validation(_)));
    }
}
