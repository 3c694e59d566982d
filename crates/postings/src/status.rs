use serde::{Deserialize, Serialize};

/// Progress of a posting, derived from its records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingStatus {
    /// Built but not registered yet.
    Planning,
    InProgress,
    /// No destination set is currently cached.
    DestinationBlocked,
    /// A record still owes units but has no items left to deliver them with.
    Incompletable,
    Complete,
    /// More units arrived than were asked for.
    OverkillError,
}

impl PostingStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, PostingStatus::Complete | PostingStatus::OverkillError)
    }
}

impl core::fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            PostingStatus::Planning => "planning",
            PostingStatus::InProgress => "in_progress",
            PostingStatus::DestinationBlocked => "destination_blocked",
            PostingStatus::Incompletable => "incompletable",
            PostingStatus::Complete => "complete",
            PostingStatus::OverkillError => "overkill_error",
        };
        f.write_str(s)
    }
}
