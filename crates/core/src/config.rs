//! Tunables of the logistics core.

use serde::{Deserialize, Serialize};

use crate::host::Danger;

/// Which record gets a partially filled cell when several could merge into it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSlotPolicy {
    /// Records are tried in posting order; the first compatible one takes the
    /// cell and no other record counts it.
    #[default]
    FirstMatchingRecord,
}

/// Logistics configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// Manhattan distance (exclusive) within which a worker looks for a
    /// second item to bundle into a delivery it just picked up.
    pub bundling_radius: u32,
    /// Whether new deliveries may bundle extra items at all.
    pub bundling_enabled: bool,
    pub merge_slot_policy: MergeSlotPolicy,
    /// Upper bound on valid cells visited by one destination search.
    pub max_search_cells: usize,
    /// Danger tolerated on paths between items and destinations.
    pub max_path_danger: Danger,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            bundling_radius: 7,
            bundling_enabled: true,
            merge_slot_policy: MergeSlotPolicy::FirstMatchingRecord,
            max_search_cells: 10_000,
            max_path_danger: Danger::Deadly,
        }
    }
}

impl LogisticsConfig {
    pub fn with_bundling_radius(mut self, radius: u32) -> Self {
        self.bundling_radius = radius;
        self
    }

    pub fn with_bundling(mut self, enabled: bool) -> Self {
        self.bundling_enabled = enabled;
        self
    }

    pub fn with_max_search_cells(mut self, max: usize) -> Self {
        self.max_search_cells = max;
        self
    }

    pub fn with_max_path_danger(mut self, danger: Danger) -> Self {
        self.max_path_danger = danger;
        self
    }

    /// Defaults overlaid with `HAULX_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup. Malformed values are ignored.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_var::<u32>(&lookup, "HAULX_BUNDLING_RADIUS") {
            self.bundling_radius = v;
        }
        if let Some(v) = parse_var::<bool>(&lookup, "HAULX_BUNDLING_ENABLED") {
            self.bundling_enabled = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, "HAULX_MAX_SEARCH_CELLS") {
            self.max_search_cells = v;
        }
        self
    }
}

fn parse_var<T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_heuristics() {
        let config = LogisticsConfig::default();
        assert_eq!(config.bundling_radius, 7);
        assert!(config.bundling_enabled);
        assert_eq!(config.merge_slot_policy, MergeSlotPolicy::FirstMatchingRecord);
    }

    #[test]
    fn overlay_applies_valid_and_skips_malformed() {
        let config = LogisticsConfig::default().overlay(|key| match key {
            "HAULX_BUNDLING_RADIUS" => Some("3".to_string()),
            "HAULX_BUNDLING_ENABLED" => Some("nope".to_string()),
            _ => None,
        });
        assert_eq!(config.bundling_radius, 3);
        assert!(config.bundling_enabled);
    }

    #[test]
    fn missing_fields_default_on_deserialize() {
        let config: LogisticsConfig = serde_json::from_str(r#"{"bundling_radius": 4}"#).unwrap();
        assert_eq!(config.bundling_radius, 4);
        assert_eq!(config.max_search_cells, 10_000);
    }
}
