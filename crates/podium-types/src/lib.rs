use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One member's entry in a fetched leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    pub local_score: i64,
}

/// A private leaderboard as the upstream service returns it. Transient:
/// produced fresh per fetch, never persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub members: HashMap<String, Member>,
    pub owner_id: u64,
    #[serde(rename = "event")]
    pub event_year: String,
    pub num_days: u32,
}

/// Accumulated daily scores for one leaderboard, stored as a single JSON
/// document. The outer map is keyed by calendar date (`YYYY-MM-DD`), the
/// inner map by member id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricRecord {
    pub historic_scores: BTreeMap<String, BTreeMap<String, i64>>,
    pub owner_id: u64,
    pub event_year: String,
    pub num_days: u32,
}

impl HistoricRecord {
    /// A fresh record carrying the metadata observed at creation time.
    /// `owner_id`, `event_year`, and `num_days` stay frozen on later appends.
    pub fn new(owner_id: u64, event_year: impl Into<String>, num_days: u32) -> Self {
        Self {
            historic_scores: BTreeMap::new(),
            owner_id,
            event_year: event_year.into(),
            num_days,
        }
    }
}

/// RFC 7807-style body used for every error response. `status` is always
/// populated; the remaining fields are omitted from JSON when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Problem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: u16,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Problem {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_upstream_shape() {
        let raw = r#"{
            "members": {
                "123456": { "id": 123456, "local_score": 42 },
                "654321": { "id": 654321, "local_score": 17 }
            },
            "owner_id": 123456,
            "event": "2024",
            "num_days": 25
        }"#;
        let snapshot: LeaderboardSnapshot = serde_json::from_str(raw).expect("snapshot");
        assert_eq!(snapshot.owner_id, 123456);
        assert_eq!(snapshot.event_year, "2024");
        assert_eq!(snapshot.num_days, 25);
        assert_eq!(snapshot.members["123456"].local_score, 42);
    }

    #[test]
    fn problem_omits_absent_fields() {
        let body = serde_json::to_value(Problem::new(401)).expect("serialize");
        assert_eq!(body, serde_json::json!({"status": 401}));
    }

    #[test]
    fn problem_serializes_type_under_wire_name() {
        let mut problem = Problem::new(500).with_title("boom");
        problem.kind = Some("about:blank".to_string());
        let body = serde_json::to_value(problem).expect("serialize");
        assert_eq!(body["type"], "about:blank");
        assert_eq!(body["title"], "boom");
    }

    #[test]
    fn record_round_trips_through_json() {
        let mut record = HistoricRecord::new(99, "2023", 25);
        record
            .historic_scores
            .entry("2023-12-01".to_string())
            .or_default()
            .insert("99".to_string(), 13);
        let raw = serde_json::to_string(&record).expect("serialize");
        let parsed: HistoricRecord = serde_json::from_str(&raw).expect("parse");
        assert_eq!(parsed, record);
    }
}
