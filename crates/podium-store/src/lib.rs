use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use podium_types::{HistoricRecord, LeaderboardSnapshot};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no historic record for this leaderboard")]
    NotFound,

    #[error("invalid leaderboard identifier: {0}")]
    InvalidId(String),

    #[error("historic record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        // Error kind only; full io errors can carry filesystem paths.
        StoreError::Unavailable(err.kind().to_string())
    }
}

/// Durable accumulation of daily score snapshots, one JSON file per
/// leaderboard at `<base>/<event_year>/<owner_id>.json`.
///
/// Every read-merge-write cycle for a record runs under an in-memory lock
/// keyed by that record's identity, so concurrent appends to the same
/// leaderboard cannot lose updates and readers never observe a half-written
/// file. Appends to different leaderboards proceed independently.
pub struct HistoryStore {
    base: PathBuf,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl HistoryStore {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Load the full historic record for one leaderboard.
    pub async fn read(
        &self,
        event_year: &str,
        leaderboard_id: &str,
    ) -> Result<HistoricRecord, StoreError> {
        let path = self.record_path(event_year, leaderboard_id)?;
        let lock = self.record_lock(event_year, leaderboard_id).await;
        let _guard = lock.lock().await;
        load_record(&path).await
    }

    /// Merge one snapshot into the record under today's local date.
    pub async fn append_snapshot(&self, snapshot: &LeaderboardSnapshot) -> Result<(), StoreError> {
        self.append_snapshot_on(snapshot, &today()).await
    }

    /// Merge one snapshot under an explicit date key.
    pub async fn append_snapshot_on(
        &self,
        snapshot: &LeaderboardSnapshot,
        date: &str,
    ) -> Result<(), StoreError> {
        let owner = snapshot.owner_id.to_string();
        let path = self.record_path(&snapshot.event_year, &owner)?;
        let lock = self.record_lock(&snapshot.event_year, &owner).await;
        let _guard = lock.lock().await;

        let mut record = match load_record(&path).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                info!(
                    event_year = %snapshot.event_year,
                    owner_id = snapshot.owner_id,
                    "creating historic record"
                );
                HistoricRecord::new(snapshot.owner_id, &snapshot.event_year, snapshot.num_days)
            }
            Err(err) => return Err(err),
        };

        let day = record.historic_scores.entry(date.to_string()).or_default();
        for (member_id, member) in &snapshot.members {
            day.insert(member_id.clone(), member.local_score);
        }

        let payload = serde_json::to_string_pretty(&record)?;
        fs::write(&path, payload).await?;
        debug!(
            event_year = %snapshot.event_year,
            owner_id = snapshot.owner_id,
            date,
            members = snapshot.members.len(),
            "historic record updated"
        );
        Ok(())
    }

    fn record_path(&self, event_year: &str, owner: &str) -> Result<PathBuf, StoreError> {
        validate_segment(event_year)?;
        validate_segment(owner)?;
        Ok(self
            .base
            .join(event_year)
            .join(format!("{owner}.json")))
    }

    async fn record_lock(&self, event_year: &str, owner: &str) -> Arc<Mutex<()>> {
        let key = format!("{event_year}/{owner}");
        if let Some(lock) = self.locks.read().await.get(&key) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Today's system local date in the `YYYY-MM-DD` shape used for date keys.
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

async fn load_record(path: &Path) -> Result<HistoricRecord, StoreError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound),
        Err(err) => return Err(err.into()),
    };
    Ok(serde_json::from_str(&raw)?)
}

fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
    {
        return Err(StoreError::InvalidId(segment.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_types::Member;
    use tempfile::TempDir;

    fn snapshot(owner_id: u64, scores: &[(&str, i64)]) -> LeaderboardSnapshot {
        let members = scores
            .iter()
            .map(|(id, score)| {
                (
                    (*id).to_string(),
                    Member {
                        id: id.parse().expect("numeric member id"),
                        local_score: *score,
                    },
                )
            })
            .collect();
        LeaderboardSnapshot {
            members,
            owner_id,
            event_year: "2024".to_string(),
            num_days: 25,
        }
    }

    #[tokio::test]
    async fn read_missing_record_returns_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let store = HistoryStore::new(dir.path());
        let err = store.read("2024", "1000").await.expect_err("no record yet");
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn first_append_creates_record_with_single_date() {
        let dir = TempDir::new().expect("tempdir");
        let store = HistoryStore::new(dir.path());
        store
            .append_snapshot_on(&snapshot(1000, &[("11", 5), ("22", 9)]), "2024-12-01")
            .await
            .expect("append");

        let record = store.read("2024", "1000").await.expect("read back");
        assert_eq!(record.owner_id, 1000);
        assert_eq!(record.event_year, "2024");
        assert_eq!(record.num_days, 25);
        assert_eq!(record.historic_scores.len(), 1);
        let day = &record.historic_scores["2024-12-01"];
        assert_eq!(day["11"], 5);
        assert_eq!(day["22"], 9);
    }

    #[tokio::test]
    async fn same_day_append_overwrites_that_days_entries() {
        let dir = TempDir::new().expect("tempdir");
        let store = HistoryStore::new(dir.path());
        store
            .append_snapshot_on(&snapshot(1000, &[("11", 5), ("22", 9)]), "2024-12-01")
            .await
            .expect("first append");
        store
            .append_snapshot_on(&snapshot(1000, &[("11", 7), ("22", 12)]), "2024-12-01")
            .await
            .expect("second append");

        let record = store.read("2024", "1000").await.expect("read back");
        assert_eq!(record.historic_scores.len(), 1);
        let day = &record.historic_scores["2024-12-01"];
        assert_eq!(day["11"], 7);
        assert_eq!(day["22"], 12);
    }

    #[tokio::test]
    async fn appends_on_distinct_dates_accumulate() {
        let dir = TempDir::new().expect("tempdir");
        let store = HistoryStore::new(dir.path());
        store
            .append_snapshot_on(&snapshot(1000, &[("11", 5)]), "2024-12-01")
            .await
            .expect("day one");
        store
            .append_snapshot_on(&snapshot(1000, &[("11", 8)]), "2024-12-02")
            .await
            .expect("day two");

        let record = store.read("2024", "1000").await.expect("read back");
        assert_eq!(record.historic_scores.len(), 2);
        assert_eq!(record.historic_scores["2024-12-01"]["11"], 5);
        assert_eq!(record.historic_scores["2024-12-02"]["11"], 8);
    }

    #[tokio::test]
    async fn record_metadata_stays_frozen_after_creation() {
        let dir = TempDir::new().expect("tempdir");
        let store = HistoryStore::new(dir.path());
        store
            .append_snapshot_on(&snapshot(1000, &[("11", 5)]), "2024-12-01")
            .await
            .expect("create");

        let mut grown = snapshot(1000, &[("11", 6)]);
        grown.num_days = 26;
        store
            .append_snapshot_on(&grown, "2024-12-02")
            .await
            .expect("append");

        let record = store.read("2024", "1000").await.expect("read back");
        assert_eq!(record.num_days, 25);
    }

    #[tokio::test]
    async fn corrupt_file_yields_corrupt_error() {
        let dir = TempDir::new().expect("tempdir");
        let year_dir = dir.path().join("2024");
        std::fs::create_dir_all(&year_dir).expect("year dir");
        std::fs::write(year_dir.join("1000.json"), "{ not json").expect("garbage");

        let store = HistoryStore::new(dir.path());
        let err = store.read("2024", "1000").await.expect_err("corrupt");
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[tokio::test]
    async fn invalid_identifiers_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let store = HistoryStore::new(dir.path());
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            let err = store.read(bad, "1000").await.expect_err("invalid year");
            assert!(matches!(err, StoreError::InvalidId(_)), "{bad:?}");
        }
        let err = store.read("2024", "../1000").await.expect_err("invalid id");
        assert!(matches!(err, StoreError::InvalidId(_)));
    }

    #[tokio::test]
    async fn concurrent_appends_to_same_record_lose_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(HistoryStore::new(dir.path()));

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .append_snapshot_on(&snapshot(1000, &[("11", 5)]), "2024-12-01")
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .append_snapshot_on(&snapshot(1000, &[("22", 9)]), "2024-12-01")
                    .await
            })
        };
        a.await.expect("join a").expect("append a");
        b.await.expect("join b").expect("append b");

        let record = store.read("2024", "1000").await.expect("read back");
        let day = &record.historic_scores["2024-12-01"];
        assert_eq!(day["11"], 5);
        assert_eq!(day["22"], 9);
    }

    #[test]
    fn today_is_a_date_key() {
        let date = today();
        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");
        assert_eq!(&date[7..8], "-");
    }
}
