//! JSON file ledger repository
//!
//! One pretty-printed document per venue at `{data_dir}/{venue_id}.json`.
//! Writes go to a temporary file in the same directory which is then
//! renamed over the target, so readers see either the old or the new
//! document, never a torn one.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{Ledger, LedgerRepository};
use crate::shared::errors::{StorageError, StorageResult};

pub struct FileLedgerRepository {
    data_dir: PathBuf,
}

impl FileLedgerRepository {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, venue_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", venue_id))
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl LedgerRepository for FileLedgerRepository {
    async fn read(&self, venue_id: &str) -> StorageResult<Option<Ledger>> {
        let path = self.path_for(venue_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let ledger = serde_json::from_slice(&raw)?;
        Ok(Some(ledger))
    }

    async fn write(&self, venue_id: &str, ledger: &Ledger) -> StorageResult<()> {
        let path = self.path_for(venue_id);
        let content = serde_json::to_vec_pretty(ledger)?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &content))
            .await
            .map_err(|e| StorageError::Io(io::Error::other(e.to_string())))??;

        debug!(path = %path.display(), "Ledger file written");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VenueConfig;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let repo = FileLedgerRepository::new(dir.path());
        assert!(repo.read("billiard").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read_returns_same_ledger() {
        let dir = TempDir::new().unwrap();
        let repo = FileLedgerRepository::new(dir.path().join("nested"));
        let venue = VenueConfig::game_room();
        let mut ledger = Ledger::fresh(&venue, "2024-03-10");
        ledger.start(&venue, 3, None, 1_710_000_000_000).unwrap();
        ledger.revenue = Decimal::new(12345, 3);

        repo.write("game-room", &ledger).await.unwrap();
        assert_eq!(repo.read("game-room").await.unwrap(), Some(ledger));
        assert!(repo.path_for("game-room").exists());
    }

    #[tokio::test]
    async fn overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let repo = FileLedgerRepository::new(dir.path());
        let venue = VenueConfig::billiard();
        let mut ledger = Ledger::fresh(&venue, "2024-03-10");
        repo.write("billiard", &ledger).await.unwrap();
        ledger.revenue = Decimal::new(2, 0);
        repo.write("billiard", &ledger).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, ["billiard.json"]);
        assert_eq!(repo.read("billiard").await.unwrap().unwrap().revenue, Decimal::new(2, 0));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let repo = FileLedgerRepository::new(dir.path());
        std::fs::write(repo.path_for("billiard"), b"{ not json").unwrap();
        let err = repo.read("billiard").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn reads_the_dashboard_data_file_format() {
        let dir = TempDir::new().unwrap();
        let repo = FileLedgerRepository::new(dir.path());
        let raw = r#"{
  "date": "2024-03-10",
  "revenue": 4.2,
  "stations": [
    { "id": 1, "running": true, "startTime": 1710064800000, "playerCount": 4, "ratePerMinute": 0.2 },
    { "id": 2, "running": false, "startTime": null, "playerCount": null, "ratePerMinute": null },
    { "id": 3, "running": false, "startTime": null, "playerCount": null, "ratePerMinute": null },
    { "id": 4, "running": false, "startTime": null, "playerCount": null, "ratePerMinute": null },
    { "id": 5, "running": false, "startTime": null, "playerCount": null, "ratePerMinute": null },
    { "id": 6, "running": false, "startTime": null, "playerCount": null, "ratePerMinute": null },
    { "id": 7, "running": false, "startTime": null, "playerCount": null, "ratePerMinute": null }
  ]
}"#;
        std::fs::write(repo.path_for("game-room"), raw).unwrap();
        let ledger = repo.read("game-room").await.unwrap().unwrap();
        assert!(ledger.validate(&VenueConfig::game_room(), 1_710_070_000_000).is_ok());
        assert_eq!(ledger.revenue, Decimal::new(42, 1));
        assert_eq!(ledger.stations[0].rate_per_minute, Some(Decimal::new(2, 1)));
    }
}
