//! Fixture-backed feed source: each category's endpoint is a JSON file,
//! re-read on every extraction so edits show up live.
//!
//! Lets the scheduler run end-to-end without any real extraction backend.
//! Redirects and failures are simulated with directives in the file:
//!
//! ```json
//! { "redirected": true }
//! { "fail": "connection refused" }
//! { "records": [ { "home_team": "Alpha", "away_team": "Beta" } ] }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use feedpool::{
    CategoryId, Extraction, FeedHandle, FeedSource, RawRecord, SourceError, SourceResult,
};

#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    /// Simulate a redirect away from this category
    #[serde(default)]
    redirected: bool,

    /// Simulate a transport failure with this message
    #[serde(default)]
    fail: Option<String>,

    #[serde(default)]
    records: Vec<RawRecord>,
}

/// A [`FeedSource`] reading per-category fixture files.
#[derive(Default)]
pub struct FixtureSource {
    handles: RwLock<HashMap<Uuid, PathBuf>>,
}

impl FixtureSource {
    /// Create a fixture source with no open handles.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedSource for FixtureSource {
    async fn open(&self, category: &CategoryId, endpoint: &str) -> SourceResult<FeedHandle> {
        let path = PathBuf::from(endpoint);
        tokio::fs::metadata(&path)
            .await
            .map_err(|e| SourceError::Connection(Box::new(e)))?;

        let handle = FeedHandle::new(category.clone());
        self.handles.write().await.insert(handle.id(), path);
        Ok(handle)
    }

    async fn extract(&self, handle: &FeedHandle) -> SourceResult<Extraction> {
        let path = self
            .handles
            .read()
            .await
            .get(&handle.id())
            .cloned()
            .ok_or_else(|| SourceError::StaleHandle {
                category: handle.category().to_string(),
            })?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::Connection(Box::new(e)))?;
        let fixture: FixtureFile = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Backend(format!("bad fixture {}: {e}", path.display())))?;

        if let Some(message) = fixture.fail {
            return Err(SourceError::Backend(message));
        }
        if fixture.redirected {
            return Ok(Extraction::redirected());
        }
        Ok(Extraction::serving(fixture.records))
    }

    async fn close(&self, handle: FeedHandle) -> SourceResult<()> {
        self.handles.write().await.remove(&handle.id());
        Ok(())
    }

    async fn reset(&self) -> SourceResult<()> {
        self.handles.write().await.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "fixtures"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedpool::FeedStatus;
    use tempfile::TempDir;

    async fn write_fixture(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        tokio::fs::write(&path, content).await.unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_open_fails_for_missing_file() {
        let source = FixtureSource::new();
        let result = source
            .open(&CategoryId::new("soccer"), "/no/such/file.json")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extract_reads_records() {
        let dir = TempDir::new().unwrap();
        let endpoint = write_fixture(
            &dir,
            "soccer.json",
            r#"{ "records": [ { "home_team": "Alpha", "away_team": "Beta" } ] }"#,
        )
        .await;

        let source = FixtureSource::new();
        let handle = source
            .open(&CategoryId::new("soccer"), &endpoint)
            .await
            .unwrap();
        let extraction = source.extract(&handle).await.unwrap();

        assert_eq!(extraction.status, FeedStatus::Serving);
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].home_team, "Alpha");
    }

    #[tokio::test]
    async fn test_directives() {
        let dir = TempDir::new().unwrap();
        let source = FixtureSource::new();

        let redirected = write_fixture(&dir, "a.json", r#"{ "redirected": true }"#).await;
        let handle = source.open(&CategoryId::new("a"), &redirected).await.unwrap();
        assert_eq!(
            source.extract(&handle).await.unwrap().status,
            FeedStatus::Redirected
        );

        let failing = write_fixture(&dir, "b.json", r#"{ "fail": "boom" }"#).await;
        let handle = source.open(&CategoryId::new("b"), &failing).await.unwrap();
        assert!(source.extract(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_handle_is_stale() {
        let dir = TempDir::new().unwrap();
        let endpoint = write_fixture(&dir, "soccer.json", r#"{ "records": [] }"#).await;

        let source = FixtureSource::new();
        let handle = source
            .open(&CategoryId::new("soccer"), &endpoint)
            .await
            .unwrap();
        source.close(handle.clone()).await.unwrap();

        assert!(matches!(
            source.extract(&handle).await,
            Err(SourceError::StaleHandle { .. })
        ));
    }
}
