//! Result artifacts written by workflow runs.
//!
//! The scraping metadata and analysis results files are shared by every run:
//! each run that reaches the corresponding stage replaces the file wholesale,
//! and readers always see the last complete write.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::OutputConfig;

/// The shared artifacts served by the read API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    ScrapingMetadata,
    AnalysisResults,
}

impl ArtifactKind {
    /// Human-readable label used in API messages.
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::ScrapingMetadata => "Scraping metadata",
            ArtifactKind::AnalysisResults => "Analysis results",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors from reading or writing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("{0} file not found")]
    NotFound(ArtifactKind),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error reading {path}: {reason}")]
    Json { path: PathBuf, reason: String },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A parsed artifact with the path it was read from.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub data: serde_json::Value,
}

/// Raw artifact bytes, for download endpoints.
#[derive(Debug, Clone)]
pub struct RawArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// File-backed artifact storage under the configured output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    scraping_metadata_file: String,
    analysis_results_file: String,
}

impl ArtifactStore {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            scraping_metadata_file: config.scraping_metadata_file.clone(),
            analysis_results_file: config.analysis_results_file.clone(),
        }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::ScrapingMetadata => &self.scraping_metadata_file,
            ArtifactKind::AnalysisResults => &self.analysis_results_file,
        }
    }

    /// Location of the artifact file for `kind`.
    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(self.file_name(kind))
    }

    /// Replace the artifact of `kind` with `value` as pretty-printed JSON.
    pub async fn write<T>(&self, kind: ArtifactKind, value: &T) -> Result<PathBuf, ArtifactError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.path(kind);
        write_json_atomic(&path, value).await?;
        debug!(artifact = %kind, path = %path.display(), "Wrote artifact");
        Ok(path)
    }

    /// Write the per-run report file `workflow_results_<workflow_id>.json`.
    pub async fn write_workflow_report<T>(
        &self,
        workflow_id: &str,
        value: &T,
    ) -> Result<PathBuf, ArtifactError>
    where
        T: Serialize + ?Sized,
    {
        let path = self.dir.join(format!("workflow_results_{}.json", workflow_id));
        write_json_atomic(&path, value).await?;
        debug!(workflow_id = %workflow_id, path = %path.display(), "Wrote workflow report");
        Ok(path)
    }

    /// Read and parse the latest artifact of `kind`.
    pub async fn read_json(&self, kind: ArtifactKind) -> Result<StoredArtifact, ArtifactError> {
        let raw = self.read_raw(kind).await?;
        let data = serde_json::from_slice(&raw.bytes).map_err(|e| ArtifactError::Json {
            path: raw.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(StoredArtifact {
            path: raw.path,
            data,
        })
    }

    /// Read the latest artifact of `kind` without parsing it.
    pub async fn read_raw(&self, kind: ArtifactKind) -> Result<RawArtifact, ArtifactError> {
        let path = self.path(kind);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(RawArtifact {
                file_name: self.file_name(kind).to_string(),
                path,
                bytes,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(kind))
            }
            Err(e) => Err(ArtifactError::io(&path, e)),
        }
    }
}

/// Serialize `value` next to `path` and rename it into place.
///
/// The temp name is unique per write so concurrent writers never share a file.
async fn write_json_atomic<T>(path: &Path, value: &T) -> Result<(), ArtifactError>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| ArtifactError::Json {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ArtifactError::io(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| ArtifactError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ArtifactError::io(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::new(&OutputConfig {
            dir: dir.path().join("output"),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_read_before_write_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let err = store
            .read_json(ArtifactKind::ScrapingMetadata)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::NotFound(ArtifactKind::ScrapingMetadata)
        ));
        assert_eq!(err.to_string(), "Scraping metadata file not found");
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let path = store
            .write(ArtifactKind::AnalysisResults, &json!({"documents": []}))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("output/analysis_results.json"));

        let artifact = store.read_json(ArtifactKind::AnalysisResults).await.unwrap();
        assert_eq!(artifact.data, json!({"documents": []}));

        let raw = store.read_raw(ArtifactKind::AnalysisResults).await.unwrap();
        assert_eq!(raw.file_name, "analysis_results.json");
        assert!(String::from_utf8(raw.bytes).unwrap().contains("documents"));
    }

    #[tokio::test]
    async fn test_last_writer_wins_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .write(ArtifactKind::ScrapingMetadata, &json!({"run": 1}))
            .await
            .unwrap();
        store
            .write(ArtifactKind::ScrapingMetadata, &json!({"run": 2}))
            .await
            .unwrap();

        let artifact = store.read_json(ArtifactKind::ScrapingMetadata).await.unwrap();
        assert_eq!(artifact.data["run"], 2);

        let entries: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["scraping_metadata.json".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_json_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.path(ArtifactKind::AnalysisResults), "{not json").unwrap();

        let err = store
            .read_json(ArtifactKind::AnalysisResults)
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Json { .. }));
    }

    #[tokio::test]
    async fn test_workflow_report_file_name() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let path = store
            .write_workflow_report("workflow_20240101_120000_abcd1234", &json!({"ok": true}))
            .await
            .unwrap();
        assert!(path.ends_with("workflow_results_workflow_20240101_120000_abcd1234.json"));
        assert!(path.exists());
    }
}
