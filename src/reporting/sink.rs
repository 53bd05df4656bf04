//! Port for writing rendered Markdown reports to storage, with a
//! filesystem adapter. Additional adapters (object storage, a Git
//! repository) can implement the same port.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportSinkError {
    #[error("failed to write report for {owner}/{name}: {source}")]
    Io {
        owner: String,
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Identifying metadata attached to a write, used to build a
/// predictable storage path.
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub owner: String,
    pub name: String,
    pub report_id: String,
    /// ISO date string (`YYYY-MM-DD`) of the window end.
    pub window_end: String,
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write_report(&self, markdown: &str, metadata: &ReportMetadata) -> Result<(), ReportSinkError>;
}

/// Writes reports under `{base_path}/{owner}/{name}/latest.md` and a
/// dated archive `{base_path}/{owner}/{name}/{window_end}-{report_id}.md`.
pub struct FilesystemReportSink {
    base_path: PathBuf,
}

impl FilesystemReportSink {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl ReportSink for FilesystemReportSink {
    async fn write_report(&self, markdown: &str, metadata: &ReportMetadata) -> Result<(), ReportSinkError> {
        let repo_dir = self.base_path.join(&metadata.owner).join(&metadata.name);
        let to_io_err = |source: std::io::Error| ReportSinkError::Io {
            owner: metadata.owner.clone(),
            name: metadata.name.clone(),
            source,
        };

        tokio::fs::create_dir_all(&repo_dir).await.map_err(to_io_err)?;

        let latest_path = repo_dir.join("latest.md");
        let dated_path = repo_dir.join(format!("{}-{}.md", metadata.window_end, metadata.report_id));

        tokio::fs::write(&latest_path, markdown).await.map_err(to_io_err)?;
        tokio::fs::write(&dated_path, markdown).await.map_err(to_io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_latest_and_dated_archive() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FilesystemReportSink::new(dir.path());
        let metadata = ReportMetadata {
            owner: "acme".to_string(),
            name: "widget".to_string(),
            report_id: "report-1".to_string(),
            window_end: "2026-01-08".to_string(),
        };

        sink.write_report("# Report\n\nContent", &metadata).await.unwrap();

        let repo_dir = dir.path().join("acme").join("widget");
        let latest = tokio::fs::read_to_string(repo_dir.join("latest.md")).await.unwrap();
        let dated = tokio::fs::read_to_string(repo_dir.join("2026-01-08-report-1.md"))
            .await
            .unwrap();
        assert_eq!(latest, "# Report\n\nContent");
        assert_eq!(dated, "# Report\n\nContent");
    }
}
