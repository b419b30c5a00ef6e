//! JSON file storage implementation.
//!
//! Stores each record as a JSON file under a `.labman` directory and keeps a
//! small per-object meta marker (version + updated_at) next to the versioned
//! records. The marker is what the optimistic version check reads.

use std::path::{Path, PathBuf};
use labman_core::{
    Classroom, ClassroomId, LabSubmission, Progress, ProgressId, Project, ProjectId, SubmissionId,
};
use super::trait_::check_version;
use super::{ProgressFilter, Result, Storage, SubmissionFilter};
use tokio::fs;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage, creating the data and meta directories as needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Ensure primary directories
        fs::create_dir_all(root.join("classrooms")).await?;
        fs::create_dir_all(root.join("projects")).await?;
        fs::create_dir_all(root.join("progress")).await?;
        fs::create_dir_all(root.join("submissions")).await?;

        // Version markers for records written under the version check
        fs::create_dir_all(root.join("meta").join("progress")).await?;
        fs::create_dir_all(root.join("meta").join("submissions")).await?;

        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn classroom_path(&self, id: ClassroomId) -> PathBuf {
        self.root.join("classrooms").join(format!("{}.json", id))
    }
    fn project_path(&self, id: ProjectId) -> PathBuf {
        self.root.join("projects").join(format!("{}.json", id))
    }
    fn progress_path(&self, id: ProgressId) -> PathBuf {
        self.root.join("progress").join(format!("{}.json", id))
    }
    fn submission_path(&self, id: SubmissionId) -> PathBuf {
        self.root.join("submissions").join(format!("{}.json", id))
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Read the stored per-object version, if any.
    async fn stored_version(&self, kind: &str, id: &str) -> Result<Option<u64>> {
        match fs::read_to_string(self.meta_path(kind, id)).await {
            Ok(s) => {
                let json: serde_json::Value = serde_json::from_str(&s)?;
                Ok(json.get("version").and_then(|v| v.as_u64()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check the incoming version against the marker, returning the next one.
    async fn next_version(&self, kind: &str, id: &str, incoming: u64) -> Result<u64> {
        let stored = self.stored_version(kind, id).await?;
        check_version(&format!("{} {}", kind, id), incoming, stored)
    }

    /// Advance the marker once the record itself is on disk.
    async fn write_marker(&self, kind: &str, id: &str, version: u64) -> Result<()> {
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        write_json(&self.meta_path(kind, id), &meta).await
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_classroom(&mut self, classroom: &Classroom) -> Result<()> {
        write_json(&self.classroom_path(classroom.id), classroom).await
    }

    async fn load_classroom(&self, id: ClassroomId) -> Result<Option<Classroom>> {
        read_json(&self.classroom_path(id)).await
    }

    async fn save_project(&mut self, project: &Project) -> Result<()> {
        write_json(&self.project_path(project.id), project).await
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        read_json(&self.project_path(id)).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        list_dir(&self.root.join("projects")).await
    }

    async fn save_progress(&mut self, progress: &Progress) -> Result<u64> {
        let id_str = progress.id.to_string();
        let version = self.next_version("progress", &id_str, progress.version).await?;

        let mut stored = progress.clone();
        stored.version = version;
        write_json(&self.progress_path(progress.id), &stored).await?;
        self.write_marker("progress", &id_str, version).await?;

        tracing::debug!(progress = %progress.id, version, "saved progress");
        Ok(version)
    }

    async fn load_progress(&self, id: ProgressId) -> Result<Option<Progress>> {
        read_json(&self.progress_path(id)).await
    }

    async fn list_progress(&self, filter: &ProgressFilter) -> Result<Vec<Progress>> {
        let all: Vec<Progress> = list_dir(&self.root.join("progress")).await?;
        Ok(all.into_iter().filter(|p| filter.matches(p)).collect())
    }

    async fn save_submission(&mut self, submission: &LabSubmission) -> Result<u64> {
        let id_str = submission.id.to_string();
        let version = self.next_version("submissions", &id_str, submission.version).await?;

        let mut stored = submission.clone();
        stored.version = version;
        write_json(&self.submission_path(submission.id), &stored).await?;
        self.write_marker("submissions", &id_str, version).await?;

        tracing::debug!(submission = %submission.id, version, "saved submission");
        Ok(version)
    }

    async fn load_submission(&self, id: SubmissionId) -> Result<Option<LabSubmission>> {
        read_json(&self.submission_path(id)).await
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<LabSubmission>> {
        let all: Vec<LabSubmission> = list_dir(&self.root.join("submissions")).await?;
        let mut matching: Vec<LabSubmission> = all.into_iter().filter(|s| filter.matches(s)).collect();
        matching.sort_by(|a, b| a.attempt.cmp(&b.attempt).then(a.created_at.cmp(&b.created_at)));
        Ok(matching)
    }
}

/// Write through a sibling temp file so a failed write never leaves a torn record.
async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        // an unreadable record fails the listing; attempt numbering and the
        // one-record-per-pair lookup both depend on seeing every record
        match read_json(&entry.path()).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(path = %entry.path().display(), error = %e, "unreadable record");
                return Err(e);
            }
        }
    }
    Ok(items)
}
