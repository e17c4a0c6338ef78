//! JSON file storage implementation.
//!
//! Stores one pretty-printed JSON file per document under a root
//! directory (`projects/`, `enquiries/`, `settlements/`). The project
//! revision counter lives on the document itself and is compared
//! against the stored copy before every write.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use trellis_core::{Enquiry, EnquiryId, Project, ProjectId, Settlement, SettlementId};
use tokio::fs;

use super::{Result, Storage, StorageError};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage, ensuring the per-collection subdirectories exist.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("projects")).await?;
        fs::create_dir_all(root.join("enquiries")).await?;
        fs::create_dir_all(root.join("settlements")).await?;

        Ok(Self { root })
    }

    fn project_path(&self, id: ProjectId) -> PathBuf {
        self.root.join("projects").join(format!("{}.json", id))
    }
    fn enquiry_path(&self, id: EnquiryId) -> PathBuf {
        self.root.join("enquiries").join(format!("{}.json", id))
    }
    fn settlement_path(&self, id: SettlementId) -> PathBuf {
        self.root.join("settlements").join(format!("{}.json", id))
    }

    /// Revision-check `project` against the stored copy and return the
    /// document to write (revision bumped).
    async fn checked_bump(&self, project: &Project) -> Result<Project> {
        let stored = read_json::<Project>(&self.project_path(project.id)).await?;
        match stored {
            Some(existing) => {
                if existing.revision != project.revision {
                    return Err(StorageError::RevisionConflict {
                        stored: existing.revision,
                        written: project.revision,
                    });
                }
            }
            None => {
                if project.revision != 0 {
                    return Err(StorageError::NotFound(format!("project {}", project.id)));
                }
            }
        }
        let mut next = project.clone();
        next.revision = project.revision + 1;
        Ok(next)
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_project(&mut self, project: &Project) -> Result<()> {
        let next = self.checked_bump(project).await?;
        let json = serde_json::to_string_pretty(&next)?;
        fs::write(self.project_path(next.id), json.as_bytes()).await?;
        debug!("saved project {} at revision {}", next.id, next.revision);
        Ok(())
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        read_json(&self.project_path(id)).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = list_dir(&self.root.join("projects")).await?;
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        remove_if_present(&self.project_path(id)).await
    }

    async fn save_enquiry(&mut self, enquiry: &Enquiry) -> Result<()> {
        let json = serde_json::to_string_pretty(enquiry)?;
        fs::write(self.enquiry_path(enquiry.id), json.as_bytes()).await?;
        Ok(())
    }

    async fn load_enquiry(&self, id: EnquiryId) -> Result<Option<Enquiry>> {
        read_json(&self.enquiry_path(id)).await
    }

    async fn list_enquiries(&self) -> Result<Vec<Enquiry>> {
        let mut enquiries: Vec<Enquiry> = list_dir(&self.root.join("enquiries")).await?;
        enquiries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(enquiries)
    }

    async fn delete_enquiry(&mut self, id: EnquiryId) -> Result<()> {
        remove_if_present(&self.enquiry_path(id)).await
    }

    async fn save_settlement(&mut self, settlement: &Settlement) -> Result<()> {
        let json = serde_json::to_string_pretty(settlement)?;
        fs::write(self.settlement_path(settlement.id), json.as_bytes()).await?;
        Ok(())
    }

    async fn load_settlement(&self, id: SettlementId) -> Result<Option<Settlement>> {
        read_json(&self.settlement_path(id)).await
    }

    async fn list_settlements(&self) -> Result<Vec<Settlement>> {
        let mut settlements: Vec<Settlement> = list_dir(&self.root.join("settlements")).await?;
        settlements.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(settlements)
    }

    async fn delete_settlement(&mut self, id: SettlementId) -> Result<()> {
        remove_if_present(&self.settlement_path(id)).await
    }

    async fn convert_enquiry(&mut self, enquiry: EnquiryId, project: &Project) -> Result<()> {
        let enquiry_path = self.enquiry_path(enquiry);
        if read_json::<Enquiry>(&enquiry_path).await?.is_none() {
            return Err(StorageError::NotFound(format!("enquiry {}", enquiry)));
        }

        self.save_project(project).await?;

        if let Err(e) = fs::remove_file(&enquiry_path).await {
            // Undo the project write so neither side moves
            let _ = fs::remove_file(self.project_path(project.id)).await;
            return Err(e.into());
        }

        info!("converted enquiry {} into project {}", enquiry, project.id);
        Ok(())
    }
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
        if let Ok(Some(item)) = read_json(&entry.path()).await {
            items.push(item);
        }
    }
    Ok(items)
}

async fn remove_if_present(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(e)
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trellis_core::{Customer, EnquiryStatus, ProjectStatus};

    fn sample_project(name: &str) -> Project {
        Project {
            id: ProjectId::new(),
            display_id: "PRJ-0001".into(),
            name: name.into(),
            description: String::new(),
            customer: Customer {
                name: "Acme".into(),
                phone: "555-0100".into(),
                address: "1 Main St".into(),
            },
            due_date: None,
            status: ProjectStatus::NotStarted,
            tasks: Vec::new(),
            revision: 0,
            created_at: Utc::now(),
        }
    }

    fn sample_enquiry() -> Enquiry {
        Enquiry {
            id: EnquiryId::new(),
            display_id: "ENQ-0001".into(),
            subject: "New website".into(),
            description: String::new(),
            customer: Customer {
                name: "Acme".into(),
                phone: "555-0100".into(),
                address: "1 Main St".into(),
            },
            status: EnquiryStatus::Open,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn project_round_trip_bumps_revision() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();

        let project = sample_project("Alpha");
        storage.save_project(&project).await.unwrap();

        let loaded = storage.load_project(project.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Alpha");
        assert_eq!(loaded.revision, 1);
    }

    #[tokio::test]
    async fn stale_write_is_a_revision_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();

        let project = sample_project("Alpha");
        storage.save_project(&project).await.unwrap();

        let first = storage.load_project(project.id).await.unwrap().unwrap();
        let second = storage.load_project(project.id).await.unwrap().unwrap();

        let mut winner = first;
        winner.name = "Alpha (renamed)".into();
        storage.save_project(&winner).await.unwrap();

        let mut loser = second;
        loser.name = "Alpha (stale)".into();
        let err = storage.save_project(&loser).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::RevisionConflict { stored: 2, written: 1 }
        ));

        // The loser changed nothing
        let stored = storage.load_project(project.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Alpha (renamed)");
    }

    #[tokio::test]
    async fn saving_a_missing_document_with_history_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();

        let mut project = sample_project("Ghost");
        project.revision = 3;
        let err = storage.save_project(&project).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn conversion_removes_enquiry_and_creates_project() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();

        let enquiry = sample_enquiry();
        storage.save_enquiry(&enquiry).await.unwrap();

        let project = sample_project("From enquiry");
        storage.convert_enquiry(enquiry.id, &project).await.unwrap();

        assert!(storage.load_enquiry(enquiry.id).await.unwrap().is_none());
        assert!(storage.load_project(project.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn converting_a_missing_enquiry_leaves_no_project_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();

        let project = sample_project("Orphan");
        let err = storage
            .convert_enquiry(EnquiryId::new(), &project)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(storage.load_project(project.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();

        let project = sample_project("Gone");
        storage.save_project(&project).await.unwrap();
        storage.delete_project(project.id).await.unwrap();
        storage.delete_project(project.id).await.unwrap();
        assert!(storage.load_project(project.id).await.unwrap().is_none());
    }
}
