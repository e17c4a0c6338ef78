//! In-memory storage backend.
//!
//! Same revision semantics as the JSON backend, with no I/O. This is the
//! backend the service crates test against.

use std::collections::HashMap;

use trellis_core::{Enquiry, EnquiryId, Project, ProjectId, Settlement, SettlementId};

use super::{Result, Storage, StorageError};

/// HashMap-backed storage, for tests and embedded use.
#[derive(Default)]
pub struct MemoryStorage {
    projects: HashMap<ProjectId, Project>,
    enquiries: HashMap<EnquiryId, Enquiry>,
    settlements: HashMap<SettlementId, Settlement>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn save_project(&mut self, project: &Project) -> Result<()> {
        match self.projects.get(&project.id) {
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
        self.projects.insert(next.id, next);
        Ok(())
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        self.projects.remove(&id);
        Ok(())
    }

    async fn save_enquiry(&mut self, enquiry: &Enquiry) -> Result<()> {
        self.enquiries.insert(enquiry.id, enquiry.clone());
        Ok(())
    }

    async fn load_enquiry(&self, id: EnquiryId) -> Result<Option<Enquiry>> {
        Ok(self.enquiries.get(&id).cloned())
    }

    async fn list_enquiries(&self) -> Result<Vec<Enquiry>> {
        let mut enquiries: Vec<Enquiry> = self.enquiries.values().cloned().collect();
        enquiries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(enquiries)
    }

    async fn delete_enquiry(&mut self, id: EnquiryId) -> Result<()> {
        self.enquiries.remove(&id);
        Ok(())
    }

    async fn save_settlement(&mut self, settlement: &Settlement) -> Result<()> {
        self.settlements.insert(settlement.id, settlement.clone());
        Ok(())
    }

    async fn load_settlement(&self, id: SettlementId) -> Result<Option<Settlement>> {
        Ok(self.settlements.get(&id).cloned())
    }

    async fn list_settlements(&self) -> Result<Vec<Settlement>> {
        let mut settlements: Vec<Settlement> = self.settlements.values().cloned().collect();
        settlements.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(settlements)
    }

    async fn delete_settlement(&mut self, id: SettlementId) -> Result<()> {
        self.settlements.remove(&id);
        Ok(())
    }

    async fn convert_enquiry(&mut self, enquiry: EnquiryId, project: &Project) -> Result<()> {
        if !self.enquiries.contains_key(&enquiry) {
            return Err(StorageError::NotFound(format!("enquiry {}", enquiry)));
        }
        self.save_project(project).await?;
        self.enquiries.remove(&enquiry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trellis_core::{Customer, ProjectStatus};

    fn sample_project() -> Project {
        Project {
            id: ProjectId::new(),
            display_id: "PRJ-0001".into(),
            name: "Alpha".into(),
            description: String::new(),
            customer: Customer::default(),
            due_date: None,
            status: ProjectStatus::NotStarted,
            tasks: Vec::new(),
            revision: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn revision_semantics_match_the_json_backend() {
        let mut storage = MemoryStorage::new();
        let project = sample_project();
        storage.save_project(&project).await.unwrap();

        let loaded = storage.load_project(project.id).await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);

        // A stale copy loses
        let err = storage.save_project(&project).await.unwrap_err();
        assert!(matches!(err, StorageError::RevisionConflict { .. }));
    }

    #[tokio::test]
    async fn converting_a_missing_enquiry_is_not_found() {
        let mut storage = MemoryStorage::new();
        let err = storage
            .convert_enquiry(EnquiryId::new(), &sample_project())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
