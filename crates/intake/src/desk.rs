//! Enquiry desk service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use trellis_core::{
    next_display_id, Customer, Enquiry, EnquiryId, EnquiryStatus, Project, ProjectId,
    ProjectStatus,
};
use trellis_storage::{Storage, StorageError};

/// Errors from enquiry operations.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// No enquiry with this id
    #[error("enquiry {0} not found")]
    EnquiryNotFound(EnquiryId),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Specification for creating an enquiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEnquiry {
    /// What the customer is asking for
    pub subject: String,

    /// Details
    pub description: String,

    /// Customer contact snapshot
    pub customer: Customer,
}

/// Fields to merge into an enquiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnquiryPatch {
    /// New subject
    pub subject: Option<String>,

    /// New description
    pub description: Option<String>,

    /// New customer snapshot
    pub customer: Option<Customer>,

    /// New status
    pub status: Option<EnquiryStatus>,
}

/// Enquiry desk service.
#[async_trait]
pub trait EnquiryDesk: Send + Sync {
    /// Record an enquiry with the next `ENQ-` display id.
    async fn create_enquiry(&mut self, spec: NewEnquiry) -> Result<Enquiry, IntakeError>;

    /// Load an enquiry by id.
    async fn get_enquiry(&self, id: EnquiryId) -> Result<Enquiry, IntakeError>;

    /// List all enquiries, oldest first.
    async fn list_enquiries(&self) -> Result<Vec<Enquiry>, IntakeError>;

    /// Merge fields into an enquiry.
    async fn update_enquiry(
        &mut self,
        id: EnquiryId,
        patch: EnquiryPatch,
    ) -> Result<Enquiry, IntakeError>;

    /// Delete an enquiry without converting it.
    async fn delete_enquiry(&mut self, id: EnquiryId) -> Result<(), IntakeError>;

    /// Turn an enquiry into a project.
    ///
    /// The project inherits the customer snapshot, starts with an empty
    /// forest, and takes the next `PRJ-` display id. The enquiry is
    /// removed in the same storage operation; a failure leaves both
    /// sides untouched.
    async fn convert(&mut self, id: EnquiryId) -> Result<Project, IntakeError>;
}

/// Basic enquiry desk implementation.
pub struct BasicEnquiryDesk<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> BasicEnquiryDesk<S> {
    /// Create a desk owning its storage.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Create a desk over storage shared with other services.
    pub fn shared(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    async fn load(&self, id: EnquiryId) -> Result<Enquiry, IntakeError> {
        self.storage
            .lock()
            .await
            .load_enquiry(id)
            .await?
            .ok_or(IntakeError::EnquiryNotFound(id))
    }
}

#[async_trait]
impl<S: Storage + 'static> EnquiryDesk for BasicEnquiryDesk<S> {
    async fn create_enquiry(&mut self, spec: NewEnquiry) -> Result<Enquiry, IntakeError> {
        let mut storage = self.storage.lock().await;
        let existing = storage.list_enquiries().await?;
        let display_id =
            next_display_id("ENQ", existing.iter().map(|e| e.display_id.as_str()));

        let enquiry = Enquiry {
            id: EnquiryId::new(),
            display_id,
            subject: spec.subject,
            description: spec.description,
            customer: spec.customer,
            status: EnquiryStatus::Open,
            created_at: Utc::now(),
        };
        storage.save_enquiry(&enquiry).await?;
        info!("recorded enquiry {} ({})", enquiry.display_id, enquiry.id);
        Ok(enquiry)
    }

    async fn get_enquiry(&self, id: EnquiryId) -> Result<Enquiry, IntakeError> {
        self.load(id).await
    }

    async fn list_enquiries(&self) -> Result<Vec<Enquiry>, IntakeError> {
        Ok(self.storage.lock().await.list_enquiries().await?)
    }

    async fn update_enquiry(
        &mut self,
        id: EnquiryId,
        patch: EnquiryPatch,
    ) -> Result<Enquiry, IntakeError> {
        let mut enquiry = self.load(id).await?;
        if let Some(subject) = patch.subject {
            enquiry.subject = subject;
        }
        if let Some(description) = patch.description {
            enquiry.description = description;
        }
        if let Some(customer) = patch.customer {
            enquiry.customer = customer;
        }
        if let Some(status) = patch.status {
            enquiry.status = status;
        }
        self.storage.lock().await.save_enquiry(&enquiry).await?;
        Ok(enquiry)
    }

    async fn delete_enquiry(&mut self, id: EnquiryId) -> Result<(), IntakeError> {
        self.load(id).await?;
        self.storage.lock().await.delete_enquiry(id).await?;
        Ok(())
    }

    async fn convert(&mut self, id: EnquiryId) -> Result<Project, IntakeError> {
        let enquiry = self.load(id).await?;

        let mut storage = self.storage.lock().await;
        let existing = storage.list_projects().await?;
        let display_id =
            next_display_id("PRJ", existing.iter().map(|p| p.display_id.as_str()));

        let project = Project {
            id: ProjectId::new(),
            display_id,
            name: enquiry.subject.clone(),
            description: enquiry.description.clone(),
            customer: enquiry.customer.clone(),
            due_date: None,
            status: ProjectStatus::NotStarted,
            tasks: Vec::new(),
            revision: 0,
            created_at: Utc::now(),
        };
        storage.convert_enquiry(id, &project).await?;
        info!(
            "converted enquiry {} into project {}",
            enquiry.display_id, project.display_id
        );
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_storage::MemoryStorage;

    fn desk() -> BasicEnquiryDesk<MemoryStorage> {
        BasicEnquiryDesk::new(MemoryStorage::new())
    }

    fn spec(subject: &str) -> NewEnquiry {
        NewEnquiry {
            subject: subject.into(),
            description: "as discussed on the phone".into(),
            customer: Customer {
                name: "Acme".into(),
                phone: "555-0100".into(),
                address: "1 Main St".into(),
            },
        }
    }

    #[tokio::test]
    async fn enquiries_take_sequential_display_ids() {
        let mut desk = desk();
        let first = desk.create_enquiry(spec("Website")).await.unwrap();
        let second = desk.create_enquiry(spec("App")).await.unwrap();
        assert_eq!(first.display_id, "ENQ-0001");
        assert_eq!(second.display_id, "ENQ-0002");
        assert_eq!(first.status, EnquiryStatus::Open);
    }

    #[tokio::test]
    async fn patch_merges_fields() {
        let mut desk = desk();
        let enquiry = desk.create_enquiry(spec("Website")).await.unwrap();
        let updated = desk
            .update_enquiry(
                enquiry.id,
                EnquiryPatch {
                    status: Some(EnquiryStatus::Contacted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, EnquiryStatus::Contacted);
        assert_eq!(updated.subject, "Website");
    }

    #[tokio::test]
    async fn conversion_carries_the_customer_over() {
        let mut desk = desk();
        let enquiry = desk.create_enquiry(spec("Website")).await.unwrap();

        let project = desk.convert(enquiry.id).await.unwrap();
        assert_eq!(project.display_id, "PRJ-0001");
        assert_eq!(project.name, "Website");
        assert_eq!(project.customer.name, "Acme");
        assert_eq!(project.status, ProjectStatus::NotStarted);
        assert!(project.tasks.is_empty());

        // The enquiry is gone, the project persisted
        let err = desk.get_enquiry(enquiry.id).await.unwrap_err();
        assert!(matches!(err, IntakeError::EnquiryNotFound(_)));
        let stored = desk
            .storage
            .lock()
            .await
            .load_project(project.id)
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn converting_a_missing_enquiry_fails() {
        let mut desk = desk();
        let err = desk.convert(EnquiryId::new()).await.unwrap_err();
        assert!(matches!(err, IntakeError::EnquiryNotFound(_)));
    }
}
