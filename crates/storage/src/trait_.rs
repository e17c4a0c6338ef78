//! Storage trait abstraction.

use async_trait::async_trait;
use trellis_core::{Enquiry, EnquiryId, Project, ProjectId, Settlement, SettlementId};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent writer got there first
    #[error("revision conflict: stored document is at revision {stored}, write carried {written}")]
    RevisionConflict {
        /// Revision of the document on disk
        stored: u64,
        /// Revision the rejected write carried
        written: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for Trellis documents.
///
/// Project writes are revision-checked: the incoming document's `revision`
/// must equal the stored one (0 for a document that does not exist yet),
/// and the stored copy is saved with `revision + 1`. A losing concurrent
/// writer gets [`StorageError::RevisionConflict`] instead of silently
/// overwriting - the in-memory copy is stale after a successful save and
/// must be reloaded before the next write.
///
/// Enquiries and settlements are flat records with last-write-wins saves.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Project documents ===

    /// Save a project (create or update), revision-checked.
    async fn save_project(&mut self, project: &Project) -> Result<()>;

    /// Load a project by id.
    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// List all projects.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Delete a project. Deleting a missing project is a no-op.
    async fn delete_project(&mut self, id: ProjectId) -> Result<()>;

    // === Enquiries ===

    /// Save an enquiry (create or update).
    async fn save_enquiry(&mut self, enquiry: &Enquiry) -> Result<()>;

    /// Load an enquiry by id.
    async fn load_enquiry(&self, id: EnquiryId) -> Result<Option<Enquiry>>;

    /// List all enquiries.
    async fn list_enquiries(&self) -> Result<Vec<Enquiry>>;

    /// Delete an enquiry. Deleting a missing enquiry is a no-op.
    async fn delete_enquiry(&mut self, id: EnquiryId) -> Result<()>;

    // === Settlements ===

    /// Save a settlement (create or update).
    async fn save_settlement(&mut self, settlement: &Settlement) -> Result<()>;

    /// Load a settlement by id.
    async fn load_settlement(&self, id: SettlementId) -> Result<Option<Settlement>>;

    /// List all settlements.
    async fn list_settlements(&self) -> Result<Vec<Settlement>>;

    /// Delete a settlement. Deleting a missing settlement is a no-op.
    async fn delete_settlement(&mut self, id: SettlementId) -> Result<()>;

    // === Conversion ===

    /// Atomically replace an enquiry with the project it became.
    ///
    /// Fails with [`StorageError::NotFound`] if the enquiry is missing.
    /// Neither side survives a failure half-applied.
    async fn convert_enquiry(&mut self, enquiry: EnquiryId, project: &Project) -> Result<()>;
}
