//! Settlement management service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;
use trellis_core::{
    tree, Payment, PaymentId, Project, ProjectId, Settlement, SettlementId, Task,
};
use trellis_storage::{Storage, StorageError};

/// Errors from settlement operations.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// No project with this id
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    /// No settlement with this id
    #[error("settlement {0} not found")]
    SettlementNotFound(SettlementId),

    /// Payments must be positive
    #[error("invalid payment amount {0}")]
    InvalidAmount(f64),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Billable total over a forest: `estimated_hours x cost_per_hour`,
/// summed over every task that carries both.
pub fn billable_total(forest: &[Task]) -> f64 {
    let mut total = 0.0;
    tree::for_each(forest, &mut |task| {
        if let (Some(hours), Some(rate)) = (task.estimated_hours, task.cost_per_hour) {
            total += hours * rate;
        }
    });
    total
}

/// Settlement management service.
#[async_trait]
pub trait SettlementManager: Send + Sync {
    /// Open a settlement for a project, computing its billable total
    /// from the current task forest.
    async fn open_settlement(&mut self, project: ProjectId) -> Result<Settlement, BillingError>;

    /// Load a settlement by id.
    async fn get_settlement(&self, id: SettlementId) -> Result<Settlement, BillingError>;

    /// List settlements, optionally for one project, oldest first.
    async fn list_settlements(
        &self,
        project: Option<ProjectId>,
    ) -> Result<Vec<Settlement>, BillingError>;

    /// Record a payment and return the updated settlement.
    async fn record_payment(
        &mut self,
        id: SettlementId,
        amount: f64,
        reference: String,
    ) -> Result<Settlement, BillingError>;

    /// Recompute the billable total from the project's current forest.
    async fn refresh_total(&mut self, id: SettlementId) -> Result<Settlement, BillingError>;

    /// Delete a settlement.
    async fn delete_settlement(&mut self, id: SettlementId) -> Result<(), BillingError>;
}

/// Basic settlement manager implementation.
pub struct BasicSettlementManager<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> BasicSettlementManager<S> {
    /// Create a manager owning its storage.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Create a manager over storage shared with other services.
    pub fn shared(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    async fn load_project(&self, id: ProjectId) -> Result<Project, BillingError> {
        self.storage
            .lock()
            .await
            .load_project(id)
            .await?
            .ok_or(BillingError::ProjectNotFound(id))
    }

    async fn load(&self, id: SettlementId) -> Result<Settlement, BillingError> {
        self.storage
            .lock()
            .await
            .load_settlement(id)
            .await?
            .ok_or(BillingError::SettlementNotFound(id))
    }
}

#[async_trait]
impl<S: Storage + 'static> SettlementManager for BasicSettlementManager<S> {
    async fn open_settlement(&mut self, project: ProjectId) -> Result<Settlement, BillingError> {
        let doc = self.load_project(project).await?;
        let settlement = Settlement {
            id: SettlementId::new(),
            project_id: project,
            total: billable_total(&doc.tasks),
            payments: Vec::new(),
            created_at: Utc::now(),
        };
        self.storage
            .lock()
            .await
            .save_settlement(&settlement)
            .await?;
        info!(
            "opened settlement {} for project {} at total {:.2}",
            settlement.id, project, settlement.total
        );
        Ok(settlement)
    }

    async fn get_settlement(&self, id: SettlementId) -> Result<Settlement, BillingError> {
        self.load(id).await
    }

    async fn list_settlements(
        &self,
        project: Option<ProjectId>,
    ) -> Result<Vec<Settlement>, BillingError> {
        let all = self.storage.lock().await.list_settlements().await?;
        Ok(match project {
            Some(project) => all.into_iter().filter(|s| s.project_id == project).collect(),
            None => all,
        })
    }

    async fn record_payment(
        &mut self,
        id: SettlementId,
        amount: f64,
        reference: String,
    ) -> Result<Settlement, BillingError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(BillingError::InvalidAmount(amount));
        }
        let mut settlement = self.load(id).await?;
        settlement.payments.push(Payment {
            id: PaymentId::new(),
            amount,
            paid_at: Utc::now(),
            reference,
        });
        self.storage
            .lock()
            .await
            .save_settlement(&settlement)
            .await?;
        Ok(settlement)
    }

    async fn refresh_total(&mut self, id: SettlementId) -> Result<Settlement, BillingError> {
        let mut settlement = self.load(id).await?;
        let doc = self.load_project(settlement.project_id).await?;
        settlement.total = billable_total(&doc.tasks);
        self.storage
            .lock()
            .await
            .save_settlement(&settlement)
            .await?;
        Ok(settlement)
    }

    async fn delete_settlement(&mut self, id: SettlementId) -> Result<(), BillingError> {
        self.load(id).await?;
        self.storage.lock().await.delete_settlement(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Customer, ProjectStatus, SettlementStatus, TaskId, TaskPath};
    use trellis_storage::MemoryStorage;

    fn billable(name: &str, hours: f64, rate: f64) -> Task {
        Task {
            id: TaskId::new(),
            name: name.into(),
            description: String::new(),
            estimated_hours: Some(hours),
            cost_per_hour: Some(rate),
            deadline: None,
            completed: false,
            assignees: Vec::new(),
            percentage: None,
            time_entries: Vec::new(),
            children: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Design (10h x 80) { Wireframes (5h x 60) }, plus one task
    /// without a rate that must not bill.
    async fn seed() -> (BasicSettlementManager<MemoryStorage>, ProjectId) {
        let mut design = billable("Design", 10.0, 80.0);
        design.children.push(billable("Wireframes", 5.0, 60.0));
        let mut unpriced = billable("Research", 3.0, 0.0);
        unpriced.cost_per_hour = None;

        let project = Project {
            id: ProjectId::new(),
            display_id: "PRJ-0001".into(),
            name: "Rollout".into(),
            description: String::new(),
            customer: Customer::default(),
            due_date: None,
            status: ProjectStatus::Ongoing,
            tasks: vec![design, unpriced],
            revision: 0,
            created_at: Utc::now(),
        };
        let mut storage = MemoryStorage::new();
        storage.save_project(&project).await.unwrap();
        (BasicSettlementManager::new(storage), project.id)
    }

    #[tokio::test]
    async fn total_sums_priced_tasks_at_every_depth() {
        let (mut manager, project) = seed().await;
        let settlement = manager.open_settlement(project).await.unwrap();
        assert!((settlement.total - 1100.0).abs() < f64::EPSILON);
        assert_eq!(settlement.status(), SettlementStatus::Pending);
    }

    #[tokio::test]
    async fn payments_move_the_derived_status() {
        let (mut manager, project) = seed().await;
        let settlement = manager.open_settlement(project).await.unwrap();

        let partial = manager
            .record_payment(settlement.id, 300.0, "INV-1".into())
            .await
            .unwrap();
        assert_eq!(partial.status(), SettlementStatus::Partial);
        assert!((partial.paid() - 300.0).abs() < f64::EPSILON);

        let full = manager
            .record_payment(settlement.id, 800.0, "INV-2".into())
            .await
            .unwrap();
        assert_eq!(full.status(), SettlementStatus::Completed);
    }

    #[tokio::test]
    async fn non_positive_payments_are_rejected() {
        let (mut manager, project) = seed().await;
        let settlement = manager.open_settlement(project).await.unwrap();
        let err = manager
            .record_payment(settlement.id, 0.0, "INV-0".into())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn refresh_recomputes_from_the_current_forest() {
        let (mut manager, project) = seed().await;
        let settlement = manager.open_settlement(project).await.unwrap();

        // Price the research task after the settlement was opened
        {
            let mut storage = manager.storage.lock().await;
            let mut doc = storage.load_project(project).await.unwrap().unwrap();
            let research_path = TaskPath::new(vec![doc.tasks[1].id]);
            tree::node_at_mut(&mut doc.tasks, &research_path)
                .unwrap()
                .cost_per_hour = Some(100.0);
            storage.save_project(&doc).await.unwrap();
        }

        let refreshed = manager.refresh_total(settlement.id).await.unwrap();
        assert!((refreshed.total - 1400.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn listing_filters_by_project() {
        let (mut manager, project) = seed().await;
        manager.open_settlement(project).await.unwrap();
        manager.open_settlement(project).await.unwrap();

        assert_eq!(manager.list_settlements(None).await.unwrap().len(), 2);
        assert_eq!(
            manager
                .list_settlements(Some(project))
                .await
                .unwrap()
                .len(),
            2
        );
        assert!(manager
            .list_settlements(Some(ProjectId::new()))
            .await
            .unwrap()
            .is_empty());
    }
}
