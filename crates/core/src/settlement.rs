//! Settlement model - customer-facing financials for a project.

use serde::{Deserialize, Serialize};
use crate::id::{PaymentId, ProjectId, SettlementId};
use crate::Time;

/// A settlement aggregates discrete payments against a billable total
/// computed from the project's task forest. Status is derived on read,
/// never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    /// Unique identifier
    pub id: SettlementId,

    /// Project this settlement bills for
    pub project_id: ProjectId,

    /// Billable total (sum of estimated hours x rate over the forest)
    pub total: f64,

    /// Recorded payments
    pub payments: Vec<Payment>,

    /// Creation timestamp
    pub created_at: Time,
}

/// One recorded payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,

    /// Amount paid
    pub amount: f64,

    /// When it was paid
    pub paid_at: Time,

    /// Bank or invoice reference
    pub reference: String,
}

/// Derived settlement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettlementStatus {
    /// Nothing paid yet
    Pending,

    /// Some but not all paid
    Partial,

    /// Paid in full (or over)
    Completed,
}

impl Settlement {
    /// Sum of recorded payments.
    pub fn paid(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Status derived from paid sum vs. total.
    pub fn status(&self) -> SettlementStatus {
        let paid = self.paid();
        if paid <= 0.0 {
            SettlementStatus::Pending
        } else if paid < self.total {
            SettlementStatus::Partial
        } else {
            SettlementStatus::Completed
        }
    }
}
