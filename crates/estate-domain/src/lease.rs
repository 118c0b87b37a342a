//! Occupancy contracts: leases, outright sales, and tenant maintenance requests.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// A rental agreement binding a tenant to a unit for a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lease {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent: f64,
    #[serde(default)]
    pub deposit: f64,
    #[serde(default)]
    pub billing: TimeInterval,
    pub status: LeaseStatus,
    /// Last rent due date already invoiced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billed_through: Option<NaiveDate>,
}

impl Lease {
    pub fn new(
        unit_id: Uuid,
        tenant_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        rent: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit_id,
            tenant_id,
            start_date,
            end_date,
            rent,
            deposit: 0.0,
            billing: TimeInterval::monthly(),
            status: LeaseStatus::Draft,
            billed_through: None,
        }
    }

    pub fn with_deposit(mut self, deposit: f64) -> Self {
        self.deposit = deposit;
        self
    }

    pub fn activated(mut self) -> Self {
        self.status = LeaseStatus::Active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == LeaseStatus::Active
    }

    pub fn period(&self) -> (NaiveDate, NaiveDate) {
        (self.start_date, self.end_date)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

impl Identifiable for Lease {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    Draft,
    Active,
    Terminated,
    Expired,
}

crate::labelled_enum!(LeaseStatus {
    Draft => "draft",
    Active => "active",
    Terminated => "terminated",
    Expired => "expired",
});

impl LeaseStatus {
    pub fn can_transition_to(self, next: LeaseStatus) -> bool {
        matches!(
            (self, next),
            (LeaseStatus::Draft, LeaseStatus::Active)
                | (LeaseStatus::Draft, LeaseStatus::Terminated)
                | (LeaseStatus::Active, LeaseStatus::Terminated)
                | (LeaseStatus::Active, LeaseStatus::Expired)
        )
    }
}

/// A single rent installment produced from a lease's billing cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RentDue {
    pub due_date: NaiveDate,
    pub amount: f64,
}

/// An outright unit purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub buyer_id: Uuid,
    pub sale_date: NaiveDate,
    pub price: f64,
    pub status: SaleStatus,
}

impl Sale {
    pub fn new(unit_id: Uuid, buyer_id: Uuid, sale_date: NaiveDate, price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit_id,
            buyer_id,
            sale_date,
            price,
            status: SaleStatus::Pending,
        }
    }
}

impl Identifiable for Sale {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Completed,
    Refunded,
    Cancelled,
}

crate::labelled_enum!(SaleStatus {
    Pending => "pending",
    Completed => "completed",
    Refunded => "refunded",
    Cancelled => "cancelled",
});

impl SaleStatus {
    pub fn can_transition_to(self, next: SaleStatus) -> bool {
        matches!(
            (self, next),
            (SaleStatus::Pending, SaleStatus::Completed)
                | (SaleStatus::Pending, SaleStatus::Cancelled)
                | (SaleStatus::Completed, SaleStatus::Refunded)
        )
    }

    /// Whether a sale in this status keeps the unit off the market.
    pub fn holds_unit(self) -> bool {
        matches!(self, SaleStatus::Pending | SaleStatus::Completed)
    }
}

/// A tenant-raised repair or service request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Uuid>,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub status: MaintenanceStatus,
    pub created_at: DateTime<Utc>,
}

impl MaintenanceRequest {
    pub fn new(
        tenant_id: Uuid,
        subject: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            unit_id: None,
            subject: subject.into(),
            description: description.into(),
            priority,
            status: MaintenanceStatus::Open,
            created_at,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            MaintenanceStatus::Open | MaintenanceStatus::InProgress
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

crate::labelled_enum!(MaintenanceStatus {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_transitions_follow_lifecycle() {
        assert!(LeaseStatus::Draft.can_transition_to(LeaseStatus::Active));
        assert!(LeaseStatus::Active.can_transition_to(LeaseStatus::Expired));
        assert!(!LeaseStatus::Terminated.can_transition_to(LeaseStatus::Active));
        assert!(!LeaseStatus::Draft.can_transition_to(LeaseStatus::Expired));
    }

    #[test]
    fn refunded_sale_releases_unit() {
        assert!(SaleStatus::Completed.holds_unit());
        assert!(!SaleStatus::Refunded.holds_unit());
        assert!(SaleStatus::Completed.can_transition_to(SaleStatus::Refunded));
        assert!(!SaleStatus::Refunded.can_transition_to(SaleStatus::Completed));
    }
}
