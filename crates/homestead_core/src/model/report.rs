//! Read-only aggregate shapes produced by the revenue queries.

use crate::model::bill::BillType;
use crate::model::household::HouseholdId;
use crate::model::period::BillingPeriod;
use chrono::NaiveDate;
use serde::Serialize;

/// Amount and row count for one bill type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeTotal {
    pub bill_type: BillType,
    pub total_amount: i64,
    pub count: u64,
}

/// Paid-item revenue for one calendar month, by bill type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRevenue {
    pub period: BillingPeriod,
    pub total_revenue: i64,
    pub total_items: u64,
    /// Sorted by `total_amount` descending.
    pub breakdown: Vec<TypeTotal>,
}

impl MonthlyRevenue {
    pub fn from_breakdown(period: BillingPeriod, breakdown: Vec<TypeTotal>) -> Self {
        let total_revenue = breakdown.iter().map(|entry| entry.total_amount).sum();
        let total_items = breakdown.iter().map(|entry| entry.count).sum();
        Self {
            period,
            total_revenue,
            total_items,
            breakdown,
        }
    }
}

/// Unpaid, past-due item flattened with its household.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueItemRow {
    pub bill_type: BillType,
    pub household_id: HouseholdId,
    pub household_name: String,
    pub head_national_id: String,
    pub address: String,
    pub amount: i64,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueHousehold {
    pub household_id: HouseholdId,
    pub household_name: String,
    pub head_national_id: String,
    pub address: String,
    pub overdue_count: u64,
    pub overdue_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueByType {
    pub bill_type: BillType,
    pub total_households: u64,
    pub total_overdue_amount: i64,
    pub total_overdue_items: u64,
    pub households: Vec<OverdueHousehold>,
}

/// Unpaid items past their due date, grouped by bill type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueReport {
    pub as_of: NaiveDate,
    pub period: Option<BillingPeriod>,
    pub by_type: Vec<OverdueByType>,
}

/// Admin statistics for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub period: BillingPeriod,
    pub total_households: u64,
    pub monthly_revenue: i64,
    pub households_with_unpaid_items: u64,
}
