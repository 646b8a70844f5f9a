//! Bill aggregate and its itemized charges.
//!
//! # Invariants
//! - A bill belongs to exactly one household and has one fixed `BillType`.
//! - Metered items satisfy `new_index > old_index` and
//!   `amount = (new_index - old_index) * unit_price`.
//! - Flat-fee items have `old_index = new_index = 0` and `amount = unit_price`.
//! - `status == true` if and only if `paid_at.is_some()`.
//! - `created_at` never changes after creation.

use crate::model::household::HouseholdSummary;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BillId = Uuid;
pub type BillItemId = Uuid;

/// Fixed set of billable charge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    Electricity,
    Water,
    Garbage,
    Management,
    Parking,
    Other,
}

impl BillType {
    pub const ALL: [BillType; 6] = [
        BillType::Electricity,
        BillType::Water,
        BillType::Garbage,
        BillType::Management,
        BillType::Parking,
        BillType::Other,
    ];

    /// Metered types derive their amount from a meter-reading delta.
    pub fn is_metered(self) -> bool {
        matches!(self, BillType::Electricity | BillType::Water)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BillType::Electricity => "electricity",
            BillType::Water => "water",
            BillType::Garbage => "garbage",
            BillType::Management => "management",
            BillType::Parking => "parking",
            BillType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "electricity" => Some(BillType::Electricity),
            "water" => Some(BillType::Water),
            "garbage" => Some(BillType::Garbage),
            "management" => Some(BillType::Management),
            "parking" => Some(BillType::Parking),
            "other" => Some(BillType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independently payable charge line inside a bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillItem {
    pub id: BillItemId,
    pub old_index: i64,
    pub new_index: i64,
    pub unit_price: i64,
    pub amount: i64,
    pub due_date: NaiveDate,
    /// Epoch ms, set once at creation.
    pub created_at: i64,
    /// `false` = unpaid, `true` = paid.
    pub status: bool,
    /// Epoch ms; present only while `status` is `true`.
    pub paid_at: Option<i64>,
}

impl BillItem {
    pub fn is_paid(&self) -> bool {
        self.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub household: HouseholdSummary,
    #[serde(rename = "type")]
    pub bill_type: BillType,
    pub description: Option<String>,
    /// Items in stored order; `create_transaction` addresses them by index.
    pub items: Vec<BillItem>,
    pub created_at: i64,
}

impl Bill {
    pub fn item(&self, item_id: BillItemId) -> Option<&BillItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Creation time of the newest item, used for listing order.
    pub fn latest_item_created_at(&self) -> Option<i64> {
        self.items.iter().map(|item| item.created_at).max()
    }

    pub fn outstanding_amount(&self) -> i64 {
        self.items
            .iter()
            .filter(|item| !item.status)
            .map(|item| item.amount)
            .sum()
    }
}

/// Whether a status write changed the stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChange {
    Updated,
    /// The item already had the requested status; nothing was written.
    Unchanged,
}

/// Bill read-back after an item status write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub bill: Bill,
    pub change: StatusChange,
}

#[cfg(test)]
mod tests {
    use super::BillType;

    #[test]
    fn bill_type_round_trips_through_str() {
        for kind in BillType::ALL {
            assert_eq!(BillType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BillType::parse("gas"), None);
        assert_eq!(BillType::parse("Electricity"), None);
    }

    #[test]
    fn only_electricity_and_water_are_metered() {
        let metered: Vec<_> = BillType::ALL
            .into_iter()
            .filter(|kind| kind.is_metered())
            .collect();
        assert_eq!(metered, vec![BillType::Electricity, BillType::Water]);
    }
}
