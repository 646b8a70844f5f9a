//! Payment transaction records that settle bill items.
//!
//! Transactions are immutable once written; no update or delete path exists.

use crate::model::bill::{BillId, BillType};
use crate::model::household::HouseholdId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    BankTransfer,
    MobilePayment,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MobilePayment => "mobile_payment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(PaymentMethod::Cash),
            "credit_card" => Some(PaymentMethod::CreditCard),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "mobile_payment" => Some(PaymentMethod::MobilePayment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Successful,
    Failed,
    Processing,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Successful => "successful",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Processing => "processing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "successful" => Some(TransactionStatus::Successful),
            "failed" => Some(TransactionStatus::Failed),
            "processing" => Some(TransactionStatus::Processing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub bill_id: BillId,
    pub household_id: HouseholdId,
    /// Position of the settled item in the bill's item list.
    pub bill_item_index: u32,
    pub amount_paid: i64,
    pub method: PaymentMethod,
    /// Epoch ms.
    pub paid_at: i64,
    pub status: TransactionStatus,
    /// Epoch ms.
    pub created_at: i64,
}

/// Transaction joined with the type of the bill it settled.
///
/// `bill_type` is `None` when the bill was removed together with its
/// household after the payment was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub bill_type: Option<BillType>,
}
