//! Payment ledger persistence.
//!
//! # Responsibility
//! - Record settlements and flip the settled item to paid in the same
//!   transaction.
//! - Serve ledger listings and ledger-side revenue sums.
//!
//! # Invariants
//! - A ledger row commits only together with its item's `0 -> 1` status
//!   transition.
//! - Ledger rows are never updated or deleted and carry no foreign keys,
//!   so they outlive bill and household deletion.

use crate::model::bill::BillId;
use crate::model::household::HouseholdId;
use crate::model::report::TypeTotal;
use crate::model::transaction::{
    PaymentMethod, Transaction, TransactionStatus, TransactionView,
};
use crate::repo::bill_repo::{load_bill, mark_item_paid, parse_bill_type, parse_type_total_row};
use crate::repo::household_repo::household_exists;
use crate::repo::{ensure_connection_ready, now_ms, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row, Transaction as SqlTransaction, TransactionBehavior};
use uuid::Uuid;

/// Validated settlement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub bill_id: BillId,
    pub household_id: HouseholdId,
    pub bill_item_index: u32,
    pub amount_paid: i64,
    pub method: PaymentMethod,
}

/// Repository interface for the payment ledger.
pub trait TransactionRepository {
    /// Records a payment and marks the addressed item paid, atomically.
    fn settle_item(&self, payment: &NewPayment) -> RepoResult<Transaction>;
    /// Ledger rows of one household, newest first, with the bill type when
    /// the bill still exists.
    fn list_by_household(
        &self,
        household_id: HouseholdId,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<TransactionView>>;
    fn count_by_household(&self, household_id: HouseholdId) -> RepoResult<u64>;
    /// Sum of `amount_paid` over the whole ledger.
    fn total_amount_paid(&self) -> RepoResult<i64>;
    /// Sum of `amount_paid` grouped by the type of the referenced bill.
    fn amount_paid_by_bill_type(&self) -> RepoResult<Vec<TypeTotal>>;
}

/// SQLite-backed payment ledger.
#[derive(Clone, Copy)]
pub struct SqliteTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTransactionRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["payment_transactions", "bills", "bill_items"])?;
        Ok(Self { conn })
    }
}

impl TransactionRepository for SqliteTransactionRepository<'_> {
    fn settle_item(&self, payment: &NewPayment) -> RepoResult<Transaction> {
        let tx = SqlTransaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let bill = load_bill(&tx, payment.bill_id)?
            .ok_or_else(|| RepoError::NotFound(format!("bill not found: {}", payment.bill_id)))?;
        if !household_exists(&tx, payment.household_id)? {
            return Err(RepoError::NotFound(format!(
                "household not found: {}",
                payment.household_id
            )));
        }
        if bill.household.id != payment.household_id {
            return Err(RepoError::Validation(format!(
                "bill {} does not belong to household {}",
                bill.id, payment.household_id
            )));
        }

        let index = payment.bill_item_index as usize;
        let item = bill.items.get(index).ok_or_else(|| {
            RepoError::Validation(format!(
                "bill item index {} out of range for bill {} with {} item(s)",
                payment.bill_item_index,
                bill.id,
                bill.items.len()
            ))
        })?;
        if item.status {
            return Err(RepoError::Conflict(format!(
                "bill item already paid: {}",
                item.id
            )));
        }
        if payment.amount_paid < item.amount {
            return Err(RepoError::Validation(format!(
                "amount paid {} is less than item amount {}",
                payment.amount_paid, item.amount
            )));
        }

        let now = now_ms();
        let transaction = Transaction {
            id: Uuid::new_v4(),
            bill_id: bill.id,
            household_id: payment.household_id,
            bill_item_index: payment.bill_item_index,
            amount_paid: payment.amount_paid,
            method: payment.method,
            paid_at: now,
            status: TransactionStatus::Successful,
            created_at: now,
        };
        tx.execute(
            "INSERT INTO payment_transactions (
                transaction_uuid,
                bill_uuid,
                household_uuid,
                bill_item_index,
                amount_paid,
                method,
                paid_at,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                transaction.id.to_string(),
                transaction.bill_id.to_string(),
                transaction.household_id.to_string(),
                i64::from(transaction.bill_item_index),
                transaction.amount_paid,
                transaction.method.as_str(),
                transaction.paid_at,
                transaction.status.as_str(),
                transaction.created_at,
            ],
        )?;
        mark_item_paid(&tx, item.id, now)?;

        tx.commit()?;
        Ok(transaction)
    }

    fn list_by_household(
        &self,
        household_id: HouseholdId,
        limit: u32,
        offset: u64,
    ) -> RepoResult<Vec<TransactionView>> {
        let offset = i64::try_from(offset)
            .map_err(|_| RepoError::Validation(format!("page offset too large: {offset}")))?;
        let mut stmt = self.conn.prepare(
            "SELECT
                t.transaction_uuid,
                t.bill_uuid,
                t.household_uuid,
                t.bill_item_index,
                t.amount_paid,
                t.method,
                t.paid_at,
                t.status,
                t.created_at,
                b.type AS bill_type
             FROM payment_transactions t
             LEFT JOIN bills b ON b.bill_uuid = t.bill_uuid
             WHERE t.household_uuid = ?1
             ORDER BY t.created_at DESC, t.transaction_uuid ASC
             LIMIT ?2 OFFSET ?3;",
        )?;
        let mut rows = stmt.query(params![household_id.to_string(), i64::from(limit), offset])?;
        let mut views = Vec::new();
        while let Some(row) = rows.next()? {
            let bill_type = row
                .get::<_, Option<String>>("bill_type")?
                .map(|value| parse_bill_type(&value))
                .transpose()?;
            views.push(TransactionView {
                transaction: parse_transaction_row(row)?,
                bill_type,
            });
        }
        Ok(views)
    }

    fn count_by_household(&self, household_id: HouseholdId) -> RepoResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM payment_transactions WHERE household_uuid = ?1;",
            [household_id.to_string()],
            |row| row.get(0),
        )?;
        u64::try_from(total).map_err(|_| RepoError::InvalidData(format!("negative count {total}")))
    }

    fn total_amount_paid(&self) -> RepoResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(SUM(amount_paid), 0) FROM payment_transactions;",
            [],
            |row| row.get(0),
        )?)
    }

    fn amount_paid_by_bill_type(&self) -> RepoResult<Vec<TypeTotal>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.type, SUM(t.amount_paid) AS total_amount, COUNT(*) AS item_count
             FROM payment_transactions t
             JOIN bills b ON b.bill_uuid = t.bill_uuid
             GROUP BY b.type
             ORDER BY total_amount DESC, b.type ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut totals = Vec::new();
        while let Some(row) = rows.next()? {
            totals.push(parse_type_total_row(row)?);
        }
        Ok(totals)
    }
}

fn parse_transaction_row(row: &Row<'_>) -> RepoResult<Transaction> {
    let id: String = row.get("transaction_uuid")?;
    let bill_id: String = row.get("bill_uuid")?;
    let household_id: String = row.get("household_uuid")?;
    let index: i64 = row.get("bill_item_index")?;
    let method: String = row.get("method")?;
    let status: String = row.get("status")?;

    Ok(Transaction {
        id: parse_uuid(&id, "payment_transactions.transaction_uuid")?,
        bill_id: parse_uuid(&bill_id, "payment_transactions.bill_uuid")?,
        household_id: parse_uuid(&household_id, "payment_transactions.household_uuid")?,
        bill_item_index: u32::try_from(index).map_err(|_| {
            RepoError::InvalidData(format!("invalid bill item index `{index}`"))
        })?,
        amount_paid: row.get("amount_paid")?,
        method: PaymentMethod::parse(&method)
            .ok_or_else(|| RepoError::InvalidData(format!("invalid payment method `{method}`")))?,
        paid_at: row.get("paid_at")?,
        status: TransactionStatus::parse(&status).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid transaction status `{status}`"))
        })?,
        created_at: row.get("created_at")?,
    })
}
