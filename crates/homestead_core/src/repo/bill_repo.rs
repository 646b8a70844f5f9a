//! Bill and bill item persistence plus the read-side billing aggregates.
//!
//! # Responsibility
//! - Store a bill and its items as one aggregate.
//! - Own the paid/unpaid transition of a single item.
//! - Serve month and overdue rollups straight from SQL.
//!
//! # Invariants
//! - Items of one bill are ordered by `position ASC`; position is the index
//!   payments address.
//! - `status = 1` iff `paid_at IS NOT NULL` (also enforced by a table check).
//! - An item moves to paid only through `WHERE status = 0` so two writers
//!   cannot both claim it.

use crate::model::bill::{
    Bill, BillId, BillItem, BillItemId, BillType, StatusChange, StatusUpdate,
};
use crate::model::household::{HouseholdId, HouseholdSummary};
use crate::model::report::{OverdueItemRow, TypeTotal};
use crate::repo::household_repo::household_exists;
use crate::repo::{
    ensure_connection_ready, format_date, now_ms, parse_date, parse_flag, parse_uuid, RepoError,
    RepoResult,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

/// Half-open `[start, end)` epoch-ms window over item creation time.
pub type CreatedRange = (i64, i64);

const BILL_SELECT_SQL: &str = "SELECT
    b.bill_uuid,
    b.type,
    b.description,
    b.created_at,
    h.household_uuid,
    h.name AS household_name,
    h.head_national_id,
    h.address
FROM bills b
JOIN households h ON h.household_uuid = b.household_uuid";

const BILL_ORDER_SQL: &str = "ORDER BY
    COALESCE(
        (SELECT MAX(i.created_at) FROM bill_items i WHERE i.bill_uuid = b.bill_uuid),
        b.created_at
    ) DESC,
    b.bill_uuid ASC";

/// Priced item ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBillItem {
    pub old_index: i64,
    pub new_index: i64,
    pub unit_price: i64,
    pub amount: i64,
    pub due_date: NaiveDate,
}

/// Bill insert request produced by the billing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBillRecord {
    pub household_id: HouseholdId,
    pub bill_type: BillType,
    pub description: Option<String>,
    pub item: NewBillItem,
}

/// Repository interface for bills and their items.
pub trait BillRepository {
    /// Inserts one bill holding one item.
    fn create_bill(&self, record: &NewBillRecord) -> RepoResult<Bill>;
    fn get_bill(&self, bill_id: BillId) -> RepoResult<Option<Bill>>;
    /// Moves one item to the requested status; equal status is a no-op.
    fn set_item_status(
        &self,
        bill_id: BillId,
        item_id: BillItemId,
        paid: bool,
    ) -> RepoResult<StatusUpdate>;
    /// Bills of one household, newest item first.
    fn list_by_household(&self, household_id: HouseholdId) -> RepoResult<Vec<Bill>>;
    /// All bills, newest item first.
    fn list_all(&self) -> RepoResult<Vec<Bill>>;
    /// Sum and count of paid items created inside `range`, grouped by type.
    fn paid_revenue_by_type(&self, range: CreatedRange) -> RepoResult<Vec<TypeTotal>>;
    /// Distinct households with at least one unpaid item, optionally
    /// restricted to items created inside `range`.
    fn count_households_with_unpaid(&self, range: Option<CreatedRange>) -> RepoResult<u64>;
    /// Unpaid items whose due date is strictly before `as_of`.
    fn unpaid_items_due_before(
        &self,
        as_of: NaiveDate,
        range: Option<CreatedRange>,
    ) -> RepoResult<Vec<OverdueItemRow>>;
}

/// SQLite-backed bill repository.
#[derive(Clone, Copy)]
pub struct SqliteBillRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBillRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["bills", "bill_items", "households"])?;
        Ok(Self { conn })
    }
}

impl BillRepository for SqliteBillRepository<'_> {
    fn create_bill(&self, record: &NewBillRecord) -> RepoResult<Bill> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !household_exists(&tx, record.household_id)? {
            return Err(RepoError::NotFound(format!(
                "household not found: {}",
                record.household_id
            )));
        }

        let bill_id = Uuid::new_v4();
        let created_at = now_ms();
        tx.execute(
            "INSERT INTO bills (
                bill_uuid,
                household_uuid,
                type,
                description,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                bill_id.to_string(),
                record.household_id.to_string(),
                record.bill_type.as_str(),
                record.description,
                created_at,
            ],
        )?;
        tx.execute(
            "INSERT INTO bill_items (
                item_uuid,
                bill_uuid,
                position,
                old_index,
                new_index,
                unit_price,
                amount,
                due_date,
                created_at
            ) VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                Uuid::new_v4().to_string(),
                bill_id.to_string(),
                record.item.old_index,
                record.item.new_index,
                record.item.unit_price,
                record.item.amount,
                format_date(record.item.due_date),
                created_at,
            ],
        )?;

        tx.commit()?;
        require_bill(self.conn, bill_id)
    }

    fn get_bill(&self, bill_id: BillId) -> RepoResult<Option<Bill>> {
        load_bill(self.conn, bill_id)
    }

    fn set_item_status(
        &self,
        bill_id: BillId,
        item_id: BillItemId,
        paid: bool,
    ) -> RepoResult<StatusUpdate> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let bill_exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM bills WHERE bill_uuid = ?1);",
            [bill_id.to_string()],
            |row| row.get(0),
        )?;
        if bill_exists != 1 {
            return Err(bill_not_found(bill_id));
        }

        let current: Option<i64> = tx
            .query_row(
                "SELECT status FROM bill_items WHERE bill_uuid = ?1 AND item_uuid = ?2;",
                params![bill_id.to_string(), item_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Err(RepoError::NotFound(format!(
                "bill item not found: {item_id} in bill {bill_id}"
            )));
        };

        let change = if parse_flag(current, "bill_items.status")? == paid {
            StatusChange::Unchanged
        } else {
            if paid {
                mark_item_paid(&tx, item_id, now_ms())?;
            } else {
                mark_item_unpaid(&tx, item_id)?;
            }
            StatusChange::Updated
        };

        tx.commit()?;
        Ok(StatusUpdate {
            bill: require_bill(self.conn, bill_id)?,
            change,
        })
    }

    fn list_by_household(&self, household_id: HouseholdId) -> RepoResult<Vec<Bill>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BILL_SELECT_SQL}
             WHERE b.household_uuid = ?1
             {BILL_ORDER_SQL};"
        ))?;
        let rows = stmt.query([household_id.to_string()])?;
        collect_bills(self.conn, rows)
    }

    fn list_all(&self) -> RepoResult<Vec<Bill>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BILL_SELECT_SQL} {BILL_ORDER_SQL};"))?;
        let rows = stmt.query([])?;
        collect_bills(self.conn, rows)
    }

    fn paid_revenue_by_type(&self, range: CreatedRange) -> RepoResult<Vec<TypeTotal>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.type, SUM(i.amount) AS total_amount, COUNT(*) AS item_count
             FROM bill_items i
             JOIN bills b ON b.bill_uuid = i.bill_uuid
             WHERE i.status = 1
               AND i.created_at >= ?1
               AND i.created_at < ?2
             GROUP BY b.type
             ORDER BY total_amount DESC, b.type ASC;",
        )?;
        let mut rows = stmt.query(params![range.0, range.1])?;
        let mut totals = Vec::new();
        while let Some(row) = rows.next()? {
            totals.push(parse_type_total_row(row)?);
        }
        Ok(totals)
    }

    fn count_households_with_unpaid(&self, range: Option<CreatedRange>) -> RepoResult<u64> {
        let (start, end) = split_range(range);
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT b.household_uuid)
             FROM bill_items i
             JOIN bills b ON b.bill_uuid = i.bill_uuid
             WHERE i.status = 0
               AND (?1 IS NULL OR i.created_at >= ?1)
               AND (?2 IS NULL OR i.created_at < ?2);",
            params![start, end],
            |row| row.get(0),
        )?;
        u64::try_from(total).map_err(|_| RepoError::InvalidData(format!("negative count {total}")))
    }

    fn unpaid_items_due_before(
        &self,
        as_of: NaiveDate,
        range: Option<CreatedRange>,
    ) -> RepoResult<Vec<OverdueItemRow>> {
        let (start, end) = split_range(range);
        let mut stmt = self.conn.prepare(
            "SELECT
                b.type,
                h.household_uuid,
                h.name,
                h.head_national_id,
                h.address,
                i.amount,
                i.due_date
             FROM bill_items i
             JOIN bills b ON b.bill_uuid = i.bill_uuid
             JOIN households h ON h.household_uuid = b.household_uuid
             WHERE i.status = 0
               AND i.due_date < ?1
               AND (?2 IS NULL OR i.created_at >= ?2)
               AND (?3 IS NULL OR i.created_at < ?3)
             ORDER BY b.type ASC, h.name ASC, i.due_date ASC;",
        )?;
        let mut rows = stmt.query(params![format_date(as_of), start, end])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let household_uuid: String = row.get(1)?;
            let due_date: String = row.get(6)?;
            items.push(OverdueItemRow {
                bill_type: parse_bill_type(&row.get::<_, String>(0)?)?,
                household_id: parse_uuid(&household_uuid, "households.household_uuid")?,
                household_name: row.get(2)?,
                head_national_id: row.get(3)?,
                address: row.get(4)?,
                amount: row.get(5)?,
                due_date: parse_date(&due_date, "bill_items.due_date")?,
            });
        }
        Ok(items)
    }
}

/// Loads one bill with its household summary and ordered items.
pub(crate) fn load_bill(conn: &Connection, bill_id: BillId) -> RepoResult<Option<Bill>> {
    let mut stmt = conn.prepare(&format!("{BILL_SELECT_SQL} WHERE b.bill_uuid = ?1;"))?;
    let mut rows = stmt.query([bill_id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut bill = parse_bill_row(row)?;
    bill.items = load_items(conn, bill.id)?;
    Ok(Some(bill))
}

pub(crate) fn require_bill(conn: &Connection, bill_id: BillId) -> RepoResult<Bill> {
    load_bill(conn, bill_id)?.ok_or_else(|| bill_not_found(bill_id))
}

/// Marks an unpaid item paid; fails with `Conflict` when another writer
/// already did.
pub(crate) fn mark_item_paid(
    conn: &Connection,
    item_id: BillItemId,
    paid_at: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE bill_items
         SET status = 1, paid_at = ?2
         WHERE item_uuid = ?1 AND status = 0;",
        params![item_id.to_string(), paid_at],
    )?;
    if changed != 1 {
        return Err(RepoError::Conflict(format!(
            "bill item already paid: {item_id}"
        )));
    }
    Ok(())
}

fn mark_item_unpaid(conn: &Connection, item_id: BillItemId) -> RepoResult<()> {
    conn.execute(
        "UPDATE bill_items
         SET status = 0, paid_at = NULL
         WHERE item_uuid = ?1 AND status = 1;",
        [item_id.to_string()],
    )?;
    Ok(())
}

pub(crate) fn parse_bill_type(value: &str) -> RepoResult<BillType> {
    BillType::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid bill type `{value}`")))
}

pub(crate) fn parse_type_total_row(row: &Row<'_>) -> RepoResult<TypeTotal> {
    let bill_type: String = row.get(0)?;
    let count: i64 = row.get(2)?;
    Ok(TypeTotal {
        bill_type: parse_bill_type(&bill_type)?,
        total_amount: row.get(1)?,
        count: u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative count {count}")))?,
    })
}

fn collect_bills(conn: &Connection, mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<Bill>> {
    let mut bills = Vec::new();
    while let Some(row) = rows.next()? {
        bills.push(parse_bill_row(row)?);
    }
    drop(rows);

    for bill in &mut bills {
        bill.items = load_items(conn, bill.id)?;
    }
    Ok(bills)
}

fn load_items(conn: &Connection, bill_id: BillId) -> RepoResult<Vec<BillItem>> {
    let mut stmt = conn.prepare(
        "SELECT
            item_uuid,
            old_index,
            new_index,
            unit_price,
            amount,
            due_date,
            created_at,
            status,
            paid_at
         FROM bill_items
         WHERE bill_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([bill_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row)?);
    }
    Ok(items)
}

fn parse_bill_row(row: &Row<'_>) -> RepoResult<Bill> {
    let bill_uuid: String = row.get("bill_uuid")?;
    let household_uuid: String = row.get("household_uuid")?;
    let bill_type: String = row.get("type")?;
    Ok(Bill {
        id: parse_uuid(&bill_uuid, "bills.bill_uuid")?,
        household: HouseholdSummary {
            id: parse_uuid(&household_uuid, "households.household_uuid")?,
            name: row.get("household_name")?,
            head_national_id: row.get("head_national_id")?,
            address: row.get("address")?,
        },
        bill_type: parse_bill_type(&bill_type)?,
        description: row.get("description")?,
        items: Vec::new(),
        created_at: row.get("created_at")?,
    })
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<BillItem> {
    let item_uuid: String = row.get("item_uuid")?;
    let due_date: String = row.get("due_date")?;
    let status = parse_flag(row.get("status")?, "bill_items.status")?;
    let paid_at: Option<i64> = row.get("paid_at")?;
    if status != paid_at.is_some() {
        return Err(RepoError::InvalidData(format!(
            "bill item {item_uuid} has status {status} but paid_at {paid_at:?}"
        )));
    }

    Ok(BillItem {
        id: parse_uuid(&item_uuid, "bill_items.item_uuid")?,
        old_index: row.get("old_index")?,
        new_index: row.get("new_index")?,
        unit_price: row.get("unit_price")?,
        amount: row.get("amount")?,
        due_date: parse_date(&due_date, "bill_items.due_date")?,
        created_at: row.get("created_at")?,
        status,
        paid_at,
    })
}

fn split_range(range: Option<CreatedRange>) -> (Option<i64>, Option<i64>) {
    match range {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    }
}

fn bill_not_found(bill_id: BillId) -> RepoError {
    RepoError::NotFound(format!("bill not found: {bill_id}"))
}
