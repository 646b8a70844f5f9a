//! Household registry and membership ledger persistence.
//!
//! # Responsibility
//! - Persist households together with their ordered member roster.
//! - Keep `users.household_uuid` and `household_members` in step inside one
//!   `BEGIN IMMEDIATE` transaction per write.
//!
//! # Invariants
//! - A roster row for user `U` in household `H` exists iff
//!   `users.household_uuid = H` for `U`.
//! - `households.head_national_id` names exactly one roster row whose
//!   relationship is `head`.
//! - Roster order is `position ASC`; positions only grow within a household.

use crate::model::household::{
    HeadRemovalOutcome, Household, HouseholdId, Member, MemberRemoval, HEAD_RELATIONSHIP,
};
use crate::model::user::User;
use crate::repo::user_repo::{load_user, load_user_link};
use crate::repo::{ensure_connection_ready, now_ms, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const HOUSEHOLD_SELECT_SQL: &str = "SELECT
    household_uuid,
    name,
    address,
    head_name,
    head_national_id,
    created_at
FROM households";

/// Repository interface for household and roster writes.
pub trait HouseholdRepository {
    /// Creates a household whose only member is the (unlinked) head user.
    fn create_with_head(
        &self,
        head_national_id: &str,
        name: &str,
        address: &str,
    ) -> RepoResult<Household>;
    /// Clears every user link to the household, then deletes it.
    ///
    /// Returns the number of users whose link was cleared.
    fn delete_household(&self, household_id: HouseholdId) -> RepoResult<usize>;
    fn get(&self, household_id: HouseholdId) -> RepoResult<Option<Household>>;
    fn get_by_head(&self, head_national_id: &str) -> RepoResult<Option<Household>>;
    /// Loads the user record, including its current household link.
    fn find_user(&self, national_id: &str) -> RepoResult<Option<User>>;
    /// Finds the household whose roster lists `national_id`.
    fn find_by_member(&self, national_id: &str) -> RepoResult<Option<Household>>;
    /// Lists households in creation order.
    fn list(&self, limit: u32, offset: u64) -> RepoResult<Vec<Household>>;
    fn count(&self) -> RepoResult<u64>;
    /// Links an unlinked user to the household and appends a roster entry.
    fn add_member(
        &self,
        household_id: HouseholdId,
        national_id: &str,
        name: &str,
        relationship: &str,
    ) -> RepoResult<Household>;
    /// Unlinks a non-head member and removes the roster entry.
    ///
    /// With `expected` set, the member must currently belong to that
    /// household.
    fn remove_member(
        &self,
        national_id: &str,
        expected: Option<HouseholdId>,
    ) -> RepoResult<Household>;
    /// Removes the head, then either promotes the next member or deletes
    /// the household when nobody remains.
    fn remove_head(&self, household_id: HouseholdId) -> RepoResult<HeadRemovalOutcome>;
    /// Removes `national_id` from `household_id`, deciding inside the write
    /// transaction whether they are the head or an ordinary member.
    fn remove_from(
        &self,
        household_id: HouseholdId,
        national_id: &str,
    ) -> RepoResult<MemberRemoval>;
}

/// SQLite-backed household repository.
#[derive(Clone, Copy)]
pub struct SqliteHouseholdRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHouseholdRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["households", "household_members", "users"])?;
        Ok(Self { conn })
    }
}

impl HouseholdRepository for SqliteHouseholdRepository<'_> {
    fn create_with_head(
        &self,
        head_national_id: &str,
        name: &str,
        address: &str,
    ) -> RepoResult<Household> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let head_name = match load_user_link(&tx, head_national_id)? {
            None => return Err(user_not_found(head_national_id)),
            Some((_, Some(_))) => return Err(already_linked(head_national_id)),
            Some((user_name, None)) => user_name,
        };

        let name_taken: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM households WHERE name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        if name_taken == 1 {
            return Err(RepoError::Conflict(format!(
                "household name already exists: {name}"
            )));
        }

        let household_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO households (
                household_uuid,
                name,
                address,
                head_name,
                head_national_id,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                household_id.to_string(),
                name,
                address,
                head_name,
                head_national_id,
                now_ms(),
            ],
        )?;
        insert_member(
            &tx,
            household_id,
            head_national_id,
            &head_name,
            HEAD_RELATIONSHIP,
        )?;
        link_user(&tx, household_id, head_national_id)?;

        tx.commit()?;
        require_household(self.conn, household_id)
    }

    fn delete_household(&self, household_id: HouseholdId) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !household_exists(&tx, household_id)? {
            return Err(household_not_found(household_id));
        }

        let affected = tx.execute(
            "UPDATE users SET household_uuid = NULL WHERE household_uuid = ?1;",
            [household_id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM households WHERE household_uuid = ?1;",
            [household_id.to_string()],
        )?;

        tx.commit()?;
        Ok(affected)
    }

    fn get(&self, household_id: HouseholdId) -> RepoResult<Option<Household>> {
        load_household(self.conn, household_id)
    }

    fn get_by_head(&self, head_national_id: &str) -> RepoResult<Option<Household>> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT household_uuid FROM households WHERE head_national_id = ?1;",
                [head_national_id],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(value) => {
                load_household(self.conn, parse_uuid(&value, "households.household_uuid")?)
            }
            None => Ok(None),
        }
    }

    fn find_user(&self, national_id: &str) -> RepoResult<Option<User>> {
        load_user(self.conn, national_id)
    }

    fn find_by_member(&self, national_id: &str) -> RepoResult<Option<Household>> {
        match member_household(self.conn, national_id)? {
            Some(household_id) => load_household(self.conn, household_id),
            None => Ok(None),
        }
    }

    fn list(&self, limit: u32, offset: u64) -> RepoResult<Vec<Household>> {
        let offset = i64::try_from(offset)
            .map_err(|_| RepoError::Validation(format!("page offset too large: {offset}")))?;
        let mut stmt = self.conn.prepare(&format!(
            "{HOUSEHOLD_SELECT_SQL}
             ORDER BY created_at ASC, household_uuid ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![i64::from(limit), offset])?;
        let mut households = Vec::new();
        while let Some(row) = rows.next()? {
            households.push(parse_household_row(row)?);
        }
        drop(rows);

        for household in &mut households {
            household.members = load_members(self.conn, household.id)?;
        }
        Ok(households)
    }

    fn count(&self) -> RepoResult<u64> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM households;", [], |row| row.get(0))?;
        u64::try_from(total).map_err(|_| RepoError::InvalidData(format!("negative count {total}")))
    }

    fn add_member(
        &self,
        household_id: HouseholdId,
        national_id: &str,
        name: &str,
        relationship: &str,
    ) -> RepoResult<Household> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !household_exists(&tx, household_id)? {
            return Err(household_not_found(household_id));
        }
        match load_user_link(&tx, national_id)? {
            None => return Err(user_not_found(national_id)),
            Some((_, Some(_))) => return Err(already_linked(national_id)),
            Some((_, None)) => {}
        }

        insert_member(&tx, household_id, national_id, name, relationship)?;
        link_user(&tx, household_id, national_id)?;

        tx.commit()?;
        require_household(self.conn, household_id)
    }

    fn remove_member(
        &self,
        national_id: &str,
        expected: Option<HouseholdId>,
    ) -> RepoResult<Household> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_user_link(&tx, national_id)?.is_none() {
            return Err(user_not_found(national_id));
        }
        let household = match (member_household(&tx, national_id)?, expected) {
            (Some(current), Some(expected)) if current != expected => {
                return Err(not_a_member_of(national_id, expected))
            }
            (Some(current), _) => require_household(&tx, current)?,
            (None, _) => {
                return Err(RepoError::NotFound(format!(
                    "user is not a member of any household: {national_id}"
                )))
            }
        };
        if household.head_national_id == national_id {
            return Err(RepoError::Conflict(format!(
                "cannot remove the head of household {} as a member: {national_id}",
                household.id
            )));
        }

        delete_member(&tx, household.id, national_id)?;
        unlink_user(&tx, household.id, national_id)?;

        tx.commit()?;
        require_household(self.conn, household.id)
    }

    fn remove_head(&self, household_id: HouseholdId) -> RepoResult<HeadRemovalOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let household = require_household(&tx, household_id)?;
        let detached = detach_head(&tx, &household)?;
        tx.commit()?;
        self.head_removal_outcome(household_id, detached)
    }

    fn remove_from(
        &self,
        household_id: HouseholdId,
        national_id: &str,
    ) -> RepoResult<MemberRemoval> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let household = require_household(&tx, household_id)?;

        if household.head_national_id == national_id {
            let detached = detach_head(&tx, &household)?;
            tx.commit()?;
            let outcome = self.head_removal_outcome(household_id, detached)?;
            return Ok(MemberRemoval::Head { outcome });
        }

        if load_user_link(&tx, national_id)?.is_none() {
            return Err(user_not_found(national_id));
        }
        if !household.has_member(national_id) {
            return Err(not_a_member_of(national_id, household_id));
        }

        delete_member(&tx, household_id, national_id)?;
        unlink_user(&tx, household_id, national_id)?;

        tx.commit()?;
        Ok(MemberRemoval::Member {
            household: require_household(self.conn, household_id)?,
        })
    }
}

impl SqliteHouseholdRepository<'_> {
    fn head_removal_outcome(
        &self,
        household_id: HouseholdId,
        detached: DetachedHead,
    ) -> RepoResult<HeadRemovalOutcome> {
        let DetachedHead {
            former_head,
            promoted,
        } = detached;
        if !promoted {
            return Ok(HeadRemovalOutcome::HouseholdDeleted { former_head });
        }

        let household = require_household(self.conn, household_id)?;
        let new_head = household.head().cloned().ok_or_else(|| {
            RepoError::InvalidData(format!(
                "household {household_id} lost its head after transfer"
            ))
        })?;
        Ok(HeadRemovalOutcome::HeadTransferred {
            former_head,
            new_head,
            household,
        })
    }
}

struct DetachedHead {
    former_head: Member,
    promoted: bool,
}

/// Removes the current head of `household` inside an open transaction.
///
/// Promotes the first remaining member by roster position, or deletes the
/// household when the head was alone.
fn detach_head(conn: &Connection, household: &Household) -> RepoResult<DetachedHead> {
    let household_id = household.id;
    let former_head = household.head().cloned().ok_or_else(|| {
        RepoError::InvalidData(format!(
            "head {} is not listed among the members of household {household_id}",
            household.head_national_id
        ))
    })?;

    delete_member(conn, household_id, &former_head.national_id)?;
    unlink_user(conn, household_id, &former_head.national_id)?;

    let next_head = household
        .members
        .iter()
        .find(|member| member.national_id != former_head.national_id);

    let Some(next_head) = next_head else {
        conn.execute(
            "UPDATE users SET household_uuid = NULL WHERE household_uuid = ?1;",
            [household_id.to_string()],
        )?;
        conn.execute(
            "DELETE FROM households WHERE household_uuid = ?1;",
            [household_id.to_string()],
        )?;
        return Ok(DetachedHead {
            former_head,
            promoted: false,
        });
    };

    conn.execute(
        "UPDATE household_members
         SET relationship = ?3
         WHERE household_uuid = ?1 AND national_id = ?2;",
        params![
            household_id.to_string(),
            next_head.national_id,
            HEAD_RELATIONSHIP
        ],
    )?;
    conn.execute(
        "UPDATE households
         SET head_name = ?2, head_national_id = ?3
         WHERE household_uuid = ?1;",
        params![
            household_id.to_string(),
            next_head.name,
            next_head.national_id
        ],
    )?;

    Ok(DetachedHead {
        former_head,
        promoted: true,
    })
}

/// Loads one household with its roster on any connection or transaction.
pub(crate) fn load_household(
    conn: &Connection,
    household_id: HouseholdId,
) -> RepoResult<Option<Household>> {
    let mut stmt = conn.prepare(&format!("{HOUSEHOLD_SELECT_SQL} WHERE household_uuid = ?1;"))?;
    let mut rows = stmt.query([household_id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut household = parse_household_row(row)?;
    household.members = load_members(conn, household_id)?;
    if !household.is_consistent() {
        return Err(RepoError::InvalidData(format!(
            "household {household_id} does not list head {} exactly once",
            household.head_national_id
        )));
    }
    Ok(Some(household))
}

fn require_household(conn: &Connection, household_id: HouseholdId) -> RepoResult<Household> {
    load_household(conn, household_id)?.ok_or_else(|| household_not_found(household_id))
}

pub(crate) fn household_exists(conn: &Connection, household_id: HouseholdId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM households WHERE household_uuid = ?1);",
        [household_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_members(conn: &Connection, household_id: HouseholdId) -> RepoResult<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT national_id, name, relationship
         FROM household_members
         WHERE household_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([household_id.to_string()])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push(Member {
            national_id: row.get(0)?,
            name: row.get(1)?,
            relationship: row.get(2)?,
        });
    }
    Ok(members)
}

fn member_household(conn: &Connection, national_id: &str) -> RepoResult<Option<HouseholdId>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT household_uuid FROM household_members WHERE national_id = ?1;",
            [national_id],
            |row| row.get(0),
        )
        .optional()?;
    id.map(|value| parse_uuid(&value, "household_members.household_uuid"))
        .transpose()
}

fn insert_member(
    conn: &Connection,
    household_id: HouseholdId,
    national_id: &str,
    name: &str,
    relationship: &str,
) -> RepoResult<()> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0)
         FROM household_members
         WHERE household_uuid = ?1;",
        [household_id.to_string()],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO household_members (
            household_uuid,
            national_id,
            name,
            relationship,
            position
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            household_id.to_string(),
            national_id,
            name,
            relationship,
            position
        ],
    )?;
    Ok(())
}

fn delete_member(
    conn: &Connection,
    household_id: HouseholdId,
    national_id: &str,
) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM household_members WHERE household_uuid = ?1 AND national_id = ?2;",
        params![household_id.to_string(), national_id],
    )?;
    Ok(())
}

/// Compare-and-swap on the user link: only an unlinked user can be linked.
fn link_user(conn: &Connection, household_id: HouseholdId, national_id: &str) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE users
         SET household_uuid = ?1
         WHERE national_id = ?2 AND household_uuid IS NULL;",
        params![household_id.to_string(), national_id],
    )?;
    if changed != 1 {
        return Err(already_linked(national_id));
    }
    Ok(())
}

fn unlink_user(conn: &Connection, household_id: HouseholdId, national_id: &str) -> RepoResult<()> {
    conn.execute(
        "UPDATE users
         SET household_uuid = NULL
         WHERE national_id = ?1 AND household_uuid = ?2;",
        params![national_id, household_id.to_string()],
    )?;
    Ok(())
}

fn parse_household_row(row: &Row<'_>) -> RepoResult<Household> {
    let id: String = row.get("household_uuid")?;
    Ok(Household {
        id: parse_uuid(&id, "households.household_uuid")?,
        name: row.get("name")?,
        address: row.get("address")?,
        head_name: row.get("head_name")?,
        head_national_id: row.get("head_national_id")?,
        members: Vec::new(),
        created_at: row.get("created_at")?,
    })
}

fn household_not_found(household_id: HouseholdId) -> RepoError {
    RepoError::NotFound(format!("household not found: {household_id}"))
}

fn user_not_found(national_id: &str) -> RepoError {
    RepoError::NotFound(format!("user not found: {national_id}"))
}

fn not_a_member_of(national_id: &str, household_id: HouseholdId) -> RepoError {
    RepoError::NotFound(format!(
        "user {national_id} is not a member of household {household_id}"
    ))
}

fn already_linked(national_id: &str) -> RepoError {
    RepoError::Conflict(format!("user already belongs to a household: {national_id}"))
}
