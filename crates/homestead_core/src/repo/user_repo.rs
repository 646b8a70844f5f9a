//! User repository contracts and SQLite implementation.
//!
//! The `household_uuid` column is read here but written only by
//! `household_repo`, which keeps it in step with household rosters.

use crate::model::household::HouseholdId;
use crate::model::user::{ProfileUpdate, User};
use crate::repo::{
    ensure_connection_ready, format_date, parse_date, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const USER_SELECT_SQL: &str = "SELECT
    national_id,
    name,
    credential_hash,
    phone,
    address,
    date_of_birth,
    household_uuid
FROM users";

/// Repository interface for the identity records the ledger links to.
pub trait UserRepository {
    /// Inserts a new user with no household link.
    fn create_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, national_id: &str) -> RepoResult<Option<User>>;
    /// Applies non-`None` profile fields and returns the updated record.
    fn update_profile(&self, national_id: &str, update: &ProfileUpdate) -> RepoResult<User>;
}

/// SQLite-backed user repository.
#[derive(Clone, Copy)]
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users"])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_user(&tx, &user.national_id)?.is_some() {
            return Err(RepoError::Conflict(format!(
                "user already exists with national id: {}",
                user.national_id
            )));
        }

        tx.execute(
            "INSERT INTO users (
                national_id,
                name,
                credential_hash,
                phone,
                address,
                date_of_birth,
                household_uuid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL);",
            params![
                user.national_id,
                user.name,
                user.credential_hash,
                user.phone,
                user.address,
                user.date_of_birth.map(format_date),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_user(&self, national_id: &str) -> RepoResult<Option<User>> {
        load_user(self.conn, national_id)
    }

    fn update_profile(&self, national_id: &str, update: &ProfileUpdate) -> RepoResult<User> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                name = COALESCE(?2, name),
                phone = COALESCE(?3, phone),
                address = COALESCE(?4, address),
                date_of_birth = COALESCE(?5, date_of_birth)
             WHERE national_id = ?1;",
            params![
                national_id,
                update.name,
                update.phone,
                update.address,
                update.date_of_birth.map(format_date),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("user not found: {national_id}")));
        }

        load_user(self.conn, national_id)?
            .ok_or_else(|| RepoError::NotFound(format!("user not found: {national_id}")))
    }
}

/// Loads one user on any connection or open transaction.
pub(crate) fn load_user(conn: &Connection, national_id: &str) -> RepoResult<Option<User>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT_SQL} WHERE national_id = ?1;"))?;
    let mut rows = stmt.query([national_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_user_row(row)?));
    }
    Ok(None)
}

/// Reads only the household link of a user; `None` when the user is absent.
pub(crate) fn load_user_link(
    conn: &Connection,
    national_id: &str,
) -> RepoResult<Option<(String, Option<HouseholdId>)>> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT name, household_uuid FROM users WHERE national_id = ?1;",
            [national_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        None => Ok(None),
        Some((name, link)) => {
            let link = link
                .map(|value| parse_uuid(&value, "users.household_uuid"))
                .transpose()?;
            Ok(Some((name, link)))
        }
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let household_id = row
        .get::<_, Option<String>>("household_uuid")?
        .map(|value| parse_uuid(&value, "users.household_uuid"))
        .transpose()?;
    let date_of_birth = row
        .get::<_, Option<String>>("date_of_birth")?
        .map(|value| parse_date(&value, "users.date_of_birth"))
        .transpose()?;

    Ok(User {
        national_id: row.get("national_id")?,
        name: row.get("name")?,
        credential_hash: row.get("credential_hash")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        date_of_birth,
        household_id,
    })
}
