#![allow(dead_code)]

use homestead_core::{
    BillingService, Household, HouseholdService, PaymentService, SqliteBillRepository,
    SqliteHouseholdRepository, SqliteTransactionRepository, SqliteUserRepository, UnitPriceTable,
    User, UserProfile, UserService,
};
use rusqlite::Connection;

pub fn users(conn: &Connection) -> UserService<SqliteUserRepository<'_>> {
    UserService::new(SqliteUserRepository::try_new(conn).unwrap())
}

pub fn households(conn: &Connection) -> HouseholdService<SqliteHouseholdRepository<'_>> {
    HouseholdService::new(SqliteHouseholdRepository::try_new(conn).unwrap())
}

pub fn billing(
    conn: &Connection,
) -> BillingService<SqliteBillRepository<'_>, SqliteHouseholdRepository<'_>> {
    BillingService::new(
        SqliteBillRepository::try_new(conn).unwrap(),
        SqliteHouseholdRepository::try_new(conn).unwrap(),
        UnitPriceTable::default(),
    )
    .unwrap()
}

pub fn payments(
    conn: &Connection,
) -> PaymentService<SqliteTransactionRepository<'_>, SqliteHouseholdRepository<'_>> {
    PaymentService::new(
        SqliteTransactionRepository::try_new(conn).unwrap(),
        SqliteHouseholdRepository::try_new(conn).unwrap(),
    )
}

pub fn register(conn: &Connection, national_id: &str) -> User {
    users(conn)
        .register_user(
            national_id,
            &format!("Resident {national_id}"),
            "argon2$hash",
            UserProfile::default(),
        )
        .unwrap()
}

/// Registers `head` and creates a household they head.
pub fn household_headed_by(conn: &Connection, head: &str, name: &str) -> Household {
    register(conn, head);
    households(conn)
        .create_household(head, name, "12 Le Loi, District 1")
        .unwrap()
}

pub fn user_link(conn: &Connection, national_id: &str) -> Option<String> {
    conn.query_row(
        "SELECT household_uuid FROM users WHERE national_id = ?1;",
        [national_id],
        |row| row.get(0),
    )
    .unwrap()
}

/// Every linked user is listed in the roster of the household they point at,
/// and every household has exactly one head row.
pub fn assert_membership_consistent(conn: &Connection) {
    let dangling: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM users u
             LEFT JOIN household_members m
               ON m.national_id = u.national_id AND m.household_uuid = u.household_uuid
             WHERE u.household_uuid IS NOT NULL AND m.national_id IS NULL;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(dangling, 0, "user link without roster entry");

    let orphaned: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM household_members m
             JOIN users u ON u.national_id = m.national_id
             WHERE u.household_uuid IS NOT m.household_uuid;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphaned, 0, "roster entry without user link");

    let bad_heads: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM households h
             WHERE (
                SELECT COUNT(*)
                FROM household_members m
                WHERE m.household_uuid = h.household_uuid
                  AND m.national_id = h.head_national_id
             ) != 1;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(bad_heads, 0, "household without exactly one head member");
}
