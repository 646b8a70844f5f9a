use homestead_core::db::migrations::latest_version;
use homestead_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "users",
        "households",
        "household_members",
        "bills",
        "bill_items",
        "payment_transactions",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn.execute(
        "INSERT INTO bills (bill_uuid, household_uuid, type, created_at)
         VALUES ('b-1', 'missing-household', 'water', 0);",
        [],
    );
    assert!(err.is_err());
}

#[test]
fn paid_flag_and_timestamp_must_agree() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO users (national_id, name, credential_hash) VALUES ('H1', 'Head', 'x');
         INSERT INTO households (household_uuid, name, address, head_name, head_national_id)
         VALUES ('h-1', 'A-101', 'Addr', 'Head', 'H1');
         INSERT INTO bills (bill_uuid, household_uuid, type, created_at)
         VALUES ('b-1', 'h-1', 'garbage', 0);",
    )
    .unwrap();

    let paid_without_timestamp = conn.execute(
        "INSERT INTO bill_items (
            item_uuid, bill_uuid, position, old_index, new_index, unit_price, amount,
            due_date, created_at, status, paid_at
         ) VALUES ('i-1', 'b-1', 0, 0, 0, 25000, 25000, '2026-04-10', 0, 1, NULL);",
        [],
    );
    assert!(paid_without_timestamp.is_err());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("homestead.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "payment_transactions");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(homestead_core::SqliteHouseholdRepository::try_new(&conn).is_err());
    assert!(homestead_core::SqliteBillRepository::try_new(&conn).is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
