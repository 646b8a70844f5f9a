mod common;

use chrono::NaiveDate;
use common::{billing, household_headed_by, households, payments};
use homestead_core::{
    open_db, open_db_in_memory, Bill, BillType, ErrorKind, NewBill, NewTransaction,
    PaymentMethod, PaymentService, SqliteHouseholdRepository, SqliteTransactionRepository,
    StatusChange, TransactionStatus,
};
use rusqlite::{params, Connection};
use std::sync::{Arc, Barrier};
use std::thread;
use uuid::Uuid;

fn flat_bill(conn: &Connection, head: &str, bill_type: &str) -> Bill {
    billing(conn)
        .create_bill(NewBill {
            head_national_id: head.to_string(),
            bill_type: bill_type.to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 4, 10).unwrap(),
            old_index: None,
            new_index: None,
            description: None,
        })
        .unwrap()
}

fn pay(bill: &Bill, amount_paid: i64) -> NewTransaction {
    NewTransaction {
        bill_id: bill.id,
        household_id: bill.household.id,
        bill_item_index: 0,
        amount_paid,
        method: "cash".to_string(),
    }
}

fn ledger_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM payment_transactions;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn settlement_records_transaction_and_marks_item_paid() {
    let conn = open_db_in_memory().unwrap();
    household_headed_by(&conn, "A", "Block A 101");
    let bill = flat_bill(&conn, "A", "management");

    let transaction = payments(&conn)
        .create_transaction(NewTransaction {
            method: "bank_transfer".to_string(),
            ..pay(&bill, 100_000)
        })
        .unwrap();

    assert_eq!(transaction.bill_id, bill.id);
    assert_eq!(transaction.household_id, bill.household.id);
    assert_eq!(transaction.bill_item_index, 0);
    assert_eq!(transaction.amount_paid, 100_000);
    assert_eq!(transaction.method, PaymentMethod::BankTransfer);
    assert_eq!(transaction.status, TransactionStatus::Successful);

    let item = billing(&conn).get_bill(bill.id).unwrap().items[0].clone();
    assert!(item.status);
    assert_eq!(item.paid_at, Some(transaction.paid_at));
    assert_eq!(ledger_rows(&conn), 1);
}

#[test]
fn overpayment_is_accepted() {
    let conn = open_db_in_memory().unwrap();
    household_headed_by(&conn, "A", "Block A 101");
    let bill = flat_bill(&conn, "A", "garbage");

    let transaction = payments(&conn)
        .create_transaction(pay(&bill, 30_000))
        .unwrap();
    assert_eq!(transaction.amount_paid, 30_000);
}

#[test]
fn underpayment_is_rejected_without_side_effects() {
    let conn = open_db_in_memory().unwrap();
    household_headed_by(&conn, "A", "Block A 101");
    let bill = flat_bill(&conn, "A", "parking");
    let amount = bill.items[0].amount;

    let err = payments(&conn)
        .create_transaction(pay(&bill, amount - 1))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    let item = billing(&conn).get_bill(bill.id).unwrap().items[0].clone();
    assert!(!item.status);
    assert_eq!(item.paid_at, None);
    assert_eq!(ledger_rows(&conn), 0);
}

#[test]
fn paid_item_cannot_be_settled_again() {
    let conn = open_db_in_memory().unwrap();
    household_headed_by(&conn, "A", "Block A 101");
    let settled = flat_bill(&conn, "A", "garbage");
    let flagged = flat_bill(&conn, "A", "parking");
    let service = payments(&conn);

    service.create_transaction(pay(&settled, 25_000)).unwrap();
    assert_eq!(
        service
            .create_transaction(pay(&settled, 25_000))
            .unwrap_err()
            .kind(),
        ErrorKind::Conflict
    );

    billing(&conn)
        .set_item_status(flagged.id, flagged.items[0].id, true)
        .unwrap();
    assert_eq!(
        service
            .create_transaction(pay(&flagged, 70_000))
            .unwrap_err()
            .kind(),
        ErrorKind::Conflict
    );
    assert_eq!(ledger_rows(&conn), 1);
}

#[test]
fn create_transaction_error_kinds() {
    let conn = open_db_in_memory().unwrap();
    household_headed_by(&conn, "A", "Block A 101");
    let other = household_headed_by(&conn, "X", "Block B 202");
    let bill = flat_bill(&conn, "A", "garbage");
    let service = payments(&conn);

    let cases = [
        (
            NewTransaction {
                bill_id: Uuid::new_v4(),
                ..pay(&bill, 25_000)
            },
            ErrorKind::NotFound,
        ),
        (
            NewTransaction {
                household_id: Uuid::new_v4(),
                ..pay(&bill, 25_000)
            },
            ErrorKind::NotFound,
        ),
        (
            NewTransaction {
                household_id: other.id,
                ..pay(&bill, 25_000)
            },
            ErrorKind::Validation,
        ),
        (
            NewTransaction {
                bill_item_index: 1,
                ..pay(&bill, 25_000)
            },
            ErrorKind::Validation,
        ),
        (
            NewTransaction {
                bill_item_index: -1,
                ..pay(&bill, 25_000)
            },
            ErrorKind::Validation,
        ),
        (
            NewTransaction {
                method: "cheque".to_string(),
                ..pay(&bill, 25_000)
            },
            ErrorKind::Validation,
        ),
        (pay(&bill, -5), ErrorKind::Validation),
    ];
    for (request, expected) in cases {
        let label = format!("{request:?}");
        assert_eq!(
            service.create_transaction(request).unwrap_err().kind(),
            expected,
            "{label}"
        );
    }
    assert_eq!(ledger_rows(&conn), 0);
    assert!(!billing(&conn).get_bill(bill.id).unwrap().items[0].status);
}

#[test]
fn household_listing_pages_newest_first_with_bill_type() {
    let conn = open_db_in_memory().unwrap();
    household_headed_by(&conn, "A", "Block A 101");
    household_headed_by(&conn, "X", "Block B 202");
    let service = payments(&conn);

    let mut ids = Vec::new();
    for index in 0..12 {
        let bill_type = if index % 2 == 0 { "garbage" } else { "parking" };
        let bill = flat_bill(&conn, "A", bill_type);
        let transaction = service
            .create_transaction(pay(&bill, bill.items[0].amount))
            .unwrap();
        conn.execute(
            "UPDATE payment_transactions SET created_at = ?1 WHERE transaction_uuid = ?2;",
            params![10_000 + index, transaction.id.to_string()],
        )
        .unwrap();
        ids.push(transaction.id);
    }
    let foreign = flat_bill(&conn, "X", "garbage");
    service.create_transaction(pay(&foreign, 25_000)).unwrap();

    let first = service.list_by_household("A", 1).unwrap();
    assert_eq!(first.current_page, 1);
    assert_eq!(first.total, 12);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.items[0].transaction.id, ids[11]);
    assert_eq!(first.items[0].bill_type, Some(BillType::Parking));
    assert_eq!(first.items[1].bill_type, Some(BillType::Garbage));

    let second = service.list_by_household("A", 2).unwrap();
    let second_ids: Vec<_> = second.items.iter().map(|view| view.transaction.id).collect();
    assert_eq!(second_ids, vec![ids[1], ids[0]]);

    assert!(service.list_by_household("A", 3).unwrap().items.is_empty());
    assert_eq!(
        service.list_by_household("ghost", 1).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn ledger_totals_and_survival_after_household_deletion() {
    let conn = open_db_in_memory().unwrap();
    let doomed = household_headed_by(&conn, "A", "Block A 101");
    household_headed_by(&conn, "X", "Block B 202");
    let service = payments(&conn);

    let a_bill = flat_bill(&conn, "A", "management");
    let x_bill = flat_bill(&conn, "X", "garbage");
    service.create_transaction(pay(&a_bill, 100_000)).unwrap();
    service.create_transaction(pay(&x_bill, 30_000)).unwrap();

    assert_eq!(service.total_revenue().unwrap(), 130_000);
    let by_type = service.revenue_by_bill_type().unwrap();
    assert_eq!(by_type.len(), 2);
    assert_eq!(by_type[0].bill_type, BillType::Management);
    assert_eq!(by_type[0].total_amount, 100_000);
    assert_eq!(by_type[1].total_amount, 30_000);

    households(&conn).delete_household(doomed.id).unwrap();

    assert_eq!(ledger_rows(&conn), 2);
    assert_eq!(service.total_revenue().unwrap(), 130_000);
    let by_type = service.revenue_by_bill_type().unwrap();
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].bill_type, BillType::Garbage);
}

#[test]
fn concurrent_settlement_of_one_item_records_one_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payments.sqlite3");
    let setup = open_db(&path).unwrap();
    household_headed_by(&setup, "A", "Block A 101");
    let bill = flat_bill(&setup, "A", "management");

    let writers = 4;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|_| {
            let conn = open_db(&path).unwrap();
            let barrier = Arc::clone(&barrier);
            let request = pay(&bill, 100_000);
            thread::spawn(move || {
                let service = PaymentService::new(
                    SqliteTransactionRepository::try_new(&conn).unwrap(),
                    SqliteHouseholdRepository::try_new(&conn).unwrap(),
                );
                barrier.wait();
                service.create_transaction(request).map_err(|err| err.kind())
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "{results:?}");
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(ErrorKind::Conflict))));
    assert_eq!(ledger_rows(&setup), 1);
    assert!(billing(&setup).get_bill(bill.id).unwrap().items[0].status);
}

#[test]
fn flag_and_transaction_settlements_race_to_one_payment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settlement_race.sqlite3");
    let setup = open_db(&path).unwrap();
    household_headed_by(&setup, "A", "Block A 101");

    for _ in 0..8 {
        let bill = flat_bill(&setup, "A", "management");
        let item_id = bill.items[0].id;
        let barrier = Arc::new(Barrier::new(2));

        let flag = {
            let conn = open_db(&path).unwrap();
            let barrier = Arc::clone(&barrier);
            let bill_id = bill.id;
            thread::spawn(move || {
                let service = billing(&conn);
                barrier.wait();
                service
                    .set_item_status(bill_id, item_id, true)
                    .map(|update| update.change)
                    .map_err(|err| err.kind())
            })
        };
        let settle = {
            let conn = open_db(&path).unwrap();
            let barrier = Arc::clone(&barrier);
            let request = pay(&bill, 100_000);
            thread::spawn(move || {
                let service = payments(&conn);
                barrier.wait();
                service
                    .create_transaction(request)
                    .map(|_| ())
                    .map_err(|err| err.kind())
            })
        };
        let flagged = flag.join().unwrap();
        let settled = settle.join().unwrap();

        let rows: i64 = setup
            .query_row(
                "SELECT COUNT(*) FROM payment_transactions WHERE bill_uuid = ?1;",
                [bill.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        match settled {
            Ok(()) => {
                assert_eq!(rows, 1);
                assert_eq!(flagged, Ok(StatusChange::Unchanged));
            }
            Err(kind) => {
                assert_eq!(kind, ErrorKind::Conflict);
                assert_eq!(rows, 0);
                assert_eq!(flagged, Ok(StatusChange::Updated));
            }
        }
        let item = &billing(&setup).get_bill(bill.id).unwrap().items[0];
        assert!(item.status);
        assert!(item.paid_at.is_some());
    }
}
