//! Domain model for households, billing and payments.
//!
//! # Responsibility
//! - Define the records exchanged between repositories, services and callers.
//! - Keep parent aggregates owning their children by value (`Household` owns
//!   its `Member` list, `Bill` owns its `BillItem` list).
//!
//! # Invariants
//! - Exactly one member of a stored household carries the head's national ID.
//! - A bill item is paid if and only if it has a `paid_at` timestamp.

pub mod bill;
pub mod household;
pub mod page;
pub mod period;
pub mod report;
pub mod transaction;
pub mod user;
