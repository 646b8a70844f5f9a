//! Household membership and billing ledger core.
//! This crate is the single source of truth for roster, billing and payment
//! invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, UnitPriceTable};
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use logging::{default_log_level, init_from_settings, init_logging, logging_status};
pub use model::bill::{Bill, BillId, BillItem, BillItemId, BillType, StatusChange, StatusUpdate};
pub use model::household::{
    HeadRemovalOutcome, Household, HouseholdId, HouseholdSummary, Member, MemberRemoval,
};
pub use model::page::Page;
pub use model::period::BillingPeriod;
pub use model::report::{Dashboard, MonthlyRevenue, OverdueReport, TypeTotal};
pub use model::transaction::{
    PaymentMethod, Transaction, TransactionId, TransactionStatus, TransactionView,
};
pub use model::user::{ProfileUpdate, User, UserProfile};
pub use repo::bill_repo::{BillRepository, SqliteBillRepository};
pub use repo::household_repo::{HouseholdRepository, SqliteHouseholdRepository};
pub use repo::transaction_repo::{SqliteTransactionRepository, TransactionRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::billing_service::{parse_paid_flag, BillingService, NewBill};
pub use service::household_service::HouseholdService;
pub use service::payment_service::{NewTransaction, PaymentService};
pub use service::revenue_service::RevenueService;
pub use service::user_service::UserService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
