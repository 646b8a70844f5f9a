//! Payment ledger use cases.
//!
//! Settlement is a single repository call: the ledger row and the item's
//! paid flag commit together or not at all.

use crate::error::{CoreError, CoreResult};
use crate::model::bill::BillId;
use crate::model::household::HouseholdId;
use crate::model::page::{Page, PageWindow, TRANSACTION_PAGE_SIZE};
use crate::model::report::TypeTotal;
use crate::model::transaction::{PaymentMethod, Transaction, TransactionView};
use crate::repo::household_repo::HouseholdRepository;
use crate::repo::transaction_repo::{NewPayment, TransactionRepository};
use crate::service::log_write;
use crate::service::user_service::parse_national_id;
use std::time::Instant;

const MODULE: &str = "payment";

/// Caller request to settle one bill item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub bill_id: BillId,
    pub household_id: HouseholdId,
    /// Zero-based index into the bill's item list.
    pub bill_item_index: i64,
    pub amount_paid: i64,
    /// One of `cash|credit_card|bank_transfer|mobile_payment`.
    pub method: String,
}

pub struct PaymentService<T: TransactionRepository, H: HouseholdRepository> {
    ledger: T,
    households: H,
}

impl<T: TransactionRepository, H: HouseholdRepository> PaymentService<T, H> {
    pub fn new(ledger: T, households: H) -> Self {
        Self { ledger, households }
    }

    /// Records a payment and marks the addressed item paid.
    ///
    /// Of two concurrent settlements of one item, exactly one succeeds; the
    /// other fails with `Conflict`.
    ///
    /// # Errors
    /// - `NotFound` when the bill or household is absent.
    /// - `Validation` for an unknown method, an index outside the item list,
    ///   a bill of another household, or `amount_paid` below the item amount.
    /// - `Conflict` when the item is already paid.
    pub fn create_transaction(&self, request: NewTransaction) -> CoreResult<Transaction> {
        let started = Instant::now();
        let result = (|| -> CoreResult<Transaction> {
            let method = parse_method(&request.method)?;
            let bill_item_index = u32::try_from(request.bill_item_index).map_err(|_| {
                CoreError::validation(format!(
                    "bill item index must be a non-negative integer, got {}",
                    request.bill_item_index
                ))
            })?;
            if request.amount_paid < 0 {
                return Err(CoreError::validation(format!(
                    "amount paid must not be negative, got {}",
                    request.amount_paid
                )));
            }
            Ok(self.ledger.settle_item(&NewPayment {
                bill_id: request.bill_id,
                household_id: request.household_id,
                bill_item_index,
                amount_paid: request.amount_paid,
                method,
            })?)
        })();
        let fields = match &result {
            Ok(transaction) => format!(
                "transaction_id={} bill_id={} item_index={} amount_paid={} method={}",
                transaction.id,
                transaction.bill_id,
                transaction.bill_item_index,
                transaction.amount_paid,
                transaction.method.as_str()
            ),
            Err(_) => format!(
                "bill_id={} item_index={}",
                request.bill_id, request.bill_item_index
            ),
        };
        log_write("transaction_create", MODULE, &fields, started, result)
    }

    /// One page (10 rows) of the ledger of the household headed by
    /// `head_national_id`, newest first.
    pub fn list_by_household(
        &self,
        head_national_id: &str,
        page: u32,
    ) -> CoreResult<Page<TransactionView>> {
        let head = parse_national_id(head_national_id)?;
        let household = self
            .households
            .get_by_head(&head)?
            .ok_or_else(|| CoreError::not_found(format!("no household is headed by {head}")))?;

        let window = PageWindow::new(page, TRANSACTION_PAGE_SIZE);
        let total = self.ledger.count_by_household(household.id)?;
        let items = self
            .ledger
            .list_by_household(household.id, window.limit, window.offset)?;
        Ok(Page {
            current_page: window.page,
            total_pages: window.total_pages(total),
            total,
            items,
        })
    }

    /// Sum of every recorded `amount_paid`.
    pub fn total_revenue(&self) -> CoreResult<i64> {
        Ok(self.ledger.total_amount_paid()?)
    }

    pub fn revenue_by_bill_type(&self) -> CoreResult<Vec<TypeTotal>> {
        Ok(self.ledger.amount_paid_by_bill_type()?)
    }
}

fn parse_method(value: &str) -> CoreResult<PaymentMethod> {
    PaymentMethod::parse(value.trim()).ok_or_else(|| {
        CoreError::validation(format!(
            "unknown payment method `{}`; expected cash|credit_card|bank_transfer|mobile_payment",
            value.trim()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::parse_method;
    use crate::error::ErrorKind;
    use crate::model::transaction::PaymentMethod;

    #[test]
    fn method_parsing_accepts_only_known_methods() {
        assert_eq!(parse_method(" cash ").unwrap(), PaymentMethod::Cash);
        assert_eq!(
            parse_method("mobile_payment").unwrap(),
            PaymentMethod::MobilePayment
        );
        assert_eq!(parse_method("cheque").unwrap_err().kind(), ErrorKind::Validation);
    }
}
