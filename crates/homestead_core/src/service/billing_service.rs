//! Billing engine use cases.
//!
//! # Responsibility
//! - Price new bill items from the injected [`UnitPriceTable`].
//! - Expose the paid/unpaid transition and bill listings.
//! - Compute month revenue and unpaid-household counts.
//!
//! # Invariants
//! - Metered items require both meter readings with `new_index > old_index`.
//! - Flat-fee items are stored with zero readings and `amount = unit_price`.
//! - A status write never creates a payment record.

use crate::config::UnitPriceTable;
use crate::error::{CoreError, CoreResult};
use crate::model::bill::{Bill, BillId, BillItemId, BillType, StatusUpdate};
use crate::model::household::{Household, HouseholdId};
use crate::model::period::BillingPeriod;
use crate::model::report::{MonthlyRevenue, OverdueItemRow};
use crate::repo::bill_repo::{BillRepository, NewBillItem, NewBillRecord};
use crate::repo::household_repo::HouseholdRepository;
use crate::service::log_write;
use crate::service::user_service::parse_national_id;
use chrono::NaiveDate;
use std::time::Instant;

const MODULE: &str = "billing";

/// Caller request for one new bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBill {
    pub head_national_id: String,
    /// One of `electricity|water|garbage|management|parking|other`.
    pub bill_type: String,
    pub due_date: NaiveDate,
    pub old_index: Option<i64>,
    pub new_index: Option<i64>,
    pub description: Option<String>,
}

pub struct BillingService<B: BillRepository, H: HouseholdRepository> {
    bills: B,
    households: H,
    prices: UnitPriceTable,
}

impl<B: BillRepository, H: HouseholdRepository> BillingService<B, H> {
    /// # Errors
    /// - `Validation` when `prices` holds a zero or negative unit price.
    pub fn new(bills: B, households: H, prices: UnitPriceTable) -> CoreResult<Self> {
        prices
            .validate()
            .map_err(|err| CoreError::validation(err.to_string()))?;
        Ok(Self {
            bills,
            households,
            prices,
        })
    }

    /// Creates one bill with one priced item for the household headed by
    /// `head_national_id`.
    ///
    /// # Errors
    /// - `NotFound` when no household has that head.
    /// - `Validation` for an unknown type, missing or non-increasing meter
    ///   readings, or a type without a configured price.
    pub fn create_bill(&self, request: NewBill) -> CoreResult<Bill> {
        let started = Instant::now();
        let result = (|| -> CoreResult<Bill> {
            let household = self.household_by_head(&request.head_national_id)?;
            let bill_type = parse_bill_type(&request.bill_type)?;
            let item = price_item(
                &self.prices,
                bill_type,
                request.old_index,
                request.new_index,
                request.due_date,
            )?;
            let description = request
                .description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            Ok(self.bills.create_bill(&NewBillRecord {
                household_id: household.id,
                bill_type,
                description,
                item,
            })?)
        })();
        let fields = match &result {
            Ok(bill) => format!(
                "bill_id={} household_id={} type={} amount={}",
                bill.id,
                bill.household.id,
                bill.bill_type,
                bill.outstanding_amount()
            ),
            Err(_) => format!(
                "head={} type={}",
                request.head_national_id.trim(),
                request.bill_type.trim()
            ),
        };
        log_write("bill_create", MODULE, &fields, started, result)
    }

    /// Sets one item paid or unpaid. Writing the current status again is a
    /// no-op reported as [`crate::model::bill::StatusChange::Unchanged`].
    pub fn set_item_status(
        &self,
        bill_id: BillId,
        item_id: BillItemId,
        paid: bool,
    ) -> CoreResult<StatusUpdate> {
        let started = Instant::now();
        let result = self
            .bills
            .set_item_status(bill_id, item_id, paid)
            .map_err(CoreError::from);
        let fields = match &result {
            Ok(update) => format!(
                "bill_id={bill_id} item_id={item_id} paid={paid} change={:?}",
                update.change
            ),
            Err(_) => format!("bill_id={bill_id} item_id={item_id} paid={paid}"),
        };
        log_write("bill_item_status", MODULE, &fields, started, result)
    }

    pub fn get_bill(&self, bill_id: BillId) -> CoreResult<Bill> {
        self.bills
            .get_bill(bill_id)?
            .ok_or_else(|| CoreError::not_found(format!("bill not found: {bill_id}")))
    }

    /// Bills of one household, newest item first.
    pub fn list_by_household(&self, household_id: HouseholdId) -> CoreResult<Vec<Bill>> {
        if self.households.get(household_id)?.is_none() {
            return Err(CoreError::not_found(format!(
                "household not found: {household_id}"
            )));
        }
        Ok(self.bills.list_by_household(household_id)?)
    }

    pub fn list_by_head(&self, head_national_id: &str) -> CoreResult<Vec<Bill>> {
        let household = self.household_by_head(head_national_id)?;
        Ok(self.bills.list_by_household(household.id)?)
    }

    /// Bills of the household the user currently belongs to.
    ///
    /// # Errors
    /// - `NotFound` when the user is absent.
    /// - `Validation` when the user belongs to no household.
    pub fn list_for_user(&self, national_id: &str) -> CoreResult<Vec<Bill>> {
        let national_id = parse_national_id(national_id)?;
        let user = self
            .households
            .find_user(&national_id)?
            .ok_or_else(|| CoreError::not_found(format!("user not found: {national_id}")))?;
        let household_id = user.household_id.ok_or_else(|| {
            CoreError::validation(format!("user {national_id} does not belong to a household"))
        })?;
        Ok(self.bills.list_by_household(household_id)?)
    }

    pub fn list_all(&self) -> CoreResult<Vec<Bill>> {
        Ok(self.bills.list_all()?)
    }

    /// Paid-item revenue for items created in the given calendar month.
    pub fn revenue_for_month(&self, year: i32, month: u32) -> CoreResult<MonthlyRevenue> {
        let period = BillingPeriod::new(year, month)?;
        let breakdown = self.bills.paid_revenue_by_type(period.bounds_ms()?)?;
        Ok(MonthlyRevenue::from_breakdown(period, breakdown))
    }

    /// Distinct households with an unpaid item, optionally only counting
    /// items created in `period`.
    pub fn count_households_with_unpaid_items(
        &self,
        period: Option<BillingPeriod>,
    ) -> CoreResult<u64> {
        let range = period.map(|period| period.bounds_ms()).transpose()?;
        Ok(self.bills.count_households_with_unpaid(range)?)
    }

    /// Unpaid items due strictly before `as_of`.
    pub fn overdue_items(
        &self,
        as_of: NaiveDate,
        period: Option<BillingPeriod>,
    ) -> CoreResult<Vec<OverdueItemRow>> {
        let range = period.map(|period| period.bounds_ms()).transpose()?;
        Ok(self.bills.unpaid_items_due_before(as_of, range)?)
    }

    fn household_by_head(&self, head_national_id: &str) -> CoreResult<Household> {
        let head = parse_national_id(head_national_id)?;
        self.households
            .get_by_head(&head)?
            .ok_or_else(|| CoreError::not_found(format!("no household is headed by {head}")))
    }
}

/// Parses a transport-level paid flag; only `true` and `false` pass.
pub fn parse_paid_flag(value: &str) -> CoreResult<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CoreError::validation(format!(
            "paid flag must be `true` or `false`, got `{other}`"
        ))),
    }
}

pub(crate) fn parse_bill_type(value: &str) -> CoreResult<BillType> {
    BillType::parse(value.trim()).ok_or_else(|| {
        CoreError::validation(format!(
            "unknown bill type `{}`; expected electricity|water|garbage|management|parking|other",
            value.trim()
        ))
    })
}

/// Prices one item of `bill_type`.
///
/// Readings passed for a flat-fee type are ignored.
pub fn price_item(
    prices: &UnitPriceTable,
    bill_type: BillType,
    old_index: Option<i64>,
    new_index: Option<i64>,
    due_date: NaiveDate,
) -> CoreResult<NewBillItem> {
    let unit_price = prices.unit_price(bill_type).ok_or_else(|| {
        CoreError::validation(format!("no unit price configured for bill type `{bill_type}`"))
    })?;

    if !bill_type.is_metered() {
        return Ok(NewBillItem {
            old_index: 0,
            new_index: 0,
            unit_price,
            amount: unit_price,
            due_date,
        });
    }

    let (Some(old_index), Some(new_index)) = (old_index, new_index) else {
        return Err(CoreError::validation(format!(
            "{bill_type} bills require both old and new meter readings"
        )));
    };
    if old_index < 0 {
        return Err(CoreError::validation(format!(
            "meter readings must not be negative, got old index {old_index}"
        )));
    }
    if new_index <= old_index {
        return Err(CoreError::validation(format!(
            "new index {new_index} must be greater than old index {old_index}"
        )));
    }
    let amount = (new_index - old_index)
        .checked_mul(unit_price)
        .ok_or_else(|| CoreError::validation("bill amount overflows"))?;

    Ok(NewBillItem {
        old_index,
        new_index,
        unit_price,
        amount,
        due_date,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_bill_type, parse_paid_flag, price_item};
    use crate::config::UnitPriceTable;
    use crate::error::ErrorKind;
    use crate::model::bill::BillType;
    use chrono::NaiveDate;

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 10).unwrap()
    }

    #[test]
    fn metered_amount_is_delta_times_unit_price() {
        let item = price_item(
            &UnitPriceTable::default(),
            BillType::Electricity,
            Some(100),
            Some(150),
            due(),
        )
        .unwrap();
        assert_eq!(item.unit_price, 3_000);
        assert_eq!(item.amount, 150_000);
        assert_eq!((item.old_index, item.new_index), (100, 150));
    }

    #[test]
    fn zero_old_reading_is_accepted() {
        let item = price_item(
            &UnitPriceTable::default(),
            BillType::Water,
            Some(0),
            Some(4),
            due(),
        )
        .unwrap();
        assert_eq!(item.amount, 60_000);
    }

    #[test]
    fn metered_readings_must_increase() {
        let prices = UnitPriceTable::default();
        let cases = [
            (Some(150), Some(150)),
            (Some(150), Some(100)),
            (None, Some(1)),
            (Some(1), None),
            (Some(-5), Some(2)),
        ];
        for (old, new) in cases {
            let err = price_item(&prices, BillType::Water, old, new, due()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{old:?} -> {new:?}");
        }
    }

    #[test]
    fn flat_fee_ignores_readings() {
        let item = price_item(
            &UnitPriceTable::default(),
            BillType::Parking,
            Some(10),
            Some(20),
            due(),
        )
        .unwrap();
        assert_eq!((item.old_index, item.new_index), (0, 0));
        assert_eq!(item.amount, 70_000);
    }

    #[test]
    fn other_requires_configured_price() {
        let err = price_item(&UnitPriceTable::default(), BillType::Other, None, None, due())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let prices = UnitPriceTable {
            other: Some(12_000),
            ..UnitPriceTable::default()
        };
        let item = price_item(&prices, BillType::Other, None, None, due()).unwrap();
        assert_eq!(item.amount, 12_000);
    }

    #[test]
    fn injected_prices_change_amounts() {
        let prices = UnitPriceTable {
            electricity: 3_500,
            ..UnitPriceTable::default()
        };
        let item = price_item(&prices, BillType::Electricity, Some(10), Some(12), due()).unwrap();
        assert_eq!(item.amount, 7_000);
    }

    #[test]
    fn bill_type_and_paid_flag_parsing() {
        assert_eq!(parse_bill_type(" garbage ").unwrap(), BillType::Garbage);
        assert_eq!(parse_bill_type("gas").unwrap_err().kind(), ErrorKind::Validation);

        assert!(parse_paid_flag("true").unwrap());
        assert!(!parse_paid_flag("false").unwrap());
        for bad in ["1", "yes", "TRUE", ""] {
            assert_eq!(
                parse_paid_flag(bad).unwrap_err().kind(),
                ErrorKind::Validation
            );
        }
    }
}
