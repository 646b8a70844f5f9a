//! Revenue aggregator: read-only rollups over billing and ledger state.
//!
//! Holds no state of its own and never writes; every figure comes from a
//! query already exposed by the billing, payment or household services.

use crate::error::CoreResult;
use crate::model::bill::BillType;
use crate::model::period::BillingPeriod;
use crate::model::report::{
    Dashboard, MonthlyRevenue, OverdueByType, OverdueHousehold, OverdueItemRow, OverdueReport,
    TypeTotal,
};
use crate::repo::bill_repo::BillRepository;
use crate::repo::household_repo::HouseholdRepository;
use crate::repo::transaction_repo::TransactionRepository;
use crate::service::billing_service::BillingService;
use crate::service::household_service::HouseholdService;
use crate::service::payment_service::PaymentService;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub struct RevenueService<'a, B, T, H>
where
    B: BillRepository,
    T: TransactionRepository,
    H: HouseholdRepository,
{
    billing: &'a BillingService<B, H>,
    payments: &'a PaymentService<T, H>,
    households: &'a HouseholdService<H>,
}

impl<'a, B, T, H> RevenueService<'a, B, T, H>
where
    B: BillRepository,
    T: TransactionRepository,
    H: HouseholdRepository,
{
    pub fn new(
        billing: &'a BillingService<B, H>,
        payments: &'a PaymentService<T, H>,
        households: &'a HouseholdService<H>,
    ) -> Self {
        Self {
            billing,
            payments,
            households,
        }
    }

    /// Paid-item revenue for one calendar month, grouped by bill type.
    pub fn revenue_for_month(&self, year: i32, month: u32) -> CoreResult<MonthlyRevenue> {
        self.billing.revenue_for_month(year, month)
    }

    pub fn count_households_with_unpaid_items(
        &self,
        period: Option<BillingPeriod>,
    ) -> CoreResult<u64> {
        self.billing.count_households_with_unpaid_items(period)
    }

    /// Ledger-side total over every recorded payment.
    pub fn total_revenue(&self) -> CoreResult<i64> {
        self.payments.total_revenue()
    }

    pub fn revenue_by_bill_type(&self) -> CoreResult<Vec<TypeTotal>> {
        self.payments.revenue_by_bill_type()
    }

    /// Unpaid items due before `as_of`, grouped by bill type and household.
    pub fn overdue_report(
        &self,
        as_of: NaiveDate,
        period: Option<BillingPeriod>,
    ) -> CoreResult<OverdueReport> {
        let rows = self.billing.overdue_items(as_of, period)?;
        Ok(OverdueReport {
            as_of,
            period,
            by_type: group_overdue(rows),
        })
    }

    /// Household count, month revenue and month unpaid-household count.
    pub fn dashboard(&self, period: BillingPeriod) -> CoreResult<Dashboard> {
        let revenue = self.billing.revenue_for_month(period.year, period.month)?;
        Ok(Dashboard {
            period,
            total_households: self.households.count_households()?,
            monthly_revenue: revenue.total_revenue,
            households_with_unpaid_items: self
                .billing
                .count_households_with_unpaid_items(Some(period))?,
        })
    }
}

/// Folds overdue item rows into per-type, per-household totals.
///
/// Types keep enum order; households are ordered by overdue amount, largest
/// first, then by name.
fn group_overdue(rows: Vec<OverdueItemRow>) -> Vec<OverdueByType> {
    let mut grouped: BTreeMap<BillType, Vec<OverdueHousehold>> = BTreeMap::new();
    for row in rows {
        let households = grouped.entry(row.bill_type).or_default();
        match households
            .iter_mut()
            .find(|entry| entry.household_id == row.household_id)
        {
            Some(entry) => {
                entry.overdue_count += 1;
                entry.overdue_amount += row.amount;
            }
            None => households.push(OverdueHousehold {
                household_id: row.household_id,
                household_name: row.household_name,
                head_national_id: row.head_national_id,
                address: row.address,
                overdue_count: 1,
                overdue_amount: row.amount,
            }),
        }
    }

    grouped
        .into_iter()
        .map(|(bill_type, mut households)| {
            households.sort_by(|a, b| {
                b.overdue_amount
                    .cmp(&a.overdue_amount)
                    .then_with(|| a.household_name.cmp(&b.household_name))
            });
            OverdueByType {
                bill_type,
                total_households: households.len() as u64,
                total_overdue_amount: households.iter().map(|h| h.overdue_amount).sum(),
                total_overdue_items: households.iter().map(|h| h.overdue_count).sum(),
                households,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::group_overdue;
    use crate::model::bill::BillType;
    use crate::model::report::OverdueItemRow;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn row(bill_type: BillType, household: Uuid, name: &str, amount: i64) -> OverdueItemRow {
        OverdueItemRow {
            bill_type,
            household_id: household,
            household_name: name.to_string(),
            head_national_id: format!("head-{name}"),
            address: "12 Le Loi".to_string(),
            amount,
            due_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        }
    }

    #[test]
    fn groups_by_type_then_household() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let grouped = group_overdue(vec![
            row(BillType::Water, a, "A-101", 30_000),
            row(BillType::Electricity, a, "A-101", 90_000),
            row(BillType::Water, b, "B-202", 45_000),
            row(BillType::Water, a, "A-101", 30_000),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].bill_type, BillType::Electricity);
        assert_eq!(grouped[0].total_households, 1);

        let water = &grouped[1];
        assert_eq!(water.bill_type, BillType::Water);
        assert_eq!(water.total_households, 2);
        assert_eq!(water.total_overdue_items, 3);
        assert_eq!(water.total_overdue_amount, 105_000);
        assert_eq!(water.households[0].household_id, a);
        assert_eq!(water.households[0].overdue_count, 2);
        assert_eq!(water.households[0].overdue_amount, 60_000);
        assert_eq!(water.households[1].household_id, b);
    }

    #[test]
    fn no_rows_means_empty_report() {
        assert!(group_overdue(Vec::new()).is_empty());
    }
}
