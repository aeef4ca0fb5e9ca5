//! Dashboard metrics computed from the raw records held in the store.
use std::collections::BTreeMap;

use api_types::{
    BranchId, Money,
    cash::{CashMovement, MovementKind},
    sale::{Sale, SaleStatus},
};
use chrono::NaiveDate;

use crate::store::Store;

/// Slice a metric could not be computed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unavailable {
    pub source: &'static str,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DashboardSummary {
    pub sales_count: usize,
    pub sales_total: Money,
    pub sales_today: Money,
    pub purchases_total: Money,
    pub cash_income: Money,
    pub cash_expense: Money,
    pub cash_balance: Money,
    pub cash_by_branch: BTreeMap<BranchId, Money>,
    pub low_stock: usize,
    /// Sources whose last fetch failed or whose amounts overflow; their
    /// metrics reflect older data or are zero.
    pub unavailable: Vec<Unavailable>,
}

/// Error reported for a source whose amounts do not add up within range.
const OUT_OF_RANGE: &str = "amounts out of range";

/// Income, expense, balance and balance per branch.
type CashTotals = (Money, Money, Money, BTreeMap<BranchId, Money>);

fn checked_total(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
    amounts
        .into_iter()
        .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
}

fn sales_totals(sales: &[Sale], today: NaiveDate) -> Option<(usize, Money, Money)> {
    let completed: Vec<&Sale> = sales
        .iter()
        .filter(|sale| sale.status != SaleStatus::Cancelled)
        .collect();
    let total = checked_total(completed.iter().map(|sale| sale.total))?;
    let today_total = checked_total(
        completed
            .iter()
            .filter(|sale| sale.date.date_naive() == today)
            .map(|sale| sale.total),
    )?;
    Some((completed.len(), total, today_total))
}

fn cash_totals(movements: &[CashMovement]) -> Option<CashTotals> {
    let mut income = Money::ZERO;
    let mut expense = Money::ZERO;
    let mut by_branch = BTreeMap::new();
    for movement in movements {
        match movement.kind {
            MovementKind::Income => income = income.checked_add(movement.amount)?,
            MovementKind::Expense => expense = expense.checked_add(movement.amount)?,
        }
        let balance = by_branch.entry(movement.branch_id).or_insert(Money::ZERO);
        *balance = balance.checked_add(movement.signed_amount()?)?;
    }
    Some((income, expense, income.checked_sub(expense)?, by_branch))
}

impl DashboardSummary {
    /// Aggregates whatever the caches hold. `today` is in the branch's local
    /// calendar. A source whose totals overflow is reported in `unavailable`
    /// and contributes zero.
    pub fn from_store(store: &Store, today: NaiveDate) -> Self {
        let mut summary = Self::default();
        let mut out_of_range = Vec::new();

        match sales_totals(store.sales.items(), today) {
            Some((count, total, today)) => {
                summary.sales_count = count;
                summary.sales_total = total;
                summary.sales_today = today;
            }
            None => out_of_range.push("sales"),
        }

        match checked_total(store.purchases.items().iter().map(|p| p.total)) {
            Some(total) => summary.purchases_total = total,
            None => out_of_range.push("purchases"),
        }

        match cash_totals(store.cash_movements.items()) {
            Some((income, expense, balance, by_branch)) => {
                summary.cash_income = income;
                summary.cash_expense = expense;
                summary.cash_balance = balance;
                summary.cash_by_branch = by_branch;
            }
            None => out_of_range.push("cash movements"),
        }

        summary.low_stock = store
            .stock
            .items()
            .iter()
            .filter(|row| row.is_below_minimum())
            .count();

        let sources = [
            ("sales", store.sales.error()),
            ("purchases", store.purchases.error()),
            ("cash movements", store.cash_movements.error()),
        ];
        summary.unavailable = sources
            .into_iter()
            .filter_map(|(source, error)| {
                let error = match error {
                    Some(error) => error.to_string(),
                    None if out_of_range.contains(&source) => OUT_OF_RANGE.to_string(),
                    None => return None,
                };
                Some(Unavailable { source, error })
            })
            .collect();

        if !out_of_range.is_empty() {
            tracing::warn!("dashboard totals out of range for {out_of_range:?}");
        }
        summary
    }
}
