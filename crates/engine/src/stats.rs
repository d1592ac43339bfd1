//! Grouping, filtering and aggregation over expenses.
//!
//! Every function here ignores soft-deleted expenses: a deleted entry never
//! contributes to a bucket, a sum or a balance.

use std::{collections::HashMap, hash::Hash};

use chrono::NaiveDate;

use crate::{Amount, Expense, dates};

/// Label of the bucket collecting every category past the limit of
/// [`sum_by_category`].
pub const OTHER_CATEGORIES: &str = "...";

fn live<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> impl Iterator<Item = &'a Expense> {
    expenses.into_iter().filter(|expense| !expense.deleted())
}

/// Partitions expenses into buckets keyed by `key`.
///
/// Buckets appear in order of first occurrence, each one keeping the
/// insertion order of its expenses.
pub fn group_by<'a, K, F>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    key: F,
) -> Vec<(K, Vec<&'a Expense>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&Expense) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a Expense>)> = Vec::new();

    for expense in live(expenses) {
        let k = key(expense);
        match index.get(&k) {
            Some(&i) => groups[i].1.push(expense),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![expense]));
            }
        }
    }
    groups
}

fn order_buckets<T>(mut groups: Vec<(String, T)>, sorted: bool) -> Vec<(String, T)> {
    if sorted {
        groups.sort_by(|a, b| a.0.cmp(&b.0));
    }
    groups
}

pub fn group_by_category<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Vec<(String, Vec<&'a Expense>)> {
    group_by(expenses, |expense| expense.category().to_string())
}

/// Buckets keyed by `YYYY-MM-DD`, ascending when `sorted`.
pub fn group_by_day<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    sorted: bool,
) -> Vec<(String, Vec<&'a Expense>)> {
    order_buckets(
        group_by(expenses, |expense| dates::format_day(expense.date())),
        sorted,
    )
}

/// Buckets keyed by `YYYY-MM`, ascending when `sorted`.
pub fn group_by_month<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    sorted: bool,
) -> Vec<(String, Vec<&'a Expense>)> {
    order_buckets(
        group_by(expenses, |expense| dates::format_month(expense.date())),
        sorted,
    )
}

/// Expenses dated in `[from, to)`.
pub fn filter_by_date<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<&'a Expense> {
    live(expenses)
        .filter(|expense| expense.date() >= from && expense.date() < to)
        .collect()
}

/// Expenses of the month containing `date`.
pub fn filter_of_month<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    date: NaiveDate,
) -> Vec<&'a Expense> {
    filter_by_date(
        expenses,
        dates::start_of_month(date),
        dates::start_of_next_month(date),
    )
}

/// Expenses from the start of the month `months` months before `today`, up to
/// and including `today`.
pub fn filter_of_last_months<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    months: u32,
    today: NaiveDate,
) -> Vec<&'a Expense> {
    let from = dates::add_months(
        dates::start_of_month(today),
        -(i32::try_from(months).unwrap_or(i32::MAX)),
    );
    let to = today.succ_opt().unwrap_or(today);
    filter_by_date(expenses, from, to)
}

/// Expenses dated after `today`.
pub fn filter_future<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    today: NaiveDate,
) -> Vec<&'a Expense> {
    live(expenses)
        .filter(|expense| expense.date() > today)
        .collect()
}

/// Drops expenses whose category is flagged exceptional.
pub fn budget_expenses<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Vec<&'a Expense> {
    live(expenses)
        .filter(|expense| !expense.is_exceptional())
        .collect()
}

pub fn sum<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Amount {
    live(expenses).map(Expense::amount).sum()
}

pub fn sum_negative<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Amount {
    live(expenses)
        .map(Expense::amount)
        .filter(|amount| amount.is_negative())
        .sum()
}

fn sum_groups<K>(groups: Vec<(K, Vec<&Expense>)>) -> Vec<(K, Amount)> {
    groups
        .into_iter()
        .map(|(key, expenses)| (key, sum(expenses)))
        .collect()
}

/// Per-category sums sorted ascending (largest spending first), truncated to
/// `limit` buckets. When truncated, the last bucket is [`OTHER_CATEGORIES`]
/// and holds the sum of every category left out.
pub fn sum_by_category<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
    limit: usize,
) -> Vec<(String, Amount)> {
    let limit = limit.max(1);
    let mut sums = sum_groups(group_by_category(expenses));
    sums.sort_by_key(|(_, amount)| *amount);

    if sums.len() <= limit {
        return sums;
    }

    let rest: Amount = sums[limit - 1..].iter().map(|(_, amount)| *amount).sum();
    sums.truncate(limit - 1);
    sums.push((OTHER_CATEGORIES.to_string(), rest));
    sums
}

/// Per-day sums, oldest day first.
pub fn sum_by_day<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Vec<(String, Amount)> {
    sum_groups(group_by_day(expenses, true))
}

pub fn balance<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Amount {
    sum(expenses)
}

pub fn balance_of_debits<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Amount {
    sum_negative(expenses)
}

pub fn balance_of_one_time_debits<'a>(expenses: impl IntoIterator<Item = &'a Expense>) -> Amount {
    sum_negative(live(expenses).filter(|expense| !expense.is_recurring()))
}

pub fn balance_of_recurring_debits<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Amount {
    sum_negative(live(expenses).filter(|expense| expense.is_recurring()))
}

/// Net balance per month, oldest month first.
pub fn balance_by_month<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Vec<(String, Amount)> {
    sum_groups(group_by_month(expenses, true))
}

/// Debits per month (oldest first), split per category in order of first
/// occurrence.
pub fn debits_by_month<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Vec<(String, Vec<(String, Amount)>)> {
    let debits = live(expenses).filter(|expense| expense.amount().is_negative());
    group_by_month(debits, true)
        .into_iter()
        .map(|(month, expenses)| (month, sum_groups(group_by_category(expenses))))
        .collect()
}

fn running_total(sums: Vec<(String, Amount)>) -> Vec<(String, Amount)> {
    let mut total = Amount::ZERO;
    sums.into_iter()
        .map(|(key, amount)| {
            total += amount;
            (key, total)
        })
        .collect()
}

/// Running balance at the end of each day, oldest first.
pub fn aggregated_balance_by_day<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Vec<(String, Amount)> {
    running_total(sum_by_day(expenses))
}

/// Running balance at the end of each month, oldest first.
pub fn aggregated_balance_by_month<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Vec<(String, Amount)> {
    running_total(balance_by_month(expenses))
}
