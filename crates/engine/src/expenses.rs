//! Operations over sequences of expenses.
//!
//! Collections are kept sorted by date, newest first. Ties keep their
//! relative order.
//!
//! Recurring expenses get a *mirror*: a synthetic ghost dated the first day
//! of the month, so that every month has one representative entry even
//! though only one real expense exists. Mirrors are never stored on the
//! entity; the ghost/origin pairing lives in a [`MirrorTable`] rebuilt
//! together with the view.

use std::collections::HashMap;

use serde_json::Value;

use crate::{EngineError, Expense, ExpenseSpec, ResultEngine, dates};

/// What to do with a record that fails validation while building a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidRecordPolicy {
    /// Log the failure and keep going.
    Skip,
    /// Fail the whole batch with the first error.
    Abort,
}

/// Sorts in place by date, newest first.
pub fn sort_expenses(expenses: &mut [Expense]) {
    expenses.sort_by(|a, b| b.date().cmp(&a.date()));
}

/// Builds a sorted collection out of untyped records. A repeated id keeps
/// the last record carrying it.
pub fn build_from_records<'a, I>(records: I, policy: InvalidRecordPolicy) -> ResultEngine<Vec<Expense>>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut expenses: Vec<Expense> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        match Expense::from_record(record) {
            Ok(expense) => match index.get(expense.id()) {
                Some(&i) => {
                    tracing::warn!("duplicate record {}, keeping the last one", expense.id());
                    expenses[i] = expense;
                }
                None => {
                    index.insert(expense.id().to_string(), expenses.len());
                    expenses.push(expense);
                }
            },
            Err(err) => match policy {
                InvalidRecordPolicy::Skip => tracing::warn!("skipping record: {err}"),
                InvalidRecordPolicy::Abort => return Err(err),
            },
        }
    }
    sort_expenses(&mut expenses);
    Ok(expenses)
}

/// Symmetric ghost <-> origin pairing of a mirrored view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MirrorTable {
    pairs: HashMap<String, String>,
}

impl MirrorTable {
    fn link(&mut self, ghost_id: &str, origin_id: &str) {
        self.pairs
            .insert(ghost_id.to_string(), origin_id.to_string());
        self.pairs
            .insert(origin_id.to_string(), ghost_id.to_string());
    }

    /// Id of the expense paired with `id`, either way.
    pub fn mirror_of(&self, id: &str) -> Option<&str> {
        self.pairs.get(id).map(String::as_str)
    }

    /// Mirrored and dated on the first of the month: the synthetic copy.
    pub fn is_mirror_ghost(&self, expense: &Expense) -> bool {
        self.pairs.contains_key(expense.id()) && dates::is_first_day_of_month(expense.date())
    }

    /// Mirrored and not on the first of the month: the real entry.
    pub fn is_mirror_origin(&self, expense: &Expense) -> bool {
        self.pairs.contains_key(expense.id()) && !dates::is_first_day_of_month(expense.date())
    }

    /// Id an edit of `expense` must land on: edits of a ghost go to its
    /// origin, anything else is edited in place.
    pub fn edit_target<'a>(&'a self, expense: &'a Expense) -> &'a str {
        if self.is_mirror_ghost(expense) {
            if let Some(origin) = self.mirror_of(expense.id()) {
                return origin;
            }
        }
        expense.id()
    }

    pub fn len(&self) -> usize {
        self.pairs.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A display list with mirrors injected.
#[derive(Clone, Debug, Default)]
pub struct MirroredExpenses {
    pub expenses: Vec<Expense>,
    pub mirrors: MirrorTable,
}

impl MirroredExpenses {
    pub fn get(&self, id: &str) -> Option<&Expense> {
        self.expenses.iter().find(|expense| expense.id() == id)
    }

    /// The paired expense of `id`, if it is mirrored.
    pub fn mirror(&self, id: &str) -> Option<&Expense> {
        self.mirrors.mirror_of(id).and_then(|other| self.get(other))
    }
}

/// Id of the ghost mirroring `origin`. Derived from the origin so that it
/// survives a rebuild of the view; the `@` keeps it apart from generated ids.
pub fn ghost_id(origin: &Expense) -> String {
    format!("{}@{}", origin.id(), dates::format_month(origin.date()))
}

/// Returns a new sorted sequence where every recurring expense not dated on
/// the first of its month is accompanied by a ghost copy dated on the first.
/// The input is left untouched.
pub fn inject_mirrors(expenses: &[Expense]) -> MirroredExpenses {
    let mut result = expenses.to_vec();
    let mut mirrors = MirrorTable::default();

    for origin in expenses.iter().filter(|expense| expense.is_recurring()) {
        if dates::is_first_day_of_month(origin.date()) {
            continue;
        }

        let ghost = Expense::new(ExpenseSpec {
            id: Some(ghost_id(origin)),
            date: Some(dates::start_of_month(origin.date())),
            amount: Some(origin.amount()),
            category: Some(origin.category().to_string()),
            label: Some(origin.label().to_string()),
            periodicity: Some(origin.periodicity()),
            deleted: Some(origin.deleted()),
            checked: Some(origin.checked()),
            updated_at: Some(origin.updated_at()),
        });
        mirrors.link(ghost.id(), origin.id());

        // First position holding something older than the ghost.
        let index = result
            .iter()
            .position(|expense| expense.date() < ghost.date())
            .unwrap_or(result.len());
        result.insert(index, ghost);
    }

    sort_expenses(&mut result);
    MirroredExpenses {
        expenses: result,
        mirrors,
    }
}

/// Distinct non-empty labels used with `category`, least used first.
pub fn extract_labels(expenses: &[Expense], category: &str) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for expense in expenses {
        if expense.label().is_empty() || expense.category() != category {
            continue;
        }
        match counts.iter_mut().find(|(label, _)| label == expense.label()) {
            Some((_, count)) => *count += 1,
            None => counts.push((expense.label().to_string(), 1)),
        }
    }
    counts.sort_by_key(|(_, count)| *count);
    counts.into_iter().map(|(label, _)| label).collect()
}

/// Distinct `YYYY-MM` months, newest first.
pub fn extract_months(expenses: &[Expense]) -> Vec<String> {
    let mut months: Vec<String> = expenses
        .iter()
        .map(|expense| dates::format_month(expense.date()))
        .collect();
    months.sort_by(|a, b| b.cmp(a));
    months.dedup();
    months
}

/// Position of the expense with `id`.
pub fn position(expenses: &[Expense], id: &str) -> ResultEngine<usize> {
    expenses
        .iter()
        .position(|expense| expense.id() == id)
        .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))
}
