//! Push-then-merge reconciliation against the remote authority.
//!
//! The full local collection (soft-deleted expenses included, mirrors never)
//! is pushed in one request. The remote answers with the records that are new
//! or changed on its side, which are merged back by id: a remote record
//! replaces the local one with the same id, unknown ids are appended, and
//! local expenses missing from the answer are left alone.

use std::{collections::HashMap, future::Future};

use api_types::sync::{SyncRequest, SyncResponse};
use serde_json::Value;

use crate::{Expense, expenses::sort_expenses};

/// Route discriminator sent along with the push.
pub const SYNC_ROUTE: &str = "/expenses/sync";

/// The remote end of a sync.
pub trait SyncRemote: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends the full collection and returns the delta to merge.
    fn push(
        &self,
        request: SyncRequest,
    ) -> impl Future<Output = Result<SyncResponse, Self::Error>> + Send;
}

/// Builds the push payload out of the canonical collection.
pub fn sync_request(expenses: &[Expense]) -> SyncRequest {
    SyncRequest {
        route: Some(SYNC_ROUTE.to_string()),
        expenses: expenses.iter().map(Expense::to_record).collect(),
    }
}

/// Outcome of merging one delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub replaced: usize,
    pub added: usize,
    pub skipped: usize,
}

impl MergeReport {
    pub fn merged(&self) -> usize {
        self.replaced + self.added
    }
}

/// Merges remote `records` into `expenses` by id, last write wins.
///
/// Invalid records are logged and skipped. The collection is sorted again
/// afterwards.
pub fn merge_records(expenses: &mut Vec<Expense>, records: &[Value]) -> MergeReport {
    let mut report = MergeReport::default();
    let mut index: HashMap<String, usize> = expenses
        .iter()
        .enumerate()
        .map(|(i, expense)| (expense.id().to_string(), i))
        .collect();

    for record in records {
        let expense = match Expense::from_record(record) {
            Ok(expense) => expense,
            Err(err) => {
                tracing::warn!("skipping remote record: {err}");
                report.skipped += 1;
                continue;
            }
        };

        match index.get(expense.id()) {
            Some(&i) => {
                expenses[i] = expense;
                report.replaced += 1;
            }
            None => {
                index.insert(expense.id().to_string(), expenses.len());
                expenses.push(expense);
                report.added += 1;
            }
        }
    }

    if report.merged() > 0 {
        sort_expenses(expenses);
    }
    report
}
