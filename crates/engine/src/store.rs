//! The expense store: explicit owner of the in-memory working set.
//!
//! Consumers hold a cheap clone of [`Store`] and observe changes through
//! [`Store::subscribe`]. Only the persistence calls and the network
//! round-trip take wall-clock time; the collection lock is never held across
//! any of them, so edits stay immediate while a sync is in flight.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, watch};

use crate::{
    Expense, ExpenseChanges, ExpenseSpec, ResultEngine,
    expenses::{self, MirroredExpenses, inject_mirrors, sort_expenses},
    storage::{self, KeyValueStore},
    sync::{self, SyncRemote, merge_records},
};

/// Snapshot published to subscribers on every change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStatus {
    /// Bumped whenever the collection changes.
    pub revision: u64,
    /// A sync is in flight.
    pub loading: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The delta held this many valid records, now merged and persisted.
    Merged(usize),
    /// Nothing to merge.
    UpToDate,
    /// Transport or remote failure, logged; the next sync is the retry.
    Failed,
    /// Another sync was in flight, nothing was sent.
    AlreadyRunning,
}

#[derive(Debug, Default)]
struct State {
    /// Canonical collection, soft-deleted expenses included.
    all: Vec<Expense>,
    /// Non-deleted expenses.
    visible: Vec<Expense>,
    /// Visible expenses with mirrors, rebuilt with `visible`.
    view: MirroredExpenses,
    last_sync: Option<Instant>,
}

impl State {
    fn refresh(&mut self) {
        sort_expenses(&mut self.all);
        self.visible = self
            .all
            .iter()
            .filter(|expense| !expense.deleted())
            .cloned()
            .collect();
        self.view = inject_mirrors(&self.visible);
    }

    /// Index in `all` an edit of `id` lands on; ghosts resolve to their origin.
    fn edit_index(&self, id: &str) -> ResultEngine<usize> {
        let target = match self.view.get(id) {
            Some(expense) => self.view.mirrors.edit_target(expense),
            None => id,
        };
        expenses::position(&self.all, target)
    }
}

struct Inner<S, R> {
    storage: S,
    remote: R,
    state: Mutex<State>,
    syncing: AtomicBool,
    status: watch::Sender<StoreStatus>,
}

/// Clears the in-flight flag when a sync ends, however it ends.
struct InFlight<'a, S, R> {
    inner: &'a Inner<S, R>,
}

impl<S, R> Drop for InFlight<'_, S, R> {
    fn drop(&mut self) {
        self.inner.syncing.store(false, Ordering::Release);
        self.inner.status.send_modify(|status| status.loading = false);
    }
}

pub struct Store<S, R> {
    inner: Arc<Inner<S, R>>,
}

impl<S, R> Clone for Store<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyValueStore, R: SyncRemote> Store<S, R> {
    pub fn new(storage: S, remote: R) -> Self {
        let (status, _) = watch::channel(StoreStatus::default());
        Self {
            inner: Arc::new(Inner {
                storage,
                remote,
                state: Mutex::new(State::default()),
                syncing: AtomicBool::new(false),
                status,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreStatus> {
        self.inner.status.subscribe()
    }

    pub fn status(&self) -> StoreStatus {
        *self.inner.status.borrow()
    }

    pub fn is_loading(&self) -> bool {
        self.status().loading
    }

    fn changed(&self) {
        self.inner
            .status
            .send_modify(|status| status.revision += 1);
    }

    /// Visible expenses, newest first.
    pub async fn expenses(&self) -> Vec<Expense> {
        self.inner.state.lock().await.visible.clone()
    }

    /// Every expense, soft-deleted ones included.
    pub async fn all_expenses(&self) -> Vec<Expense> {
        self.inner.state.lock().await.all.clone()
    }

    /// Visible expenses with recurring mirrors injected.
    pub async fn view(&self) -> MirroredExpenses {
        self.inner.state.lock().await.view.clone()
    }

    pub async fn add_expense(&self, spec: ExpenseSpec) -> Expense {
        let expense = Expense::new(spec);
        {
            let mut state = self.inner.state.lock().await;
            state.all.push(expense.clone());
            state.refresh();
        }
        self.changed();
        expense
    }

    /// Edits the expense `id`. Edits of a mirror ghost land on its origin;
    /// the ghost itself is rebuilt with the view.
    pub async fn edit_expense(&self, id: &str, changes: ExpenseChanges) -> ResultEngine<Expense> {
        let edited = {
            let mut state = self.inner.state.lock().await;
            let index = state.edit_index(id)?;
            state.all[index].edit(changes);
            let edited = state.all[index].clone();
            state.refresh();
            edited
        };
        self.changed();
        Ok(edited)
    }

    /// Duplicates the expense `id` (its origin, for a ghost) with `changes`
    /// applied to the copy.
    pub async fn duplicate_expense(
        &self,
        id: &str,
        changes: ExpenseChanges,
    ) -> ResultEngine<Expense> {
        let copy = {
            let mut state = self.inner.state.lock().await;
            let index = state.edit_index(id)?;
            let copy = state.all[index].duplicate(changes);
            state.all.push(copy.clone());
            state.refresh();
            copy
        };
        self.changed();
        Ok(copy)
    }

    /// Soft delete: the expense stays in the collection, flagged.
    pub async fn delete_expense(&self, id: &str) -> ResultEngine<Expense> {
        self.edit_expense(
            id,
            ExpenseChanges {
                deleted: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn toggle_checked(&self, id: &str) -> ResultEngine<Expense> {
        let checked = {
            let state = self.inner.state.lock().await;
            let index = state.edit_index(id)?;
            state.all[index].checked()
        };
        self.edit_expense(
            id,
            ExpenseChanges {
                checked: Some(!checked),
                ..Default::default()
            },
        )
        .await
    }

    /// Replaces the working set with the persisted one. Never fails: an
    /// unreadable payload yields an empty collection.
    pub async fn load(&self) {
        let expenses = storage::load_expenses(&self.inner.storage).await;
        {
            let mut state = self.inner.state.lock().await;
            state.all = expenses;
            state.refresh();
        }
        self.changed();
    }

    /// Persists the full collection.
    pub async fn save(&self) -> ResultEngine<()> {
        let snapshot = self.inner.state.lock().await.all.clone();
        storage::save_expenses(&self.inner.storage, &snapshot).await
    }

    /// Pushes the collection and merges the returned delta.
    ///
    /// Failures are logged, never returned: the next sync is the retry. A
    /// call made while another sync is in flight returns
    /// [`SyncOutcome::AlreadyRunning`] right away.
    pub async fn sync(&self) -> SyncOutcome {
        if self.inner.syncing.swap(true, Ordering::AcqRel) {
            tracing::info!("Sync already in flight, skipping");
            return SyncOutcome::AlreadyRunning;
        }
        let _flight = InFlight { inner: &self.inner };
        self.inner.status.send_modify(|status| status.loading = true);

        tracing::info!("Synchronizing expenses...");
        let request = {
            let mut state = self.inner.state.lock().await;
            state.last_sync = Some(Instant::now());
            sync::sync_request(&state.all)
        };

        let response = match self.inner.remote.push(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!("sync failed: {err}");
                return SyncOutcome::Failed;
            }
        };

        if response.expenses.is_empty() {
            tracing::info!("Sync done, nothing to merge");
            return SyncOutcome::UpToDate;
        }

        let report = {
            let mut state = self.inner.state.lock().await;
            let report = merge_records(&mut state.all, &response.expenses);
            if report.merged() > 0 {
                state.refresh();
            }
            report
        };
        tracing::info!(
            "Merged {} remote records ({} replaced, {} added, {} skipped)",
            report.merged(),
            report.replaced,
            report.added,
            report.skipped
        );

        if report.merged() == 0 {
            return SyncOutcome::UpToDate;
        }

        self.changed();
        if let Err(err) = self.save().await {
            tracing::error!("failed to persist merged expenses: {err}");
        }
        SyncOutcome::Merged(report.merged())
    }

    /// Syncs unless a sync started less than `interval` ago.
    pub async fn sync_if_stale(&self, interval: Duration) -> Option<SyncOutcome> {
        let last_sync = self.inner.state.lock().await.last_sync;
        if last_sync.is_some_and(|at| at.elapsed() <= interval) {
            return None;
        }
        Some(self.sync().await)
    }

    pub async fn load_and_sync(&self) -> SyncOutcome {
        self.load().await;
        self.sync().await
    }

    /// Persists then syncs. A failed save is logged; the sync still runs.
    pub async fn save_and_sync(&self) -> SyncOutcome {
        if let Err(err) = self.save().await {
            tracing::error!("failed to save expenses: {err}");
        }
        self.sync().await
    }
}
