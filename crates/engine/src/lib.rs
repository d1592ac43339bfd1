//! Core of the expense tracker.
//!
//! The engine owns the expense collection and everything computed from it:
//! the [`Expense`] entity and its edits, recurring mirrors, grouping and
//! aggregation in [`stats`], local persistence through a [`KeyValueStore`]
//! and push-then-merge reconciliation against a [`SyncRemote`].
//!
//! [`Store`] ties these together and is what front-ends talk to.

pub use api_types::expense::Periodicity;
pub use error::EngineError;
pub use expense::{Expense, ExpenseChanges, ExpenseSpec};
pub use expenses::{MirrorTable, MirroredExpenses};
pub use money::Amount;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use store::{Store, StoreStatus, SyncOutcome};
pub use sync::SyncRemote;

pub mod categories;
pub mod dates;
mod error;
mod expense;
pub mod expenses;
mod money;
pub mod stats;
pub mod storage;
mod store;
pub mod sync;

pub type ResultEngine<T> = Result<T, EngineError>;
