//! Records exchanged with the key-value store and the sync endpoint.
//!
//! Outgoing records are strongly typed. Incoming records stay untyped
//! (`serde_json::Value`) so that each one can be validated on its own: a
//! malformed entry must never poison the whole payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod expense {
    use super::*;

    /// Whether an expense recurs.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum Periodicity {
        #[default]
        OneTime,
        Monthly,
    }

    impl Periodicity {
        /// Parses the wire name, `None` for anything unknown.
        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "one-time" => Some(Self::OneTime),
                "monthly" => Some(Self::Monthly),
                _ => None,
            }
        }
    }

    /// Canonical serialized form of an expense.
    ///
    /// Field order is fixed, so two serializations of the same expense are
    /// byte-identical.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct ExpenseRecord {
        #[serde(rename = "_id")]
        pub id: String,
        /// Calendar day, `YYYY-MM-DD` (UTC).
        pub date: String,
        /// Signed amount: negative = expense, positive = income.
        pub amount: f64,
        pub category: String,
        pub label: String,
        pub periodicity: Periodicity,
        pub deleted: bool,
        pub checked: bool,
        /// ISO-8601 UTC instant.
        #[serde(rename = "updatedAt")]
        pub updated_at: String,
    }
}

pub mod storage {
    use super::*;

    /// Payload stored under the `data` key.
    ///
    /// Written with typed records, read back as untyped ones.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct StoredData<R = Value> {
        pub expenses: Vec<R>,
        #[serde(default)]
        pub version: u32,
    }
}

pub mod sync {
    use super::*;

    use crate::expense::ExpenseRecord;

    /// Body of the sync push: the whole local collection.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct SyncRequest {
        /// Route discriminator expected by the endpoint.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub route: Option<String>,
        pub expenses: Vec<ExpenseRecord>,
    }

    /// Delta returned by the endpoint: records new or changed on its side.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct SyncResponse {
        #[serde(default)]
        pub expenses: Vec<Value>,
    }
}
