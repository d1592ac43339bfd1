//! Local persistence of the expense collection.
//!
//! The whole collection, soft-deleted expenses included, is stored as one
//! JSON string under [`STORAGE_KEY`] of a key-value store:
//! `{ "expenses": [ExpenseRecord...], "version": 1 }`.

use std::{
    collections::{BTreeMap, HashMap},
    convert::Infallible,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use api_types::storage::StoredData;
use tokio::sync::Mutex;

use crate::{
    EngineError, Expense, ResultEngine,
    expenses::{InvalidRecordPolicy, build_from_records},
};

pub const STORAGE_KEY: &str = "data";
pub const SCHEMA_VERSION: u32 = 1;

/// A store of opaque string values.
pub trait KeyValueStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Value under `key`, `None` when absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// Writes `value` under `key`, overwriting.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value store backed by one JSON file (`{ "key": "value", ... }`).
///
/// A missing file reads as an empty store.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, FileStoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), FileStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        if tokio::fs::rename(&tmp, &self.path).await.is_err() {
            tokio::fs::copy(&tmp, &self.path).await?;
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    type Error = FileStoreError;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Self::Error> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value);
        self.write_map(&map).await
    }
}

/// In-memory key-value store. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Self::Error> {
        self.inner.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Serializes the collection into the stored payload.
pub fn encode_expenses(expenses: &[Expense]) -> ResultEngine<String> {
    let data = StoredData {
        expenses: expenses.iter().map(Expense::to_record).collect(),
        version: SCHEMA_VERSION,
    };
    Ok(serde_json::to_string(&data)?)
}

/// Parses a stored payload. Records failing validation are skipped.
pub fn decode_expenses(raw: &str) -> ResultEngine<Vec<Expense>> {
    let data: StoredData = serde_json::from_str(raw)?;
    build_from_records(&data.expenses, InvalidRecordPolicy::Skip)
}

/// Reads the collection, failing on a store error or an unparseable payload.
/// An absent value is an empty collection.
pub async fn read_expenses<S: KeyValueStore>(store: &S) -> ResultEngine<Vec<Expense>> {
    let raw = store
        .get(STORAGE_KEY)
        .await
        .map_err(|err| EngineError::Storage(err.to_string()))?;
    match raw {
        Some(raw) => decode_expenses(&raw),
        None => Ok(Vec::new()),
    }
}

/// Reads the collection, falling back to an empty one on any failure.
pub async fn load_expenses<S: KeyValueStore>(store: &S) -> Vec<Expense> {
    tracing::info!("Loading expenses from store...");
    match read_expenses(store).await {
        Ok(expenses) => {
            tracing::info!("Loaded {} expenses", expenses.len());
            expenses
        }
        Err(err) => {
            tracing::error!("failed to load expenses: {err}");
            Vec::new()
        }
    }
}

/// Writes the full collection, overwriting the previous payload.
pub async fn save_expenses<S: KeyValueStore>(store: &S, expenses: &[Expense]) -> ResultEngine<()> {
    let raw = encode_expenses(expenses)?;
    store
        .set(STORAGE_KEY, raw)
        .await
        .map_err(|err| EngineError::Storage(err.to_string()))
}
