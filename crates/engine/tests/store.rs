use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use api_types::sync::{SyncRequest, SyncResponse};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tokio::sync::Notify;
use uuid::Uuid;

use engine::{
    Amount, EngineError, ExpenseChanges, ExpenseSpec, JsonFileStore, KeyValueStore, MemoryStore,
    Periodicity, Store, SyncOutcome, SyncRemote, storage,
};

#[derive(Debug, thiserror::Error)]
#[error("remote unreachable")]
struct RemoteDown;

/// Scripted remote: answers pushes from a queue, an empty queue meaning
/// "nothing to merge". With a gate set, every push waits for a permit.
#[derive(Clone, Default)]
struct FakeRemote {
    responses: Arc<Mutex<VecDeque<Result<Vec<Value>, RemoteDown>>>>,
    pushed: Arc<Mutex<Vec<SyncRequest>>>,
    gate: Option<Arc<Notify>>,
}

impl FakeRemote {
    fn answer(&self, response: Result<Vec<Value>, RemoteDown>) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn pushes(&self) -> usize {
        self.pushed.lock().unwrap().len()
    }

    fn last_push(&self) -> SyncRequest {
        self.pushed.lock().unwrap().last().cloned().unwrap()
    }
}

impl SyncRemote for FakeRemote {
    type Error = RemoteDown;

    async fn push(&self, request: SyncRequest) -> Result<SyncResponse, RemoteDown> {
        self.pushed.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(expenses)) => Ok(SyncResponse { expenses }),
            Some(Err(err)) => Err(err),
            None => Ok(SyncResponse::default()),
        }
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn spec(date: NaiveDate, cents: i64, category: &str) -> ExpenseSpec {
    ExpenseSpec {
        date: Some(date),
        amount: Some(Amount::new(cents)),
        category: Some(category.to_string()),
        ..Default::default()
    }
}

fn store() -> (Store<MemoryStore, FakeRemote>, MemoryStore, FakeRemote) {
    let storage = MemoryStore::new();
    let remote = FakeRemote::default();
    (Store::new(storage.clone(), remote.clone()), storage, remote)
}

#[tokio::test]
async fn added_expenses_are_listed_newest_first() {
    let (store, _, _) = store();

    store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;
    store.add_expense(spec(day(2024, 3, 9), -700, "fun")).await;
    store.add_expense(spec(day(2024, 2, 20), -100, "food")).await;

    let dates: Vec<_> = store.expenses().await.iter().map(|e| e.date()).collect();
    assert_eq!(dates, vec![day(2024, 3, 9), day(2024, 3, 1), day(2024, 2, 20)]);
}

#[tokio::test]
async fn every_mutation_bumps_the_revision() {
    let (store, _, _) = store();
    let mut status = store.subscribe();
    let before = status.borrow_and_update().revision;

    let expense = store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;
    assert!(status.has_changed().unwrap());
    assert_eq!(status.borrow_and_update().revision, before + 1);

    store.toggle_checked(expense.id()).await.unwrap();
    assert_eq!(status.borrow_and_update().revision, before + 2);
}

#[tokio::test]
async fn delete_is_soft() {
    let (store, storage, _) = store();
    let kept = store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;
    let gone = store.add_expense(spec(day(2024, 3, 2), -200, "fun")).await;

    let deleted = store.delete_expense(gone.id()).await.unwrap();
    assert!(deleted.deleted());
    assert!(deleted.updated_at() >= gone.updated_at());

    let visible: Vec<_> = store.expenses().await.iter().map(|e| e.id().to_string()).collect();
    assert_eq!(visible, vec![kept.id().to_string()]);
    assert_eq!(store.all_expenses().await.len(), 2);

    store.save().await.unwrap();
    let reloaded = Store::new(storage, FakeRemote::default());
    reloaded.load().await;
    assert_eq!(reloaded.all_expenses().await, store.all_expenses().await);
    assert_eq!(reloaded.expenses().await.len(), 1);
}

#[tokio::test]
async fn editing_a_ghost_edits_its_origin() {
    let (store, _, _) = store();
    let rent = store
        .add_expense(ExpenseSpec {
            periodicity: Some(Periodicity::Monthly),
            ..spec(day(2024, 2, 15), -100_000, "rent")
        })
        .await;

    let view = store.view().await;
    assert_eq!(view.expenses.len(), 2);
    let ghost_id = view.mirrors.mirror_of(rent.id()).unwrap().to_string();
    assert_eq!(view.get(&ghost_id).unwrap().date(), day(2024, 2, 1));

    store
        .edit_expense(
            &ghost_id,
            ExpenseChanges {
                amount: Some(Amount::new(-120_000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let all = store.all_expenses().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id(), rent.id());
    assert_eq!(all[0].amount(), Amount::new(-120_000));
    assert_eq!(all[0].date(), day(2024, 2, 15));

    let view = store.view().await;
    assert!(
        view.expenses
            .iter()
            .all(|expense| expense.amount() == Amount::new(-120_000))
    );
}

#[tokio::test]
async fn ghost_ids_survive_a_reload() {
    let (store, storage, _) = store();
    let rent = store
        .add_expense(ExpenseSpec {
            periodicity: Some(Periodicity::Monthly),
            ..spec(day(2024, 2, 15), -100_000, "rent")
        })
        .await;
    store.save().await.unwrap();
    let ghost_id = store
        .view()
        .await
        .mirrors
        .mirror_of(rent.id())
        .unwrap()
        .to_string();

    let reloaded = Store::new(storage, FakeRemote::default());
    reloaded.load().await;
    let edited = reloaded
        .edit_expense(
            &ghost_id,
            ExpenseChanges {
                amount: Some(Amount::new(-90_000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.id(), rent.id());
    assert_eq!(reloaded.all_expenses().await[0].amount(), Amount::new(-90_000));
    let view = reloaded.view().await;
    assert_eq!(view.mirrors.mirror_of(rent.id()), Some(ghost_id.as_str()));
}

#[tokio::test]
async fn duplicate_keeps_the_source() {
    let (store, _, _) = store();
    let source = store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;

    let copy = store
        .duplicate_expense(
            source.id(),
            ExpenseChanges {
                date: Some(day(2024, 4, 1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_ne!(copy.id(), source.id());
    assert_eq!(copy.date(), day(2024, 4, 1));
    assert_eq!(copy.amount(), source.amount());
    assert_eq!(store.expenses().await.len(), 2);
}

#[tokio::test]
async fn unknown_ids_are_rejected() {
    let (store, _, _) = store();

    let err = store.toggle_checked("missing1").await.unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("missing1".to_string()));
}

#[tokio::test]
async fn load_of_a_corrupt_payload_yields_an_empty_collection() {
    let (store, storage, _) = store();
    storage
        .set(storage::STORAGE_KEY, "{ not json".to_string())
        .await
        .unwrap();

    store.load().await;
    assert!(store.all_expenses().await.is_empty());
}

#[tokio::test]
async fn load_keeps_one_entry_per_id() {
    let (store, storage, _) = store();
    let payload = json!({
        "expenses": [
            { "_id": "aaaaaaaa", "date": "2024-01-01", "amount": -1 },
            { "_id": "aaaaaaaa", "date": "2024-01-01", "amount": -2 },
        ],
        "version": 1,
    });
    storage
        .set(storage::STORAGE_KEY, payload.to_string())
        .await
        .unwrap();

    store.load().await;

    let all = store.all_expenses().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].amount(), Amount::new(-200));
}

#[tokio::test]
async fn sync_pushes_everything_and_merges_the_delta() {
    let (store, storage, remote) = store();
    let local = store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;
    let gone = store.add_expense(spec(day(2024, 3, 2), -200, "fun")).await;
    store.delete_expense(gone.id()).await.unwrap();

    remote.answer(Ok(vec![
        json!({
            "_id": local.id(),
            "date": "2024-03-01",
            "amount": -650,
            "category": "food",
            "updatedAt": "2024-03-05T10:00:00.000Z"
        }),
        json!({
            "_id": "remote01",
            "date": "2024-03-03",
            "amount": 2000,
            "category": "salary",
            "updatedAt": "2024-03-05T10:00:00.000Z"
        }),
        json!({ "_id": "broken01", "amount": 1 }),
    ]));

    assert_eq!(store.sync().await, SyncOutcome::Merged(2));

    let pushed = remote.last_push();
    assert_eq!(pushed.route.as_deref(), Some("/expenses/sync"));
    assert_eq!(pushed.expenses.len(), 2);
    assert!(pushed.expenses.iter().any(|record| record.deleted));

    let all = store.all_expenses().await;
    assert_eq!(all.len(), 3);
    let merged = all.iter().find(|e| e.id() == local.id()).unwrap();
    assert_eq!(merged.amount(), Amount::new(-65_000));

    // merged state was persisted
    let reloaded = Store::new(storage, FakeRemote::default());
    reloaded.load().await;
    assert_eq!(reloaded.all_expenses().await, all);
}

#[tokio::test]
async fn empty_delta_changes_nothing() {
    let (store, _, remote) = store();
    store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;
    let before = store.all_expenses().await;
    let revision = store.status().revision;

    assert_eq!(store.sync().await, SyncOutcome::UpToDate);
    assert_eq!(remote.pushes(), 1);
    assert_eq!(store.all_expenses().await, before);
    assert_eq!(store.status().revision, revision);
}

#[tokio::test]
async fn failed_sync_leaves_the_collection_alone() {
    let (store, _, remote) = store();
    store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;
    let before = store.all_expenses().await;

    remote.answer(Err(RemoteDown));
    assert_eq!(store.sync().await, SyncOutcome::Failed);
    assert_eq!(store.all_expenses().await, before);
    assert!(!store.is_loading());

    // the next sync is the retry
    assert_eq!(store.sync().await, SyncOutcome::UpToDate);
    assert_eq!(remote.pushes(), 2);
}

#[tokio::test]
async fn only_one_sync_runs_at_a_time() {
    let gate = Arc::new(Notify::new());
    let remote = FakeRemote {
        gate: Some(Arc::clone(&gate)),
        ..Default::default()
    };
    let store = Store::new(MemoryStore::new(), remote.clone());

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.sync().await }
    });
    while remote.pushes() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(store.is_loading());
    assert_eq!(store.sync().await, SyncOutcome::AlreadyRunning);

    // edits stay available while the push is in flight
    store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;

    gate.notify_one();
    assert_eq!(first.await.unwrap(), SyncOutcome::UpToDate);
    assert!(!store.is_loading());
    assert_eq!(remote.pushes(), 1);
    assert_eq!(store.expenses().await.len(), 1);
}

#[tokio::test]
async fn sync_if_stale_skips_recent_syncs() {
    let (store, _, remote) = store();

    assert_eq!(
        store.sync_if_stale(Duration::from_secs(60)).await,
        Some(SyncOutcome::UpToDate)
    );
    assert_eq!(store.sync_if_stale(Duration::from_secs(60)).await, None);
    assert_eq!(remote.pushes(), 1);
}

#[tokio::test]
async fn json_file_store_survives_a_restart() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_stores");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join(format!("store_{}.json", Uuid::new_v4()));

    let store = Store::new(JsonFileStore::new(&path), FakeRemote::default());
    store.load().await;
    assert!(store.all_expenses().await.is_empty());

    store.add_expense(spec(day(2024, 3, 1), -500, "food")).await;
    store
        .add_expense(ExpenseSpec {
            label: Some("Loyer".to_string()),
            periodicity: Some(Periodicity::Monthly),
            ..spec(day(2024, 3, 5), -90_000, "rent")
        })
        .await;
    store.save().await.unwrap();

    let reopened = Store::new(JsonFileStore::new(&path), FakeRemote::default());
    reopened.load().await;
    assert_eq!(reopened.all_expenses().await, store.all_expenses().await);

    let _ = std::fs::remove_file(&path);
}
