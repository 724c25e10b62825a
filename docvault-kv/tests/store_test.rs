use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Barrier;
use tracing_subscriber::EnvFilter;

use docvault_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{CH_TIME, CR_TIME, INTERNAL_ID, RawDocument, RawDocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Filter, ReadQuery, SortDirection},
    update::UpdateExpr,
};
use docvault_kv::{
    CandidateSource, InMemoryKv, KeyValueClient, KvDocumentStore,
    keys::{document_key, index_key},
};

/// In-memory client with fault injection.
#[derive(Debug, Default)]
struct TestKv {
    inner: InMemoryKv,
    calls: AtomicUsize,
    fail_sets_ending_with: Mutex<Option<String>>,
    fail_deletes_ending_with: Mutex<Option<String>>,
    fail_hsets: AtomicBool,
    gated_gets: AtomicUsize,
    gate: Mutex<Option<Arc<Barrier>>>,
    stall_hgetall: AtomicBool,
}

impl TestKv {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail_sets_ending_with(&self, suffix: Option<&str>) {
        *self.fail_sets_ending_with.lock().unwrap() = suffix.map(str::to_string);
    }

    fn fail_deletes_ending_with(&self, suffix: Option<&str>) {
        *self.fail_deletes_ending_with.lock().unwrap() = suffix.map(str::to_string);
    }

    fn fail_hsets(&self, failing: bool) {
        self.fail_hsets.store(failing, Ordering::SeqCst);
    }

    /// Makes the next `n` gets wait until all `n` have arrived.
    fn gate_gets(&self, n: usize) {
        *self.gate.lock().unwrap() = Some(Arc::new(Barrier::new(n)));
        self.gated_gets.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueClient for TestKv {
    async fn get(&self, key: &str) -> DocumentStoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gated = self
            .gated_gets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if gated {
            let barrier = self.gate.lock().unwrap().clone();
            if let Some(barrier) = barrier {
                barrier.wait().await;
            }
        }

        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> DocumentStoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.fail_sets_ending_with.lock().unwrap().clone();
        if let Some(suffix) = failing {
            if key.ends_with(&suffix) {
                return Err(DocumentStoreError::Backend(format!("injected failure for {key}")));
            }
        }

        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, keys: &[String]) -> DocumentStoreResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.fail_deletes_ending_with.lock().unwrap().clone();
        if let Some(suffix) = failing {
            if keys.iter().any(|key| key.ends_with(&suffix)) {
                return Err(DocumentStoreError::Backend(format!("injected failure for {keys:?}")));
            }
        }

        self.inner.delete(keys).await
    }

    async fn scan(&self, pattern: &str) -> DocumentStoreResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.scan(pattern).await
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> DocumentStoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_hsets.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Backend(format!("injected failure for {key}")));
        }

        self.inner.hset(key, field, value).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> DocumentStoreResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.hdel(key, fields).await
    }

    async fn hgetall(&self, key: &str) -> DocumentStoreResult<HashMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.stall_hgetall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        self.inner.hgetall(key).await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ping().await
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn doc(value: Value) -> RawDocument {
    value.as_object().cloned().unwrap()
}

async fn memory_store() -> KvDocumentStore<InMemoryKv> {
    KvDocumentStore::builder(InMemoryKv::new())
        .build()
        .await
        .unwrap()
}

async fn test_store() -> KvDocumentStore<TestKv> {
    init_tracing();

    KvDocumentStore::builder(TestKv::default())
        .build()
        .await
        .unwrap()
}

async fn read_all<C: KeyValueClient>(store: &KvDocumentStore<C>, collection: &str) -> Vec<RawDocument> {
    store
        .read_documents(collection, &ReadQuery::new())
        .await
        .unwrap()
        .items
}

async fn index_members<C: KeyValueClient>(store: &KvDocumentStore<C>, collection: &str) -> HashSet<String> {
    store
        .client()
        .hgetall(&index_key(collection))
        .await
        .unwrap()
        .into_keys()
        .collect()
}

#[tokio::test]
async fn create_then_read_by_id_round_trips() {
    let store = memory_store().await;
    let input = doc(json!({
        "name": "Alice",
        "age": 30,
        "tags": ["a", "b"],
        "profile": { "city": "Oslo" },
    }));

    let ids = store
        .create_documents("users", vec![input.clone()])
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);

    let page = store
        .read_documents(
            "users",
            &ReadQuery::builder()
                .filter(Filter::literal(INTERNAL_ID, ids[0].as_str()))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    let stored = &page.items[0];
    assert_eq!(stored.without_system_fields(), input);
    assert_eq!(stored.internal_id(), Some(ids[0].as_str()));
    assert!(stored[CR_TIME].is_i64());
    assert_eq!(stored[CR_TIME], stored[CH_TIME]);
}

#[tokio::test]
async fn create_keeps_caller_ids_and_input_order() {
    let store = memory_store().await;

    let ids = store
        .create_documents(
            "users",
            vec![doc(json!({ "internal_id": "u-1" })), doc(json!({ "internal_id": "" })), doc(json!({}))],
        )
        .await
        .unwrap();

    assert_eq!(ids[0], "u-1");
    assert!(!ids[1].is_empty() && !ids[2].is_empty());
    assert_ne!(ids[1], ids[2]);
    assert!(store.create_documents("users", vec![]).await.unwrap().is_empty());
}

#[tokio::test]
async fn filters_are_applied() {
    let store = memory_store().await;
    store
        .create_documents(
            "people",
            vec![
                doc(json!({ "name": "a", "age": 20, "user": { "id": "x" } })),
                doc(json!({ "name": "b", "age": 30, "user": { "id": "y" } })),
                doc(json!({ "name": "c", "age": 40 })),
            ],
        )
        .await
        .unwrap();

    let query = |filter: Value| {
        ReadQuery::builder()
            .filter(Filter::from_value(filter).unwrap())
            .sort("name", SortDirection::Asc)
            .build()
    };
    let names = |items: Vec<RawDocument>| -> Vec<String> {
        items
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect()
    };

    let page = store
        .read_documents("people", &query(json!({ "age": { "$gte": 30 } })))
        .await
        .unwrap();
    assert_eq!(names(page.items), vec!["b", "c"]);

    let page = store
        .read_documents("people", &query(json!({ "user.id": "y" })))
        .await
        .unwrap();
    assert_eq!(names(page.items), vec!["b"]);

    let page = store
        .read_documents("people", &query(json!({ "age": { "$nin": [20, 40] }, "name": { "$ne": "z" } })))
        .await
        .unwrap();
    assert_eq!(names(page.items), vec!["b"]);
}

#[tokio::test]
async fn pagination_counts_total_before_window() {
    let store = memory_store().await;
    store
        .create_documents("nums", (0..10).map(|n| doc(json!({ "n": n }))).collect())
        .await
        .unwrap();

    let page = store
        .read_documents(
            "nums",
            &ReadQuery::builder()
                .sort("n", SortDirection::Asc)
                .skip(7)
                .limit(5)
                .build(),
        )
        .await
        .unwrap();
    let ns: Vec<i64> = page.items.iter().map(|d| d["n"].as_i64().unwrap()).collect();
    assert_eq!(ns, vec![7, 8, 9]);
    assert_eq!(page.total, 10);

    let page = store
        .read_documents("nums", &ReadQuery::builder().skip(15).build())
        .await
        .unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total, 10);
}

#[tokio::test]
async fn projection_applies_after_sort() {
    let store = memory_store().await;
    store
        .create_documents(
            "nums",
            vec![doc(json!({ "n": 2, "label": "two" })), doc(json!({ "n": 1, "label": "one" }))],
        )
        .await
        .unwrap();

    let page = store
        .read_documents(
            "nums",
            &ReadQuery::builder()
                .sort("n", SortDirection::Desc)
                .fields(["label"])
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(page.items, vec![doc(json!({ "label": "two" })), doc(json!({ "label": "one" }))]);
}

#[tokio::test]
async fn update_applies_operators_and_bumps_change_time() {
    let store = memory_store().await;
    let ids = store
        .create_documents("scores", vec![doc(json!({ "name": "ada", "score": 10, "old": true }))])
        .await
        .unwrap();
    let before = read_all(&store, "scores").await.remove(0);

    let update = UpdateExpr::from_value(json!({
        "$inc": { "score": 5 },
        "$unset": { "old": "", "cr_time": "" },
        "$set": { "internal_id": "hijack", "level": 2 },
    }))
    .unwrap();
    let modified = store
        .update_documents("scores", &Filter::literal("name", "ada"), &update, false)
        .await
        .unwrap();
    assert_eq!(modified, 1);

    let after = read_all(&store, "scores").await.remove(0);
    assert_eq!(after["score"], json!(15));
    assert_eq!(after["level"], json!(2));
    assert!(!after.contains_key("old"));
    assert_eq!(after.internal_id(), Some(ids[0].as_str()));
    assert_eq!(after[CR_TIME], before[CR_TIME]);
    assert!(after[CH_TIME].as_i64().unwrap() > before[CH_TIME].as_i64().unwrap());
}

#[tokio::test]
async fn update_without_match_or_upsert_is_a_no_op() {
    let store = memory_store().await;

    let modified = store
        .update_documents("scores", &Filter::literal("name", "nobody"), &UpdateExpr::new().set("x", 1), false)
        .await
        .unwrap();

    assert_eq!(modified, 0);
    assert!(read_all(&store, "scores").await.is_empty());
}

#[tokio::test]
async fn upsert_creates_exactly_one_document() {
    let store = memory_store().await;

    let modified = store
        .update_documents(
            "users",
            &Filter::literal("name", "zed"),
            &UpdateExpr::new().set("name", "zed").set("age", 1),
            true,
        )
        .await
        .unwrap();
    assert_eq!(modified, 1);

    let docs = read_all(&store, "users").await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].without_system_fields(), doc(json!({ "name": "zed", "age": 1 })));
    assert!(docs[0].internal_id().is_some());
    assert_eq!(index_members(&store, "users").await.len(), 1);
}

#[tokio::test]
async fn delete_removes_record_and_index_entry() {
    let store = memory_store().await;
    let ids = store
        .create_documents("users", vec![doc(json!({ "name": "a" })), doc(json!({ "name": "b" }))])
        .await
        .unwrap();

    let none = store
        .delete_documents("users", &Filter::literal("name", "nobody"))
        .await
        .unwrap();
    assert_eq!(none, 0);

    let deleted = store
        .delete_documents("users", &Filter::literal(INTERNAL_ID, ids[0].as_str()))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let remaining = read_all(&store, "users").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].internal_id(), Some(ids[1].as_str()));

    let members = index_members(&store, "users").await;
    assert!(!members.contains(&ids[0]));
    assert!(members.contains(&ids[1]));
    assert!(matches!(
        store.client().get(&document_key("users", &ids[0])).await,
        Err(DocumentStoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn collections_are_isolated() {
    let store = memory_store().await;
    store.create_documents("a", vec![doc(json!({ "v": 1 }))]).await.unwrap();
    store.create_documents("ab", vec![doc(json!({ "v": 2 }))]).await.unwrap();

    assert_eq!(read_all(&store, "a").await.len(), 1);
    assert_eq!(read_all(&store, "ab").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_records_disappear_and_index_is_repaired() {
    let store = memory_store().await;
    let ids = store
        .create_documents("sessions", vec![doc(json!({ "ttl": 10, "user": "a" })), doc(json!({ "user": "b" }))])
        .await
        .unwrap();

    let docs = read_all(&store, "sessions").await;
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| !d.contains_key("ttl")));

    tokio::time::advance(Duration::from_secs(11)).await;

    let docs = read_all(&store, "sessions").await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].internal_id(), Some(ids[1].as_str()));

    let members = index_members(&store, "sessions").await;
    assert_eq!(members, HashSet::from([ids[1].clone()]));
}

#[tokio::test]
async fn reconcile_repairs_index_from_records() {
    let store = memory_store().await;
    store.create_documents("users", vec![doc(json!({ "name": "a" }))]).await.unwrap();

    let client = store.client();
    client
        .set(&document_key("users", "orphan"), json!({ "internal_id": "orphan", "name": "o" }).to_string(), None)
        .await
        .unwrap();
    client.hset(&index_key("users"), "ghost", "0".into()).await.unwrap();

    let report = store.reconcile("users").await.unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.removed, 1);

    let members = index_members(&store, "users").await;
    assert_eq!(members.len(), 2);
    assert!(members.contains("orphan"));
    assert!(!members.contains("ghost"));
    assert_eq!(read_all(&store, "users").await.len(), 2);
}

#[tokio::test]
async fn key_scan_sees_unindexed_records() {
    let store = KvDocumentStore::builder(InMemoryKv::new())
        .candidate_source(CandidateSource::KeyScan)
        .build()
        .await
        .unwrap();

    store
        .client()
        .set(&document_key("users", "x1"), json!({ "internal_id": "x1" }).to_string(), None)
        .await
        .unwrap();

    assert_eq!(read_all(&store, "users").await.len(), 1);
}

#[tokio::test]
async fn malformed_records_are_skipped_but_kept_indexed() {
    let store = memory_store().await;
    store.create_documents("users", vec![doc(json!({ "name": "a" }))]).await.unwrap();

    let client = store.client();
    client.set(&document_key("users", "junk"), "not json".into(), None).await.unwrap();
    client.hset(&index_key("users"), "junk", "0".into()).await.unwrap();

    assert_eq!(read_all(&store, "users").await.len(), 1);
    assert!(index_members(&store, "users").await.contains("junk"));
}

#[tokio::test]
async fn invalid_collections_fail_before_any_backend_call() {
    let store = test_store().await;
    let baseline = store.client().calls();

    for collection in ["", "  ", "a:b"] {
        let err = store
            .create_documents(collection, vec![doc(json!({ "x": 1 }))])
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{collection:?}: {err}");

        assert!(store.read_documents(collection, &ReadQuery::new()).await.unwrap_err().is_validation());
        assert!(
            store
                .update_documents(collection, &Filter::all(), &UpdateExpr::new(), true)
                .await
                .unwrap_err()
                .is_validation()
        );
        assert!(store.delete_documents(collection, &Filter::all()).await.unwrap_err().is_validation());
    }

    assert_eq!(store.client().calls(), baseline);
}

#[tokio::test]
async fn create_stops_at_first_failure_keeping_earlier_documents() {
    let store = test_store().await;
    store.client().fail_sets_ending_with(Some(":bad"));

    let err = store
        .create_documents(
            "items",
            vec![
                doc(json!({ "internal_id": "a" })),
                doc(json!({ "internal_id": "bad" })),
                doc(json!({ "internal_id": "c" })),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Backend(_)));

    store.client().fail_sets_ending_with(None);
    let ids: Vec<String> = read_all(&store, "items")
        .await
        .iter()
        .filter_map(|d| d.internal_id().map(str::to_string))
        .collect();
    assert_eq!(ids, vec!["a"]);
}

#[tokio::test]
async fn update_skips_documents_that_fail_to_write() {
    let store = test_store().await;
    store
        .create_documents(
            "items",
            vec![
                doc(json!({ "internal_id": "a" })),
                doc(json!({ "internal_id": "bad" })),
                doc(json!({ "internal_id": "c" })),
            ],
        )
        .await
        .unwrap();
    store.client().fail_sets_ending_with(Some(":bad"));

    let modified = store
        .update_documents("items", &Filter::all(), &UpdateExpr::new().set("seen", true), false)
        .await
        .unwrap();
    assert_eq!(modified, 2);

    let seen = store
        .read_documents(
            "items",
            &ReadQuery::builder().filter(Filter::literal("seen", true)).build(),
        )
        .await
        .unwrap();
    assert_eq!(seen.total, 2);
    assert!(seen.items.iter().all(|d| d.internal_id() != Some("bad")));
}

#[tokio::test(start_paused = true)]
async fn slow_backend_calls_time_out() {
    let store = KvDocumentStore::builder(TestKv::default())
        .timeout(Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    store.client().stall_hgetall.store(true, Ordering::SeqCst);

    let err = store
        .read_documents("users", &ReadQuery::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Timeout(d) if d == Duration::from_millis(50)));
}

/// Updates are read-modify-write without locking: two concurrent increments
/// that both read before either writes lose one increment.
#[tokio::test]
async fn concurrent_updates_to_one_document_are_last_writer_wins() {
    let store = test_store().await;
    store
        .create_documents("counters", vec![doc(json!({ "internal_id": "c1", "hits": 10 }))])
        .await
        .unwrap();

    store.client().gate_gets(2);

    let inc = UpdateExpr::new().inc("hits", 1);
    let all = Filter::all();
    let (first, second) = tokio::join!(
        store.update_documents("counters", &all, &inc, false),
        store.update_documents("counters", &all, &inc, false),
    );
    assert_eq!(first.unwrap(), 1);
    assert_eq!(second.unwrap(), 1);

    let docs = read_all(&store, "counters").await;
    assert_eq!(docs[0]["hits"], json!(11));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_get_unique_timestamps() {
    let store = memory_store().await;

    let tasks: Vec<_> = (0..8)
        .map(|task| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .create_documents("events", (0..25).map(|n| doc(json!({ "task": task, "n": n }))).collect())
                    .await
                    .unwrap()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().len(), 25);
    }

    let stamps: HashSet<i64> = read_all(&store, "events")
        .await
        .iter()
        .map(|d| d[CR_TIME].as_i64().unwrap())
        .collect();
    assert_eq!(stamps.len(), 200);
}

#[tokio::test]
async fn out_of_range_ttl_is_rejected_without_storing() {
    let store = memory_store().await;

    let err = store
        .create_documents("sessions", vec![doc(json!({ "ttl": 1e19, "a": 1 }))])
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(read_all(&store, "sessions").await.is_empty());
    assert!(index_members(&store, "sessions").await.is_empty());
}

#[tokio::test]
async fn create_removes_record_when_indexing_fails() {
    let store = test_store().await;
    store.client().fail_hsets(true);

    let err = store
        .create_documents("items", vec![doc(json!({ "internal_id": "y" }))])
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Backend(_)));

    assert!(matches!(
        store.client().get(&document_key("items", "y")).await,
        Err(DocumentStoreError::NotFound(_))
    ));

    let scanned = KvDocumentStore::builder(store.client().inner.clone())
        .candidate_source(CandidateSource::KeyScan)
        .build()
        .await
        .unwrap();
    assert!(read_all(&scanned, "items").await.is_empty());
}

#[tokio::test]
async fn update_counts_written_documents_when_index_refresh_fails() {
    let store = test_store().await;
    store
        .create_documents("items", vec![doc(json!({ "internal_id": "x", "n": 1 }))])
        .await
        .unwrap();
    store.client().fail_hsets(true);

    let modified = store
        .update_documents("items", &Filter::all(), &UpdateExpr::new().set("n", 2), false)
        .await
        .unwrap();
    assert_eq!(modified, 1);

    store.client().fail_hsets(false);
    let docs = read_all(&store, "items").await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["n"], 2);
}

#[tokio::test]
async fn delete_skips_documents_that_fail_to_remove() {
    let store = test_store().await;
    store
        .create_documents(
            "items",
            vec![
                doc(json!({ "internal_id": "a" })),
                doc(json!({ "internal_id": "bad" })),
                doc(json!({ "internal_id": "c" })),
            ],
        )
        .await
        .unwrap();
    store.client().fail_deletes_ending_with(Some(":bad"));

    let deleted = store.delete_documents("items", &Filter::all()).await.unwrap();
    assert_eq!(deleted, 2);

    store.client().fail_deletes_ending_with(None);
    let remaining: Vec<String> = read_all(&store, "items")
        .await
        .iter()
        .filter_map(|d| d.internal_id().map(str::to_string))
        .collect();
    assert_eq!(remaining, vec!["bad"]);
    assert_eq!(index_members(&store, "items").await, HashSet::from(["bad".to_string()]));
}

#[tokio::test(start_paused = true)]
async fn upsert_drops_ttl_without_expiring() {
    let store = memory_store().await;

    let modified = store
        .update_documents(
            "sessions",
            &Filter::literal("user", "a"),
            &UpdateExpr::new().set("user", "a").set("ttl", 10),
            true,
        )
        .await
        .unwrap();
    assert_eq!(modified, 1);

    tokio::time::advance(Duration::from_secs(20)).await;

    let docs = read_all(&store, "sessions").await;
    assert_eq!(docs.len(), 1);
    assert!(!docs[0].contains_key("ttl"));
}
