use serde::{Deserialize, Serialize};

use docvault_core::{
    backend::StoreBackendBuilder,
    document::Document,
    query::{Filter, ReadQuery, SortDirection},
    store::{DocumentStore, IntoDynDocumentStore, IntoStaticDocumentStore},
    update::UpdateExpr,
};
use docvault_kv::{InMemoryKv, KvDocumentStore, TimeoutClient};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    internal_id: Option<String>,
    name: String,
    age: i64,
}

impl Document for User {
    fn collection_name() -> &'static str {
        "users"
    }
}

fn user(name: &str, age: i64) -> User {
    User { internal_id: None, name: name.to_string(), age }
}

async fn store() -> DocumentStore<KvDocumentStore<InMemoryKv>> {
    DocumentStore::new(
        KvDocumentStore::builder(InMemoryKv::new())
            .build()
            .await
            .unwrap(),
    )
}

#[tokio::test]
async fn typed_documents_round_trip() {
    let store = store().await;
    let users = store.typed_collection::<User>();
    assert_eq!(users.name(), "users");

    let ids = users
        .create(vec![user("ada", 36), user("bob", 25)])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    let page = users
        .read(&ReadQuery::builder().sort("age", SortDirection::Asc).build())
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].name, "bob");
    assert_eq!(page.items[0].internal_id.as_deref(), Some(ids[1].as_str()));
    assert_eq!(page.items[1], User { internal_id: Some(ids[0].clone()), ..user("ada", 36) });

    let updated = users
        .update(&Filter::literal("name", "bob"), &UpdateExpr::new().inc("age", 1), false)
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let bob = users.find(Filter::literal("name", "bob")).await.unwrap();
    assert_eq!(bob[0].age, 26);

    assert_eq!(users.delete(&Filter::gt("age", 30)).await.unwrap(), 1);
    assert_eq!(users.raw().read(&ReadQuery::new()).await.unwrap().total, 1);
}

#[tokio::test]
async fn dynamic_store_recovers_its_backend() {
    let store = store().await;
    store
        .typed_collection::<User>()
        .create(vec![user("ada", 36)])
        .await
        .unwrap();

    let dynamic = store.into_dyn();
    assert!(dynamic.downcast_backend::<KvDocumentStore<InMemoryKv>>().is_some());
    assert!(
        dynamic
            .downcast_backend::<KvDocumentStore<TimeoutClient<InMemoryKv>>>()
            .is_none()
    );

    let typed = dynamic.typed_collection::<User>().find(Filter::all()).await.unwrap();
    assert_eq!(typed.len(), 1);

    let restored = dynamic
        .into_static::<KvDocumentStore<InMemoryKv>>()
        .unwrap();
    assert_eq!(restored.read("users", &ReadQuery::new()).await.unwrap().total, 1);

    restored.shutdown().await.unwrap();
}
