use store::Category;

mod common;

use common::spawn_backend;

fn category(id: i64, name: &str) -> Category {
    Category {
        id,
        name: name.to_string(),
        user_id: 1,
    }
}

#[tokio::test]
async fn fetch_all_replaces_collection() {
    let harness = spawn_backend().await;
    harness.seed_category(3, "Comida");
    harness.seed_category(4, "Renta");
    let (stores, _) = harness.logged_in().await;

    assert!(stores.categories.fetch_all().await);
    assert_eq!(
        stores.categories.categories(),
        vec![category(3, "Comida"), category(4, "Renta")]
    );
    assert!(!stores.categories.is_loading());
}

#[tokio::test]
async fn fetch_for_user_sends_owner_filter() {
    let harness = spawn_backend().await;
    let (stores, _) = harness.logged_in().await;

    assert!(stores.categories.fetch_for_user(1).await);
    assert_eq!(harness.last_request().query.as_deref(), Some("user_id=1"));
}

#[tokio::test]
async fn add_with_blank_name_is_rejected_without_request() {
    let harness = spawn_backend().await;
    let (stores, _) = harness.logged_in().await;
    let hits = harness.hits();

    assert!(!stores.categories.add("").await);
    assert!(!stores.categories.add("   ").await);

    assert_eq!(harness.hits(), hits);
    assert!(stores.categories.categories().is_empty());
    assert_eq!(
        stores.categories.error().as_deref(),
        Some("name must not be empty")
    );
}

#[tokio::test]
async fn add_sends_trimmed_name_and_appends() {
    let harness = spawn_backend().await;
    let (stores, _) = harness.logged_in().await;

    assert!(stores.categories.add("  Transporte ").await);

    assert_eq!(harness.last_request().body.unwrap()["name"], "Transporte");
    let categories = stores.categories.categories();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Transporte");
    assert_eq!(stores.categories.error(), None);
}

#[tokio::test]
async fn duplicates_are_judged_by_the_backend() {
    let harness = spawn_backend().await;
    harness.seed_category(3, "Comida");
    let (stores, _) = harness.logged_in().await;
    assert!(stores.categories.fetch_all().await);
    let hits = harness.hits();

    assert!(!stores.categories.add("Comida").await);

    // The request was sent even though the name is in the local cache.
    assert_eq!(harness.hits(), hits + 1);
    assert_eq!(
        stores.categories.error().as_deref(),
        Some("The name has already been taken.")
    );
    assert_eq!(stores.categories.categories(), vec![category(3, "Comida")]);
}

#[tokio::test]
async fn rename_updates_in_place_and_leaves_editing_mode() {
    let harness = spawn_backend().await;
    harness.seed_category(3, "Comida");
    harness.seed_category(4, "Renta");
    let (stores, _) = harness.logged_in().await;
    assert!(stores.categories.fetch_all().await);

    stores.categories.start_editing(3);
    assert_eq!(stores.categories.editing(), Some(3));
    assert!(stores.categories.rename(3, "Food").await);

    assert_eq!(
        stores.categories.categories(),
        vec![category(3, "Food"), category(4, "Renta")]
    );
    assert_eq!(stores.categories.editing(), None);
    assert_eq!(harness.last_request().path, "/categories/3");
}

#[tokio::test]
async fn failed_rename_keeps_collection_and_editing_mode() {
    let harness = spawn_backend().await;
    harness.seed_category(3, "Comida");
    harness.seed_category(4, "Renta");
    let (stores, _) = harness.logged_in().await;
    assert!(stores.categories.fetch_all().await);

    stores.categories.start_editing(3);
    assert!(!stores.categories.rename(3, "Renta").await);

    assert_eq!(
        stores.categories.categories(),
        vec![category(3, "Comida"), category(4, "Renta")]
    );
    assert_eq!(stores.categories.editing(), Some(3));
    assert!(stores.categories.error().is_some());

    stores.categories.cancel_editing();
    assert_eq!(stores.categories.editing(), None);
}

#[tokio::test]
async fn delete_filters_by_id() {
    let harness = spawn_backend().await;
    harness.seed_category(3, "Comida");
    harness.seed_category(4, "Renta");
    let (stores, _) = harness.logged_in().await;
    assert!(stores.categories.fetch_all().await);

    assert!(stores.categories.delete(3).await);
    assert_eq!(stores.categories.categories(), vec![category(4, "Renta")]);

    // Unknown id: backend answers 404, nothing changes locally.
    assert!(!stores.categories.delete(99).await);
    assert_eq!(stores.categories.categories(), vec![category(4, "Renta")]);
    assert_eq!(
        stores.categories.error().as_deref(),
        Some("request failed with status 404")
    );
}

#[tokio::test]
async fn categories_survive_restart() {
    let harness = spawn_backend().await;
    harness.seed_category(3, "Comida");
    let (stores, storage) = harness.logged_in().await;
    assert!(stores.categories.fetch_all().await);
    drop(stores);

    let restored = harness.stores(storage);
    assert_eq!(restored.categories.categories(), vec![category(3, "Comida")]);
    assert_eq!(restored.categories.get(3), Some(category(3, "Comida")));
}

#[tokio::test]
async fn next_action_clears_previous_error() {
    let harness = spawn_backend().await;
    let (stores, _) = harness.logged_in().await;

    assert!(!stores.categories.add("").await);
    assert!(stores.categories.error().is_some());
    assert!(stores.categories.add("Otros").await);
    assert_eq!(stores.categories.error(), None);

    assert!(!stores.categories.add(" ").await);
    stores.categories.clear_error();
    assert_eq!(stores.categories.error(), None);
}
