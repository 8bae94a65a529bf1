use super::common::{sample_site, seed_site, setup_test_db};

#[tokio::test]
async fn test_create_and_list_active_products() {
    let (db, _container) = setup_test_db().await;
    let repo = db.catalog_repo();

    let rice = repo
        .create_product("Basmati Rice 5kg", "Grains", 1200.0, "5kg bag")
        .await
        .unwrap();
    assert_eq!(rice.name, "Basmati Rice 5kg");
    assert!((rice.gov_price - 1200.0).abs() < f64::EPSILON);
    assert!(rice.is_active);

    repo.create_product("Cooking Oil 1L", "Oils", 550.0, "1L bottle")
        .await
        .unwrap();

    let active = repo.list_active().await.unwrap();
    assert_eq!(active.len(), 2);
    // Name order
    assert_eq!(active[0].name, "Basmati Rice 5kg");
    assert_eq!(active[1].name, "Cooking Oil 1L");

    let fetched = repo.get_product(rice.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, rice.id);
}

#[tokio::test]
async fn test_product_names_unique_case_insensitively() {
    let (db, _container) = setup_test_db().await;
    let repo = db.catalog_repo();

    repo.create_product("Sugar 1kg", "Grains", 150.0, "1kg")
        .await
        .unwrap();
    let dup = repo.create_product("SUGAR 1KG", "Grains", 150.0, "1kg").await;
    assert!(dup.is_err());
}

#[tokio::test]
async fn test_term_list_roundtrip() {
    let (db, _container) = setup_test_db().await;
    let repo = db.catalog_repo();

    let terms = vec!["basmati rice".to_string(), "cooking oil".to_string()];
    let list = repo.create_term_list("Staples", &terms).await.unwrap();
    assert_eq!(list.terms, terms);

    let fetched = repo.get_term_list(list.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Staples");
    assert_eq!(fetched.terms, terms);
}

#[tokio::test]
async fn test_site_config_roundtrips_through_jsonb() {
    let (db, _container) = setup_test_db().await;

    let created = seed_site(&db, "Example Shop").await;
    let fetched = db.site_repo().get(created.id).await.unwrap().unwrap();

    assert_eq!(fetched.name, "Example Shop");
    assert_eq!(fetched.selectors.container, ".product");
    assert_eq!(fetched.selectors.price, ".price");
    assert_eq!(
        fetched.headers.get("Accept-Language").map(String::as_str),
        Some("en-US")
    );
    assert!(fetched.fallback_to_browser);
    assert!(fetched.browser.headless);
    assert_eq!(fetched.browser.wait_selector, "body");
}

#[tokio::test]
async fn test_list_active_sites_skips_inactive() {
    let (db, _container) = setup_test_db().await;
    let repo = db.site_repo();

    seed_site(&db, "Active Shop").await;
    let mut inactive = sample_site("Dormant Shop");
    inactive.is_active = false;
    repo.create(&inactive).await.unwrap();

    let active = repo.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Active Shop");
}
