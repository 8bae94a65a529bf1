use pricewatch_core::classify::{
    ComplianceStatus, NewCheckReport, NewViolation, Severity, ViolationStatus,
    VIOLATION_TYPE_PRICE_EXCEEDED, build_report, classify,
};

use super::common::{seed_scraped, seed_site, setup_test_db};

#[tokio::test]
async fn test_report_upsert_updates_in_place() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let regulated = db
        .catalog_repo()
        .create_product("Basmati Rice 5kg", "Grains", 1000.0, "5kg")
        .await
        .unwrap();
    let scraped = seed_scraped(&db, site.id, "Basmati Rice 5kg Premium", 1500.0).await;
    let repo = db.violation_repo();

    let assessment = classify(&regulated, scraped.listed_price);
    let report = build_report(&regulated, &scraped, &assessment);
    let first_id = repo.upsert_report(&report).await.unwrap();

    // Re-check the same pair with a different outcome
    let recheck = classify(&regulated, 1050.0);
    let updated = build_report(&regulated, &scraped, &recheck);
    let second_id = repo.upsert_report(&updated).await.unwrap();

    assert_eq!(first_id, second_id);

    let reports = repo.list_reports(10).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].has_violation);
    assert_eq!(reports[0].compliance_status, ComplianceStatus::Ok);
}

#[tokio::test]
async fn test_no_match_report_is_unique_per_listing() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let scraped = seed_scraped(&db, site.id, "Mystery Gadget", 99.0).await;
    let repo = db.violation_repo();

    let first = repo
        .upsert_report(&NewCheckReport::no_match(&scraped))
        .await
        .unwrap();
    let second = repo
        .upsert_report(&NewCheckReport::no_match(&scraped))
        .await
        .unwrap();
    assert_eq!(first, second);

    let reports = repo.list_reports(10).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].compliance_status, ComplianceStatus::NoMatch);
    assert!(reports[0].regulated_product_id.is_none());
}

#[tokio::test]
async fn test_create_find_and_link_violation() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let regulated = db
        .catalog_repo()
        .create_product("Cooking Oil 1L", "Oils", 500.0, "1L")
        .await
        .unwrap();
    let scraped = seed_scraped(&db, site.id, "Cooking Oil 1L", 1200.0).await;
    let repo = db.violation_repo();

    assert!(
        repo.find_pending_violation(regulated.id, scraped.id)
            .await
            .unwrap()
            .is_none()
    );

    let assessment = classify(&regulated, scraped.listed_price);
    let report_id = repo
        .upsert_report(&build_report(&regulated, &scraped, &assessment))
        .await
        .unwrap();

    let violation = repo
        .create_violation(&NewViolation {
            regulated_product_id: regulated.id,
            scraped_product_id: scraped.id,
            violation_type: VIOLATION_TYPE_PRICE_EXCEEDED.to_string(),
            severity: assessment.severity.unwrap(),
            proposed_penalty: assessment.proposed_penalty.unwrap(),
            notes: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(violation.status, ViolationStatus::Pending);
    assert_eq!(violation.severity, Severity::Critical);

    repo.link_report(report_id, violation.id).await.unwrap();
    let reports = repo.list_reports(10).await.unwrap();
    assert_eq!(reports[0].violation_id, Some(violation.id));

    let found = repo
        .find_pending_violation(regulated.id, scraped.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, violation.id);

    // A second pending violation for the same pair is rejected by the
    // database.
    let dup = repo
        .create_violation(&NewViolation {
            regulated_product_id: regulated.id,
            scraped_product_id: scraped.id,
            violation_type: VIOLATION_TYPE_PRICE_EXCEEDED.to_string(),
            severity: Severity::Low,
            proposed_penalty: 100.0,
            notes: String::new(),
        })
        .await;
    assert!(dup.is_err());
}

#[tokio::test]
async fn test_confirm_and_dismiss_transitions() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let regulated = db
        .catalog_repo()
        .create_product("Sugar 1kg", "Grains", 150.0, "1kg")
        .await
        .unwrap();
    let scraped = seed_scraped(&db, site.id, "Sugar 1kg", 250.0).await;
    let repo = db.violation_repo();

    let violation = repo
        .create_violation(&NewViolation {
            regulated_product_id: regulated.id,
            scraped_product_id: scraped.id,
            violation_type: VIOLATION_TYPE_PRICE_EXCEEDED.to_string(),
            severity: Severity::High,
            proposed_penalty: 1000.0,
            notes: String::new(),
        })
        .await
        .unwrap();

    let confirmed = repo.confirm(violation.id).await.unwrap();
    assert_eq!(confirmed.status, ViolationStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());

    // Already confirmed; neither transition applies any more
    assert!(repo.confirm(violation.id).await.is_err());
    assert!(repo.dismiss(violation.id).await.is_err());
}

#[tokio::test]
async fn test_stats_rollup() {
    let (db, _container) = setup_test_db().await;
    let site = seed_site(&db, "Example Shop").await;
    let repo = db.violation_repo();

    let mut ids = Vec::new();
    for (i, name) in ["Rice", "Oil", "Sugar"].iter().enumerate() {
        let regulated = db
            .catalog_repo()
            .create_product(name, "Staples", 100.0, "unit")
            .await
            .unwrap();
        let scraped = seed_scraped(&db, site.id, name, 300.0).await;
        let violation = repo
            .create_violation(&NewViolation {
                regulated_product_id: regulated.id,
                scraped_product_id: scraped.id,
                violation_type: VIOLATION_TYPE_PRICE_EXCEEDED.to_string(),
                severity: Severity::Critical,
                proposed_penalty: 2000.0,
                notes: format!("case {i}"),
            })
            .await
            .unwrap();
        ids.push(violation.id);
    }

    repo.confirm(ids[0]).await.unwrap();
    repo.dismiss(ids[1]).await.unwrap();

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.confirmed, 1);
    assert_eq!(stats.dismissed, 1);
    // Dismissed penalties drop out of the rollup
    assert!((stats.total_proposed_penalty - 4000.0).abs() < f64::EPSILON);
}
