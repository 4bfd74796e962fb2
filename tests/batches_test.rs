//! Batch listing integration tests.

mod common;

use common::{TestApp, EXPIRED_BATCH, SUMMER_SALE_BATCH};

#[tokio::test]
async fn list_batches_excludes_expired_batches() {
    let app = TestApp::spawn().await;
    app.seed_summer_sale().await;
    app.seed_batch(EXPIRED_BATCH, "Expired Batch", None, true).await;

    let response = app
        .client
        .get(format!("{}/api/v1/batches", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let batches: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(batches.len(), 1);

    let batch = &batches[0];
    assert_eq!(batch["id"], SUMMER_SALE_BATCH);
    assert_eq!(batch["name"], "Summer Sale");
    assert_eq!(batch["expired"], false);
    assert_eq!(batch["rules"]["maxpercustomer"], 1);
    assert_eq!(batch["rules"]["timelimit"], 30);
}

#[tokio::test]
async fn list_batches_returns_the_rules_document_verbatim() {
    let app = TestApp::spawn().await;
    app.seed_batch(
        SUMMER_SALE_BATCH,
        "Summer Sale",
        Some(serde_json::json!({
            "maxpercustomer": 1,
            "timelimit": 30,
            "tier": "gold"
        })),
        false,
    )
    .await;

    let response = app
        .client
        .get(format!("{}/api/v1/batches", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let batches: Vec<serde_json::Value> = response.json().await.unwrap();
    // Unrecognized rule options survive storage and listing untouched.
    assert_eq!(batches[0]["rules"]["tier"], "gold");
}

#[tokio::test]
async fn list_batches_reports_null_rules_as_null() {
    let app = TestApp::spawn().await;
    app.seed_batch(SUMMER_SALE_BATCH, "Unrestricted", None, false)
        .await;

    let response = app
        .client
        .get(format!("{}/api/v1/batches", app.address))
        .send()
        .await
        .unwrap();

    let batches: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(batches[0]["rules"].is_null());
}
