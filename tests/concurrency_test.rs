//! Contention behavior on the redemption hot path.
//!
//! The invariant under test: however many redemptions race, each code is
//! issued at most once and successes stop exactly when the inventory runs
//! out.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{TestApp, SUMMER_SALE_BATCH, TEST_CLIENT_ID};
use tokio::task::JoinSet;
use uuid::Uuid;

#[tokio::test]
async fn concurrent_redemptions_issue_each_code_at_most_once() {
    let app = Arc::new(TestApp::spawn().await);
    app.seed_summer_sale().await; // 100 unassigned codes

    let total_requests = 1_000;
    let concurrency = 100;

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for _ in 0..total_requests {
        let app = app.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire().await.unwrap();
            // Every request is a distinct customer, so the per-customer rule
            // never interferes with the inventory race.
            let customer = Uuid::new_v4().to_string();
            let response = app.redeem(SUMMER_SALE_BATCH, TEST_CLIENT_ID, &customer).await;
            let status = response.status().as_u16();
            let body: serde_json::Value = response.json().await.unwrap();
            (status, body)
        });
    }

    let mut codes = HashSet::new();
    let mut successes = 0;
    let mut no_code = 0;

    while let Some(result) = tasks.join_next().await {
        let (status, body) = result.unwrap();
        match status {
            200 => {
                successes += 1;
                let code = body["code"].as_str().expect("code missing").to_string();
                assert!(codes.insert(code), "a code was issued twice");
            }
            404 => no_code += 1,
            other => panic!("unexpected status {other}: {body}"),
        }
    }

    assert_eq!(successes, 100);
    assert_eq!(no_code, 900);
    assert_eq!(codes.len(), 100);

    // Database state agrees: every code assigned, one audit row each.
    let batch_id = Uuid::parse_str(SUMMER_SALE_BATCH).unwrap();
    let assigned: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM codes WHERE batch_id = $1 AND customer_id IS NOT NULL",
    )
    .bind(batch_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(assigned, 100);

    let usage: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM code_usage WHERE batch_id = $1")
        .bind(batch_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(usage, 100);

    let distinct_usage: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT code) FROM code_usage WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(distinct_usage, 100);
}
