use chrono::{Duration, Utc};
use civic_alerts::{RetentionSweeper, SweepReport};
use civic_common::{AlertType, Identity};
use civic_config::{DatabaseConfig, RetentionConfig};
use civic_db::{DbClient, DedupLedger, ReceiptRepository, Store};

async fn temp_store() -> Store {
    let path = std::env::temp_dir().join(format!("civic_retention_{}.db", uuid::Uuid::new_v4()));
    let client = DbClient::from_config(&DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        max_connections: Some(1),
    })
    .await
    .unwrap();
    let store = Store::new(client);
    store.init_schema().await.unwrap();
    store
}

#[tokio::test]
async fn test_retention_boundaries() {
    let store = temp_store().await;
    let now = Utc::now();
    let user = Identity::user("u1");
    let device = Identity::device("d1");

    store
        .ledger
        .record_triggered_at(&user, AlertType::Weather, "old", "{}", now - Duration::days(8))
        .await
        .unwrap();
    store
        .ledger
        .record_triggered_at(&user, AlertType::Weather, "recent", "{}", now - Duration::days(6))
        .await
        .unwrap();
    store
        .ledger
        .record_triggered_at(&device, AlertType::Digest, "old", "{}", now - Duration::days(8))
        .await
        .unwrap();

    store
        .receipts
        .insert_pending("pending-30d", &user, "ExponentPushToken[a]", now - Duration::days(30))
        .await
        .unwrap();
    store
        .receipts
        .insert_pending("ok-8d", &user, "ExponentPushToken[a]", now - Duration::days(8))
        .await
        .unwrap();
    store.receipts.mark_ok("ok-8d", now - Duration::days(8)).await.unwrap();
    store
        .receipts
        .insert_pending("error-8d", &device, "ExponentPushToken[b]", now - Duration::days(8))
        .await
        .unwrap();
    store
        .receipts
        .mark_error("error-8d", "DeviceNotRegistered", None, now - Duration::days(8))
        .await
        .unwrap();

    let sweeper = RetentionSweeper::new(
        store.ledger.clone(),
        store.receipts.clone(),
        &RetentionConfig::default(),
    );
    let report = sweeper.sweep_at(now).await.unwrap();

    assert_eq!(
        report,
        SweepReport {
            triggered_alerts: 1,
            device_triggered_alerts: 1,
            receipts: 2,
        }
    );
    assert!(store
        .ledger
        .has_triggered(&user, AlertType::Weather, "recent")
        .await
        .unwrap());
    assert!(!store
        .ledger
        .has_triggered(&user, AlertType::Weather, "old")
        .await
        .unwrap());
    assert!(store.receipts.find("pending-30d").await.unwrap().is_some());
    assert!(store.receipts.find("ok-8d").await.unwrap().is_none());

    // Idempotent
    assert_eq!(sweeper.sweep_at(now).await.unwrap(), SweepReport::default());
}

#[tokio::test]
async fn test_retention_window_is_configurable() {
    let store = temp_store().await;
    let now = Utc::now();
    store
        .ledger
        .record_triggered_at(&Identity::user("u1"), AlertType::Traffic, "t", "{}", now - Duration::days(3))
        .await
        .unwrap();

    let sweeper = RetentionSweeper::new(
        store.ledger.clone(),
        store.receipts.clone(),
        &RetentionConfig { days: 2 },
    );
    assert_eq!(sweeper.sweep_at(now).await.unwrap().triggered_alerts, 1);
}
