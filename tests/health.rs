use std::sync::Arc;

use axum::extract::State;
use marketplace_escrow::{
    config::EngineConfig, routes::health::health_check, state::AppState, store::InMemoryStore,
};

#[tokio::test]
async fn health_check_reports_store_and_sweeper() {
    let state = AppState::new(Arc::new(InMemoryStore::new()), EngineConfig::default());
    let response = health_check(State(state)).await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.store, "in-memory");
    assert!(data.store_reachable);
    assert_eq!(data.auto_release_days, 7);
    assert_eq!(data.sweep_interval_secs, 3600);
}
