use crate::suite::fakes::{Env, START_MILLIS};
use pyref_remote::RequestKind;
use pyref_workspace::{CategoryState, RefreshMode};
use std::time::Duration;

#[test]
fn offline_refresh_serves_cached_listing() {
    let mut env = Env::new();
    env.config.cache.ttl.remote_index_secs = Some(60);
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);

    env.clock.advance(Duration::from_secs(61));
    env.remote.set_offline(true);
    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.remote.state, CategoryState::Degraded);
    assert_eq!(report.remote.written_at_millis, Some(START_MILLIS));
    let error = report.remote.error.as_deref().unwrap_or_default();
    assert!(error.contains("connection refused"), "{error}");
    assert!(ws.remote_index().contains("numpy"));
}

#[test]
fn offline_cold_start_is_unavailable_but_local_data_works() {
    let env = Env::new();
    env.remote.set_offline(true);
    let mut ws = env.open();

    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.remote.state, CategoryState::Unavailable);
    assert_eq!(report.remote.written_at_millis, None);
    assert_eq!(report.installed.state, CategoryState::Recomputed);
    assert!(ws.remote_index().is_empty());
    assert!(!env.record_path("remote_index.json").exists());
    assert!(!ws.query().search("numpy").unwrap().is_empty());
}

#[test]
fn stale_listing_is_replaced() {
    let mut env = Env::new();
    env.config.cache.ttl.remote_index_secs = Some(60);
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);

    env.clock.advance(Duration::from_secs(60));
    env.remote.set_projects(&["pandas"]);
    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.remote.state, CategoryState::Recomputed);
    assert_eq!(report.remote.written_at_millis, Some(START_MILLIS + 60_000));
    assert!(ws.remote_index().contains("pandas"));
    assert!(!ws.remote_index().contains("numpy"));
}

#[test]
fn disabled_remote_makes_no_requests() {
    let mut env = Env::new();
    env.config.remote.enabled = false;
    let mut ws = env.open();

    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.remote.state, CategoryState::Unavailable);
    assert_eq!(
        report.remote.error.as_deref(),
        Some("remote access is disabled")
    );
    assert_eq!(ws.fetch_detail("numpy"), None);
    assert!(env.remote.requests().is_empty());
}

#[test]
fn detail_is_fetched_lazily_and_cached() {
    let env = Env::new();
    let ws = env.open();
    assert!(ws.cached_detail("numpy").is_none());

    let first = ws.fetch_detail("numpy").expect("detail");
    let second = ws.fetch_detail("numpy").expect("cached detail");
    assert_eq!(first, second);
    assert_eq!(first.version.as_deref(), Some("1.0.0"));

    // A second process sees the cached record without another request.
    let reopened = env.open();
    assert_eq!(reopened.fetch_detail("numpy"), Some(first));
    assert_eq!(
        env.remote.requests(),
        vec![("/pypi/numpy/json".to_string(), RequestKind::Detail)]
    );
    assert_eq!(ws.cache_status().remote_details, 1);
}

#[test]
fn failed_detail_is_retried() {
    let env = Env::new();
    let ws = env.open();

    env.remote.set_offline(true);
    assert_eq!(ws.fetch_detail("numpy"), None);
    assert!(ws.cached_detail("numpy").is_none());

    env.remote.set_offline(false);
    assert!(ws.fetch_detail("numpy").is_some());
    assert_eq!(env.remote.requests().len(), 2);
}
