use crate::suite::fakes::{envelope, Env, START_MILLIS};
use pyref_index::SymbolCategory;
use pyref_workspace::{CategoryState, RefreshMode, SyncStats, Workspace};
use serde_json::json;
use std::time::Duration;

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

#[test]
fn workspace_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Workspace>();
}

#[test]
fn cold_start_recomputes_every_category() -> anyhow::Result<()> {
    let env = Env::new();
    let mut ws = env.open();
    assert!(ws.query().is_empty());

    let report = ws.refresh(RefreshMode::Startup);

    assert!(!report.is_degraded(), "{report:?}");
    assert_eq!(report.builtins.state, CategoryState::Recomputed);
    assert_eq!(report.builtins.written_at_millis, Some(START_MILLIS));
    assert_eq!(report.installed.state, CategoryState::Recomputed);
    assert_eq!(report.remote.state, CategoryState::Recomputed);
    assert_eq!(
        report.sync,
        Some(SyncStats {
            inspected: 2,
            carried_over: 0,
            dropped: 0
        })
    );
    // `requests` is on the default exclusion list.
    assert_eq!(sorted(env.inspector.take_calls()), vec!["json", "numpy"]);

    for file in ["builtins.json", "installed_index.json", "remote_index.json"] {
        assert!(env.record_path(file).is_file(), "{file} missing");
    }

    let hits: Vec<String> = ws
        .query()
        .search("json")?
        .iter()
        .map(ToString::to_string)
        .collect();
    for expected in ["installed:json", "installed:json.json_fn", "remote:jsonschema"] {
        assert!(hits.iter().any(|hit| hit == expected), "{expected} not in {hits:?}");
    }
    assert!(ws.query().search("  ").is_err());
    Ok(())
}

#[test]
fn warm_restart_reuses_fresh_records() -> anyhow::Result<()> {
    let env = Env::new();
    env.open().refresh(RefreshMode::Startup);
    env.inspector.take_calls();
    let installed_before = std::fs::read(env.record_path("installed_index.json"))?;

    env.clock.advance(Duration::from_secs(60));
    let mut ws = env.open();
    assert_eq!(ws.installed().len(), 2, "records are published on open");

    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.builtins.state, CategoryState::CachedFresh);
    assert_eq!(report.builtins.written_at_millis, Some(START_MILLIS));
    assert_eq!(report.remote.state, CategoryState::CachedFresh);
    assert_eq!(report.installed.state, CategoryState::Unchanged);
    assert_eq!(report.installed.written_at_millis, Some(START_MILLIS));
    assert!(env.inspector.take_calls().is_empty());
    assert_eq!(env.builtins.calls(), 1);
    assert_eq!(env.remote.requests().len(), 1);

    let installed_after = std::fs::read(env.record_path("installed_index.json"))?;
    assert_eq!(installed_before, installed_after);
    Ok(())
}

#[test]
fn only_new_packages_are_inspected() {
    let env = Env::new();
    env.lister.set(&["json", "numpy"]);
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);
    env.inspector.take_calls();

    env.lister.set(&["numpy", "attrs"]);
    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(env.inspector.take_calls(), vec!["attrs"]);
    assert_eq!(
        report.sync,
        Some(SyncStats {
            inspected: 1,
            carried_over: 1,
            dropped: 1
        })
    );
    assert_eq!(report.installed.state, CategoryState::Recomputed);
    assert_eq!(
        ws.installed().names().collect::<Vec<_>>(),
        vec!["attrs", "numpy"]
    );
    assert!(ws.query().search("json_fn").unwrap().is_empty());
}

#[test]
fn stale_installed_record_forces_full_reinspection() {
    let mut env = Env::new();
    env.config.cache.ttl.installed_index_secs = Some(3600);
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);
    env.inspector.take_calls();

    env.clock.advance(Duration::from_secs(3600));
    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(sorted(env.inspector.take_calls()), vec!["json", "numpy"]);
    assert_eq!(report.installed.state, CategoryState::Recomputed);
    assert_eq!(
        report.installed.written_at_millis,
        Some(START_MILLIS + 3_600_000)
    );
    assert_eq!(report.builtins.state, CategoryState::CachedFresh);
}

#[test]
fn force_ignores_every_ttl() {
    let env = Env::new();
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);
    env.inspector.take_calls();

    let report = ws.refresh(RefreshMode::Force);

    assert_eq!(report.builtins.state, CategoryState::Recomputed);
    assert_eq!(report.installed.state, CategoryState::Recomputed);
    assert_eq!(report.remote.state, CategoryState::Recomputed);
    assert_eq!(env.inspector.take_calls().len(), 2);
    assert_eq!(env.builtins.calls(), 2);
    assert_eq!(env.remote.requests().len(), 2);
}

#[test]
fn corrupt_record_is_removed_and_recomputed() {
    let env = Env::new();
    env.open().refresh(RefreshMode::Startup);
    let path = env.record_path("builtins.json");
    std::fs::write(&path, b"{\"schema_version\": 1, \"categ").unwrap();

    let mut ws = env.open();
    assert!(ws.builtins().is_empty());
    assert!(!path.exists(), "corrupt record should be deleted");

    let report = ws.refresh(RefreshMode::Startup);
    assert_eq!(report.builtins.state, CategoryState::Recomputed);
    assert_eq!(env.builtins.calls(), 2);
    assert!(path.is_file());
    assert!(ws.builtins().contains("print"));
}

#[test]
fn listing_failure_keeps_previous_index() {
    let env = Env::new();
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);

    env.lister.break_listing();
    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.installed.state, CategoryState::Degraded);
    assert_eq!(report.installed.written_at_millis, Some(START_MILLIS));
    let error = report.installed.error.as_deref().unwrap_or_default();
    assert!(error.contains("pip: command not found"), "{error}");
    assert!(report.sync.is_none());
    assert!(report.is_degraded());
    assert_eq!(ws.installed().len(), 2);
}

#[test]
fn listing_failure_without_cache_is_unavailable() {
    let env = Env::new();
    env.lister.break_listing();
    let mut ws = env.open();

    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.installed.state, CategoryState::Unavailable);
    assert_eq!(report.installed.written_at_millis, None);
    assert_eq!(report.builtins.state, CategoryState::Recomputed);
    assert!(ws.installed().is_empty());
    assert!(!ws.query().list(SymbolCategory::Builtin).is_empty());
}

#[test]
fn stale_builtins_are_served_when_recomputation_fails() {
    let mut env = Env::new();
    env.config.cache.ttl.builtins_secs = Some(10);
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);

    env.clock.advance(Duration::from_secs(20));
    env.builtins.break_listing();
    let report = ws.refresh(RefreshMode::Startup);

    assert_eq!(report.builtins.state, CategoryState::Degraded);
    assert_eq!(report.builtins.written_at_millis, Some(START_MILLIS));
    assert!(ws.builtins().contains("print"));
}

#[test]
fn configured_exclusions_apply() {
    let mut env = Env::new();
    env.config.index.extra_excluded_packages = vec!["NumPy".into()];
    let mut ws = env.open();

    ws.refresh(RefreshMode::Startup);

    assert_eq!(ws.installed().names().collect::<Vec<_>>(), vec!["json"]);
    assert_eq!(env.inspector.take_calls(), vec!["json"]);
}

#[test]
fn unimportable_package_is_indexed_with_placeholder() {
    let env = Env::new();
    env.lister.set(&["broken-pkg", "numpy"]);
    let mut ws = env.open();

    ws.refresh(RefreshMode::Startup);

    let entry = ws.installed().get("broken-pkg").expect("placeholder entry");
    assert!(!entry.importable);
    assert_eq!(entry.member_count(), 0);
    assert!(entry.doc.contains("missing shared library"), "{}", entry.doc);
}

#[test]
fn clear_cache_unpublishes_everything() -> anyhow::Result<()> {
    let env = Env::new();
    let mut ws = env.open();
    ws.refresh(RefreshMode::Startup);
    assert_eq!(ws.cache_status().records.len(), 3);

    let removed = ws.clear_cache()?;

    assert_eq!(removed, 3);
    assert!(ws.query().is_empty());
    let status = ws.cache_status();
    assert!(status.records.is_empty());
    assert_eq!(status.remote_details, 0);
    Ok(())
}

#[test]
fn records_on_disk_are_published_regardless_of_age() {
    let env = Env::new();
    std::fs::create_dir_all(env.record_path("")).unwrap();
    std::fs::write(
        env.record_path("builtins.json"),
        envelope(json!({ "kind": "builtins" }), 0, json!(["len", "print"])),
    )
    .unwrap();

    let mut ws = env.open();
    assert!(ws.builtins().contains("print"));
    assert_eq!(env.builtins.calls(), 0);

    let report = ws.refresh(RefreshMode::Startup);
    assert_eq!(report.builtins.state, CategoryState::Recomputed);
    assert!(ws.builtins().contains("None"));
}

#[test]
fn unwritable_records_are_reported_but_still_served() -> anyhow::Result<()> {
    let env = Env::new();
    for file in ["installed_index.json", "remote_index.json"] {
        std::fs::create_dir_all(env.record_path(file).join("occupied"))?;
    }
    let mut ws = env.open();

    let report = ws.refresh(RefreshMode::Startup);

    for status in [&report.installed, &report.remote] {
        assert_eq!(status.state, CategoryState::Recomputed);
        assert_eq!(status.written_at_millis, None);
        let error = status.error.as_deref().unwrap_or_default();
        assert!(error.contains("not saved"), "{error}");
    }
    assert_eq!(report.builtins.error, None);
    assert_eq!(report.builtins.written_at_millis, Some(START_MILLIS));

    let hits: Vec<String> = ws
        .query()
        .search("json")?
        .iter()
        .map(ToString::to_string)
        .collect();
    assert!(hits.contains(&"installed:json".to_string()), "{hits:?}");
    assert!(hits.contains(&"remote:jsonschema".to_string()), "{hits:?}");
    Ok(())
}
