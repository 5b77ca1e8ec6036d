use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const WRITTEN_AT: u64 = 1_700_000_000_000;

fn pyref() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pyref"))
}

fn write_record(root: &Path, file: &str, category: Value, payload: Value) {
    let envelope = json!({
        "schema_version": 1,
        "category": category,
        "written_at_millis": WRITTEN_AT,
        "payload": payload,
    });
    std::fs::write(root.join(file), serde_json::to_vec(&envelope).unwrap()).unwrap();
}

/// A cache root holding one record per category, plus a config file pointing at it with the
/// network switched off.
struct Fixture {
    dir: tempfile::TempDir,
    config: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(cache.join("remote_details")).unwrap();

        write_record(
            &cache,
            "builtins.json",
            json!({ "kind": "builtins" }),
            json!(["None", "len", "print"]),
        );
        write_record(
            &cache,
            "installed_index.json",
            json!({ "kind": "installed_index" }),
            json!({
                "json": {
                    "name": "json",
                    "functions": ["dump", "dumps", "load", "loads"],
                    "classes": ["JSONDecoder", "JSONEncoder"],
                    "submodules": ["decoder"],
                    "doc": "JSON encoder and decoder.",
                    "importable": true
                }
            }),
        );
        write_record(
            &cache,
            "remote_index.json",
            json!({ "kind": "remote_index" }),
            json!(["jsonschema", "numpy"]),
        );

        let config = dir.path().join("pyref.toml");
        std::fs::write(
            &config,
            format!(
                "[cache]\nroot = {:?}\n\n[remote]\nenabled = false\n",
                cache.display().to_string()
            ),
        )
        .unwrap();

        Self { dir, config }
    }

    fn cmd(&self) -> Command {
        let mut cmd = pyref();
        cmd.current_dir(self.dir.path())
            .env("HOME", self.dir.path())
            .env_remove("PYREF_CONFIG_PATH")
            .env_remove("PYREF_CACHE_DIR")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config);
        cmd
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn help_mentions_core_commands() {
    pyref().arg("--help").assert().success().stdout(
        predicate::str::contains("refresh")
            .and(predicate::str::contains("search"))
            .and(predicate::str::contains("show"))
            .and(predicate::str::contains("detail"))
            .and(predicate::str::contains("cache")),
    );
}

#[test]
fn cached_search_reads_seeded_records() {
    let fixture = Fixture::new();
    let output = fixture
        .cmd()
        .args(["search", "json", "--cached", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let hits = stdout_json(&output);
    let hits: Vec<&str> = hits
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    for expected in ["installed:json", "installed:json.dumps", "remote:jsonschema"] {
        assert!(hits.contains(&expected), "{expected} not in {hits:?}");
    }
    let mut sorted = hits.clone();
    sorted.sort();
    assert_eq!(hits, sorted);
}

#[test]
fn empty_search_is_rejected() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["search", "   ", "--cached"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("empty"));
}

#[test]
fn show_member_and_package() {
    let fixture = Fixture::new();

    let output = fixture
        .cmd()
        .args(["show", "installed:json.dumps", "--cached", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let view = stdout_json(&output);
    assert_eq!(view["symbol"], "installed:json.dumps");
    assert_eq!(view["kind"], "function");

    for (symbol, kind) in [
        ("installed:json.JSONDecoder", "class"),
        ("installed:json.decoder", "submodule"),
    ] {
        let output = fixture
            .cmd()
            .args(["show", symbol, "--cached", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success(), "{output:?}");
        assert_eq!(stdout_json(&output)["kind"], kind, "{symbol}");
    }

    fixture
        .cmd()
        .args(["show", "installed:json", "--cached"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("JSON encoder and decoder.")
                .and(predicate::str::contains("JSONDecoder")),
        );
}

#[test]
fn show_unknown_symbol_exits_one() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["show", "installed:nope", "--cached"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn show_rejects_malformed_symbol() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["show", "json.dumps", "--cached"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid symbol"));
}

#[test]
fn list_one_category() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["list", "builtin", "--cached"])
        .assert()
        .success()
        .stdout("builtin:None\nbuiltin:len\nbuiltin:print\n");
}

#[test]
fn detail_without_network_or_cache_exits_one() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["detail", "numpy"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no metadata available"));
}

#[test]
fn cache_status_then_clean() {
    let fixture = Fixture::new();

    let output = fixture
        .cmd()
        .args(["cache", "status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let status = stdout_json(&output);
    assert_eq!(status["records"].as_array().map(Vec::len), Some(3));
    assert_eq!(status["remote_details"], 0);

    let output = fixture
        .cmd()
        .args(["cache", "clean", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout_json(&output)["removed"], 3);

    fixture
        .cmd()
        .args(["search", "json", "--cached", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn invalid_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pyref.toml");
    std::fs::write(&config, "[cache\nroot = 1").unwrap();

    pyref()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["cache", "status"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to load config"));
}
