use pyref_index::{
    BuiltinsSnapshot, InstalledIndexSnapshot, PackageEntry, QualifiedSymbol, QueryError,
    QuerySurface, RemoteIndexSnapshot,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn json_package() -> PackageEntry {
    PackageEntry {
        name: "json".into(),
        functions: BTreeSet::from(["dumps".to_string(), "loads".to_string()]),
        classes: BTreeSet::new(),
        submodules: BTreeSet::new(),
        doc: "JSON encoder and decoder".into(),
        importable: true,
    }
}

fn surface() -> QuerySurface {
    let builtins: BuiltinsSnapshot = ["None", "abs", "print"].into_iter().collect();
    let installed: InstalledIndexSnapshot = [json_package()].into_iter().collect();
    let remote: RemoteIndexSnapshot = ["jsonschema", "numpy"].into_iter().collect();
    QuerySurface::new(Arc::new(builtins), Arc::new(installed), Arc::new(remote))
}

#[test]
fn search_spans_all_three_indexes() {
    let results = surface().search("json").unwrap();

    for expected in [
        QualifiedSymbol::installed("json"),
        QualifiedSymbol::installed("json.dumps"),
        QualifiedSymbol::remote("jsonschema"),
    ] {
        assert!(results.contains(&expected), "missing {expected} in {results:?}");
    }
    assert!(!results.contains(&QualifiedSymbol::builtin("None")));
}

#[test]
fn search_output_is_sorted_and_unique() {
    let results = surface().search("S").unwrap();
    let mut sorted = results.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(results, sorted);

    let keys: Vec<String> = results.iter().map(ToString::to_string).collect();
    let mut sorted_keys = keys.clone();
    sorted_keys.sort();
    assert_eq!(keys, sorted_keys);
}

#[test]
fn same_name_in_two_categories_is_kept_twice() {
    let builtins: BuiltinsSnapshot = BuiltinsSnapshot::new();
    let installed: InstalledIndexSnapshot = [json_package()].into_iter().collect();
    let remote: RemoteIndexSnapshot = ["json"].into_iter().collect();
    let surface = QuerySurface::new(Arc::new(builtins), Arc::new(installed), Arc::new(remote));

    let results = surface.search("json").unwrap();
    assert!(results.contains(&QualifiedSymbol::installed("json")));
    assert!(results.contains(&QualifiedSymbol::remote("json")));
}

#[test]
fn empty_or_blank_query_is_rejected() {
    let surface = surface();
    assert_eq!(surface.search(""), Err(QueryError::EmptyQuery));
    assert_eq!(surface.search("   "), Err(QueryError::EmptyQuery));
}

#[test]
fn query_is_trimmed_and_case_folded() {
    let results = surface().search("  NONE ").unwrap();
    assert_eq!(results, vec![QualifiedSymbol::builtin("None")]);
}
