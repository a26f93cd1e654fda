//! Integration test: copying case graphs end to end.
//!
//! Covers the documented scenarios:
//! 1. A single case with no parents
//! 2. A parent pulled in transitively
//! 3. A parent that does not exist
//! 4. A case already owned by the target owner
//! 5. De-identification of a top-level attribute
//! 6. A shared parent copied once
//!
//! plus the general properties every copy must hold.

use std::collections::{BTreeMap, HashSet};

use case_copy::censor::transforms::REDACTED;
use case_copy::{
    Case, CaseCopier, CaseId, CopyRequest, CopyResult, DeidTransforms, DropReason, IndexRef,
    MemoryCaseStore,
};

const DOMAIN: &str = "demo";

fn case(id: &str, case_type: &str, owner: &str) -> Case {
    Case::new(DOMAIN, id, case_type, format!("{case_type} {id}"), owner)
}

fn copy(store: &MemoryCaseStore, request: &CopyRequest) -> CopyResult {
    let transforms = DeidTransforms::builtin();
    CaseCopier::new(store, store, &transforms)
        .duplicate(request)
        .expect("copy should not fail at request level")
}

fn saved(store: &MemoryCaseStore, id: &CaseId) -> Case {
    store
        .get(DOMAIN, id)
        .unwrap()
        .unwrap_or_else(|| panic!("copy {id} should be persisted"))
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn single_case_without_parents() {
    let store = MemoryCaseStore::with_cases([case("a", "patient", "u1")]).unwrap();

    let result = copy(&store, &CopyRequest::new(DOMAIN, "u2").with_cases(["a"]));

    assert_eq!(result.id_pairs.len(), 1);
    assert_eq!(result.id_pairs[0].0, CaseId::new("a"));
    assert_ne!(result.id_pairs[0].1, CaseId::new("a"));
    assert!(result.errors.is_empty());
    assert!(result.submission_id.is_some());
    assert_eq!(saved(&store, &result.id_pairs[0].1).owner_id, "u2");
}

#[test]
fn parent_is_copied_transitively() {
    let store = MemoryCaseStore::with_cases([
        case("b", "household", "u1"),
        case("a", "patient", "u1").with_index("parent", IndexRef::child("household", "b")),
    ])
    .unwrap();

    let result = copy(&store, &CopyRequest::new(DOMAIN, "u2").with_cases(["a"]));

    assert_eq!(result.id_pairs.len(), 2);
    assert!(result.errors.is_empty());

    let new_a = result.new_id_for(&CaseId::new("a")).unwrap();
    let new_b = result.new_id_for(&CaseId::new("b")).unwrap();
    let copy_a = saved(&store, new_a);
    assert_eq!(&copy_a.indices["parent"].referenced_case_id, new_b);
    assert_eq!(copy_a.indices["parent"].referenced_case_type, "household");
}

#[test]
fn dangling_parent_is_dropped_silently() {
    let store = MemoryCaseStore::with_cases([case("a", "patient", "u1")
        .with_index("parent", IndexRef::child("household", "c"))
        .with_index("host", IndexRef::extension("site", "missing-too"))])
    .unwrap();

    let result = copy(&store, &CopyRequest::new(DOMAIN, "u2").with_cases(["a"]));

    assert_eq!(result.id_pairs.len(), 1);
    assert!(result.errors.is_empty(), "dangling refs are not errors");
    let copy_a = saved(&store, &result.id_pairs[0].1);
    assert!(copy_a.indices.is_empty());

    let dropped: Vec<_> = result.diagnostics.unresolved().collect();
    assert_eq!(dropped.len(), 2);
    assert!(dropped.iter().all(|d| d.reason == DropReason::Missing));
}

#[test]
fn case_already_owned_by_target_is_refused() {
    let store = MemoryCaseStore::with_cases([
        case("b", "household", "u1"),
        case("a", "patient", "u2").with_index("parent", IndexRef::child("household", "b")),
    ])
    .unwrap();

    let result = copy(&store, &CopyRequest::new(DOMAIN, "u2").with_cases(["a"]));

    assert!(result.id_pairs.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("already owned"));
    assert!(result.is_failure());
    // The refused case's parents are never looked at.
    assert_eq!(store.lazy_fetch_count(), 0);
    assert!(store.submissions().unwrap().is_empty());
}

#[test]
fn censored_attribute_is_masked() {
    let store = MemoryCaseStore::with_cases([Case::new(DOMAIN, "a", "patient", "Alice", "u1")
        .with_property("village", "Riverside")])
    .unwrap();

    let result = copy(
        &store,
        &CopyRequest::new(DOMAIN, "u2")
            .with_cases(["a"])
            .with_censor("name", "redact"),
    );

    let copy_a = saved(&store, &result.id_pairs[0].1);
    assert_eq!(copy_a.name, REDACTED);
    assert_eq!(copy_a.properties["village"], "Riverside");
    // The original is untouched.
    assert_eq!(saved(&store, &CaseId::new("a")).name, "Alice");
}

#[test]
fn shared_parent_is_copied_once() {
    let store = MemoryCaseStore::with_cases([
        case("c", "household", "u1"),
        case("a", "patient", "u1").with_index("parent", IndexRef::child("household", "c")),
        case("b", "patient", "u1").with_index("parent", IndexRef::child("household", "c")),
    ])
    .unwrap();

    let result = copy(&store, &CopyRequest::new(DOMAIN, "u2").with_cases(["a", "b"]));

    assert_eq!(result.id_pairs.len(), 3);
    let c_copies = result
        .id_pairs
        .iter()
        .filter(|(orig, _)| orig.as_str() == "c")
        .count();
    assert_eq!(c_copies, 1);

    let new_c = result.new_id_for(&CaseId::new("c")).unwrap();
    for original in ["a", "b"] {
        let copied = saved(&store, result.new_id_for(&CaseId::new(original)).unwrap());
        assert_eq!(&copied.indices["parent"].referenced_case_id, new_c);
    }
    // One lazy fetch for c, not two.
    assert_eq!(store.lazy_fetch_count(), 1);
}

// ── Properties ───────────────────────────────────────────────────────────────

fn sample_store() -> MemoryCaseStore {
    MemoryCaseStore::with_cases([
        case("root", "district", "u1"),
        case("h1", "household", "u1").with_index("parent", IndexRef::child("district", "root")),
        case("h2", "household", "u1").with_index("parent", IndexRef::child("district", "root")),
        case("p1", "patient", "u1")
            .with_index("parent", IndexRef::child("household", "h1"))
            .with_property("phone", "555-0101"),
        case("p2", "patient", "u1")
            .with_index("parent", IndexRef::child("household", "h2"))
            .with_index("clinic", IndexRef::extension("clinic", "nowhere")),
        case("v1", "visit", "u1")
            .with_index("patient", IndexRef::child("patient", "p1"))
            .with_index("household", IndexRef::child("household", "h1")),
        case("mine", "patient", "u2").with_index("parent", IndexRef::child("household", "h1")),
    ])
    .unwrap()
}

fn sample_request() -> CopyRequest {
    CopyRequest::new(DOMAIN, "u2").with_cases(["v1", "p2", "p1", "mine", "h1", "ghost"])
}

#[test]
fn every_original_copied_at_most_once() {
    let store = sample_store();
    let result = copy(&store, &sample_request());

    let originals: Vec<_> = result.id_pairs.iter().map(|(o, _)| o.clone()).collect();
    let unique: HashSet<_> = originals.iter().cloned().collect();
    assert_eq!(originals.len(), unique.len());
    // root, h1, h2, p1, p2, v1
    assert_eq!(unique.len(), 6);
}

#[test]
fn new_ids_are_fresh() {
    let store = sample_store();
    let request = sample_request();
    let result = copy(&store, &request);

    let new_ids: HashSet<_> = result.id_pairs.iter().map(|(_, n)| n.clone()).collect();
    assert_eq!(new_ids.len(), result.id_pairs.len());
    for source in &request.source_case_ids {
        assert!(!new_ids.contains(source));
    }
    for (original, _) in &result.id_pairs {
        assert!(!new_ids.contains(original));
    }
}

#[test]
fn resolved_indices_only_point_at_new_copies() {
    let store = sample_store();
    let result = copy(&store, &sample_request());

    let new_ids: HashSet<_> = result.id_pairs.iter().map(|(_, n)| n.clone()).collect();
    for (_, new_id) in &result.id_pairs {
        for index in saved(&store, new_id).indices.values() {
            assert!(
                new_ids.contains(&index.referenced_case_id),
                "{new_id} points at {}",
                index.referenced_case_id
            );
        }
    }
}

#[test]
fn owner_collision_always_one_error() {
    let store = sample_store();
    let result = copy(&store, &sample_request());

    assert!(result.new_id_for(&CaseId::new("mine")).is_none());
    let mentions = result.errors.iter().filter(|e| e.contains("'mine'")).count();
    assert_eq!(mentions, 1);
    assert_eq!(result.errors.len(), 1);
}

#[test]
fn fields_pass_through_without_censor_map() {
    let store = sample_store();
    let result = copy(&store, &sample_request());

    for (original, new_id) in &result.id_pairs {
        let source = saved(&store, original);
        let copied = saved(&store, new_id);
        assert_eq!(copied.case_type, source.case_type);
        assert_eq!(copied.name, source.name);
        assert_eq!(copied.external_id, source.external_id);
        assert_eq!(copied.date_opened, source.date_opened);
        assert_eq!(copied.properties, source.properties);
        assert_eq!(copied.owner_id, "u2");
    }
}

#[test]
fn missing_sources_are_noted_not_errors() {
    let store = sample_store();
    let result = copy(&store, &sample_request());

    assert_eq!(result.diagnostics.missing, vec![CaseId::new("ghost")]);
    assert!(!result.errors.iter().any(|e| e.contains("ghost")));
}

#[test]
fn results_are_ordered_parents_first() {
    let store = sample_store();
    let result = copy(&store, &sample_request());

    let position: BTreeMap<_, _> = result
        .id_pairs
        .iter()
        .enumerate()
        .map(|(i, (orig, _))| (orig.as_str().to_string(), i))
        .collect();
    assert!(position["root"] < position["h1"]);
    assert!(position["h1"] < position["p1"]);
    assert!(position["p1"] < position["v1"]);
}

#[test]
fn empty_request_never_reads_the_store() {
    let store = sample_store();
    let result = copy(&store, &CopyRequest::new(DOMAIN, "u2"));

    assert_eq!(result, CopyResult::empty());
    assert_eq!(store.batch_fetch_count(), 0);
    assert_eq!(store.lazy_fetch_count(), 0);
}

#[test]
fn censoring_properties_and_dates() {
    let store = MemoryCaseStore::with_cases([Case::new(DOMAIN, "a", "patient", "Alice", "u1")
        .with_external_id("NATIONAL-123")
        .with_date_opened("2024-01-15")
        .with_property("phone", "555-0100")
        .with_property("village", "Riverside")])
    .unwrap();

    let result = copy(
        &store,
        &CopyRequest::new(DOMAIN, "u2")
            .with_cases(["a"])
            .with_censor("external_id", "deid_id")
            .with_censor("date_opened", "deid_date")
            .with_censor("phone", "blank")
            .with_censor("not_a_property", "redact"),
    );

    let copied = saved(&store, &result.id_pairs[0].1);
    let external = copied.external_id.unwrap();
    assert_ne!(external, "NATIONAL-123");
    assert_eq!(external.len(), 32);
    assert_ne!(copied.date_opened.as_deref(), Some("2024-01-15"));
    assert_eq!(copied.properties["phone"], "");
    assert_eq!(copied.properties["village"], "Riverside");
    assert!(!copied.properties.contains_key("not_a_property"));
    assert_eq!(copied.name, "Alice");
}
