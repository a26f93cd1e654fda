//! Stress test: awkward graph shapes.
//!
//! Cycles, self references, diamonds and long parent chains.

use std::collections::HashSet;

use case_copy::{
    Case, CaseCopier, CaseId, CopyConfig, CopyRequest, CopyResult, CyclePolicy, DeidTransforms,
    IndexRef, MemoryCaseStore,
};

fn node(id: &str) -> Case {
    Case::new("demo", id, "node", id, "u1")
}

fn copy_with(store: &MemoryCaseStore, config: CopyConfig, ids: &[&str]) -> CopyResult {
    let transforms = DeidTransforms::builtin();
    CaseCopier::new(store, store, &transforms)
        .with_config(config)
        .duplicate(&CopyRequest::new("demo", "u2").with_cases(ids.iter().copied()))
        .unwrap()
}

fn copy(store: &MemoryCaseStore, ids: &[&str]) -> CopyResult {
    copy_with(store, CopyConfig::default(), ids)
}

#[test]
fn stress_two_case_cycle_terminates() {
    let store = MemoryCaseStore::with_cases([
        node("a").with_index("parent", IndexRef::child("node", "b")),
        node("b").with_index("parent", IndexRef::child("node", "a")),
    ])
    .unwrap();

    let result = copy(&store, &["a", "b"]);

    assert_eq!(result.id_pairs.len(), 2);
    assert!(result.errors.is_empty());
    assert_eq!(result.diagnostics.cycles().count(), 1);

    // Exactly one direction of the cycle survives, pointing at a copy.
    let new_a = result.new_id_for(&CaseId::new("a")).unwrap();
    let new_b = result.new_id_for(&CaseId::new("b")).unwrap();
    let copy_a = store.get("demo", new_a).unwrap().unwrap();
    let copy_b = store.get("demo", new_b).unwrap().unwrap();
    assert_eq!(&copy_a.indices["parent"].referenced_case_id, new_b);
    assert!(copy_b.indices.is_empty());
}

#[test]
fn stress_self_reference_is_dropped() {
    let store =
        MemoryCaseStore::with_cases([node("a").with_index("self", IndexRef::child("node", "a"))])
            .unwrap();

    let result = copy(&store, &["a"]);
    assert_eq!(result.id_pairs.len(), 1);
    let cycles: Vec<_> = result.diagnostics.cycles().collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].identifier, "self");
}

#[test]
fn stress_long_cycle_with_report_policy() {
    // a -> b -> c -> d -> a
    let ring = ["a", "b", "c", "d"];
    let store = MemoryCaseStore::with_cases(ring.iter().enumerate().map(|(i, id)| {
        let next = ring[(i + 1) % ring.len()];
        node(id).with_index("next", IndexRef::child("node", next))
    }))
    .unwrap();

    let result = copy_with(
        &store,
        CopyConfig::default().with_cycle_policy(CyclePolicy::ReportError),
        &["a"],
    );

    assert_eq!(result.id_pairs.len(), 4);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.diagnostics.cycles().count(), 1);
    // d is reached last and its link back to a is the one broken.
    assert_eq!(
        result.diagnostics.cycles().next().unwrap().case_id,
        CaseId::new("d")
    );
}

#[test]
fn stress_diamond_shares_the_apex() {
    //      top
    //     /   \
    //   left  right
    //     \   /
    //     bottom
    let store = MemoryCaseStore::with_cases([
        node("top"),
        node("left").with_index("up", IndexRef::child("node", "top")),
        node("right").with_index("up", IndexRef::child("node", "top")),
        node("bottom")
            .with_index("l", IndexRef::child("node", "left"))
            .with_index("r", IndexRef::child("node", "right")),
    ])
    .unwrap();

    let result = copy(&store, &["bottom"]);
    assert_eq!(result.id_pairs.len(), 4);

    let new_top = result.new_id_for(&CaseId::new("top")).unwrap();
    for side in ["left", "right"] {
        let copy = store
            .get("demo", result.new_id_for(&CaseId::new(side)).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(&copy.indices["up"].referenced_case_id, new_top);
    }
}

#[test]
fn stress_chain_of_200_pulled_in_lazily() {
    let n = 200;
    let store = MemoryCaseStore::with_cases((0..n).map(|i| {
        let case = node(&format!("n{i}"));
        if i == 0 {
            case
        } else {
            case.with_index("parent", IndexRef::child("node", format!("n{}", i - 1)))
        }
    }))
    .unwrap();

    let leaf = format!("n{}", n - 1);
    let result = copy(&store, &[leaf.as_str()]);

    assert_eq!(result.id_pairs.len(), n);
    assert_eq!(store.lazy_fetch_count(), n - 1);
    // Root first, requested leaf last.
    assert_eq!(result.id_pairs[0].0, CaseId::new("n0"));
    assert_eq!(result.id_pairs[n - 1].0, CaseId::new(leaf));

    let new_ids: HashSet<_> = result.id_pairs.iter().map(|(_, n)| n.clone()).collect();
    assert_eq!(new_ids.len(), n);
}

#[test]
fn stress_chain_of_100k_does_not_exhaust_the_stack() {
    let n = 100_000;
    let store = MemoryCaseStore::with_cases((0..n).map(|i| {
        let case = node(&format!("n{i}"));
        if i == 0 {
            case
        } else {
            case.with_index("parent", IndexRef::child("node", format!("n{}", i - 1)))
        }
    }))
    .unwrap();

    let leaf = format!("n{}", n - 1);
    let result = copy(&store, &[leaf.as_str()]);

    assert_eq!(result.id_pairs.len(), n);
    assert!(result.errors.is_empty());
    assert_eq!(result.id_pairs[0].0, CaseId::new("n0"));

    // The leaf's copy points at the copy of its parent.
    let new_leaf = result.new_id_for(&CaseId::new(leaf)).unwrap();
    let new_parent = result
        .new_id_for(&CaseId::new(format!("n{}", n - 2)))
        .unwrap();
    let copy_leaf = store.get("demo", new_leaf).unwrap().unwrap();
    assert_eq!(&copy_leaf.indices["parent"].referenced_case_id, new_parent);
}

#[test]
fn stress_rejected_ancestor_never_dangles() {
    // r <- m <- l, with the copy of m refused by the store.
    let store = MemoryCaseStore::with_cases([
        node("r"),
        node("m").with_index("parent", IndexRef::child("node", "r")),
        node("l").with_index("parent", IndexRef::child("node", "m")),
    ])
    .unwrap();
    store.reject_on_commit("m").unwrap();

    let result = copy(&store, &["l"]);
    assert_eq!(result.id_pairs.len(), 2);

    for (_, new_id) in &result.id_pairs {
        let copy = store.get("demo", new_id).unwrap().unwrap();
        for index in copy.indices.values() {
            assert!(store
                .get("demo", &index.referenced_case_id)
                .unwrap()
                .is_some());
        }
    }
    assert_eq!(result.diagnostics.unresolved().count(), 1);
}
