//! Scale test: large batches and concurrent independent copies.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use case_copy::{Case, CaseCopier, CaseId, CopyRequest, DeidTransforms, IndexRef, MemoryCaseStore};

/// 50 households with 20 members each.
fn populate(store: &MemoryCaseStore) {
    for h in 0..50 {
        let household = format!("h{h}");
        store
            .insert(Case::new("demo", &household, "household", &household, "u1"))
            .unwrap();
        for m in 0..20 {
            let member = format!("h{h}-m{m}");
            store
                .insert(
                    Case::new("demo", member.as_str(), "person", member.as_str(), "u1")
                        .with_index("parent", IndexRef::child("household", household.as_str()))
                        .with_property("phone", format!("555-{h:02}{m:02}")),
                )
                .unwrap();
        }
    }
}

fn member_ids() -> Vec<CaseId> {
    (0..50)
        .flat_map(|h| (0..20).map(move |m| CaseId::new(format!("h{h}-m{m}"))))
        .collect()
}

#[test]
fn stress_copy_1000_members() {
    let store = MemoryCaseStore::new();
    populate(&store);
    let transforms = DeidTransforms::builtin();

    let request = CopyRequest::new("demo", "u2")
        .with_cases(member_ids())
        .with_censor("phone", "deid_id");
    let result = CaseCopier::new(&store, &store, &transforms)
        .duplicate(&request)
        .unwrap();

    // 1000 members plus their 50 households, each once.
    assert_eq!(result.id_pairs.len(), 1050);
    assert!(result.errors.is_empty());
    assert_eq!(store.batch_fetch_count(), 1);
    assert_eq!(store.lazy_fetch_count(), 50);
    assert_eq!(store.submissions().unwrap().len(), 1);
    assert_eq!(store.owned_by("demo", "u2").unwrap().len(), 1050);
}

#[test]
fn stress_concurrent_copies_are_independent() {
    let store = Arc::new(MemoryCaseStore::new());
    populate(&store);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let transforms = DeidTransforms::builtin();
                let request = CopyRequest::new("demo", format!("owner-{t}"))
                    .with_cases(member_ids().into_iter().take(100));
                CaseCopier::new(store.as_ref(), store.as_ref(), &transforms)
                    .duplicate(&request)
                    .unwrap()
            })
        })
        .collect();

    let mut all_new = HashSet::new();
    for handle in handles {
        let result = handle.join().unwrap();
        // 100 members across 5 households.
        assert_eq!(result.id_pairs.len(), 105);
        for (_, new_id) in result.id_pairs {
            assert!(all_new.insert(new_id));
        }
    }
    assert_eq!(store.submissions().unwrap().len(), 4);
}
