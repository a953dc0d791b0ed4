//! Cross-policy invariants exercised through the eviction manager.

use proptest::prelude::*;
use rustc_hash::FxHashSet;

use readthrough::eviction::EvictionManager;
use readthrough::key::ItemKey;
use readthrough::map::SizeLimits;
use readthrough::policy::{ArcConfig, LfuConfig, PolicyConfig, TwoQConfig};

fn limits(max_items: usize) -> SizeLimits {
    SizeLimits {
        max_items: Some(max_items),
        max_bytes: None,
    }
}

fn key(name: &str) -> ItemKey {
    ItemKey::primary("k", name)
}

fn every_policy() -> Vec<PolicyConfig> {
    vec![
        PolicyConfig::Lru,
        PolicyConfig::Fifo,
        PolicyConfig::Mru,
        PolicyConfig::Random,
        PolicyConfig::Lfu(LfuConfig::default()),
        PolicyConfig::Arc(ArcConfig {
            max_cache_size: 8,
            ..ArcConfig::default()
        }),
        PolicyConfig::TwoQ(TwoQConfig {
            max_cache_size: 8,
            ..TwoQConfig::default()
        }),
    ]
}

#[test]
fn n_plus_one_inserts_evict_exactly_one_under_every_policy() {
    for config in every_policy() {
        let mut manager = EvictionManager::new(&config, limits(8));
        let mut evicted = Vec::new();
        for i in 0..9 {
            evicted.extend(manager.record_insert(&key(&format!("k{i}")), 1));
        }
        assert_eq!(
            evicted.len(),
            1,
            "policy {} evicted {} keys",
            config.name(),
            evicted.len()
        );
        assert_eq!(manager.len(), 8, "policy {}", config.name());
        // The newest key always survives its own admission.
        assert_ne!(evicted[0], key("k8"), "policy {}", config.name());
    }
}

#[test]
fn reinserting_the_same_key_never_evicts() {
    for config in every_policy() {
        let mut manager = EvictionManager::new(&config, limits(4));
        for _ in 0..20 {
            assert!(
                manager.record_insert(&key("same"), 1).is_empty(),
                "policy {}",
                config.name()
            );
        }
        assert_eq!(manager.len(), 1);
    }
}

/// Replays a trace against a policy, mirroring residency in a set.
/// Returns the hit count.
fn replay(config: &PolicyConfig, capacity: usize, trace: &[String]) -> usize {
    let mut manager = EvictionManager::new(config, limits(capacity));
    let mut resident: FxHashSet<String> = FxHashSet::default();
    let mut hits = 0;
    for name in trace {
        if resident.contains(name) {
            hits += 1;
            manager.record_access(&key(name));
        } else {
            for victim in manager.record_insert(&key(name), 1) {
                if let readthrough::key::ItemId::Text(id) = victim.id() {
                    resident.remove(id);
                } else {
                    resident.remove(&victim.id().canonical());
                }
            }
            resident.insert(name.clone());
        }
    }
    hits
}

/// A frequent working set revisited every round, interleaved with a
/// never-repeating scan wider than capacity.
fn scan_heavy_trace(capacity: usize, rounds: usize) -> Vec<String> {
    let mut trace = Vec::new();
    let mut scan = 0;
    for _ in 0..rounds {
        for i in 0..capacity {
            trace.push(format!("hot{i}"));
            trace.push(format!("hot{i}"));
        }
        for _ in 0..capacity {
            trace.push(format!("scan{scan}"));
            scan += 1;
        }
    }
    trace
}

#[test]
fn two_q_outperforms_lru_on_scan_heavy_workload() {
    let trace = scan_heavy_trace(8, 40);
    let lru = replay(&PolicyConfig::Lru, 8, &trace);
    let two_q = replay(
        &PolicyConfig::TwoQ(TwoQConfig {
            max_cache_size: 8,
            ..TwoQConfig::default()
        }),
        8,
        &trace,
    );
    assert!(
        two_q > lru,
        "2q hits {two_q} should beat lru hits {lru} under scan pressure"
    );
}

#[test]
fn arc_outperforms_lru_on_scan_heavy_workload() {
    let trace = scan_heavy_trace(8, 40);
    let lru = replay(&PolicyConfig::Lru, 8, &trace);
    let arc = replay(
        &PolicyConfig::Arc(ArcConfig {
            max_cache_size: 8,
            ..ArcConfig::default()
        }),
        8,
        &trace,
    );
    assert!(
        arc > lru,
        "arc hits {arc} should beat lru hits {lru} under scan pressure"
    );
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u8),
    Access(u8),
    Remove(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..64).prop_map(Op::Insert),
        (0u8..64).prop_map(Op::Access),
        (0u8..64).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn capacity_is_never_exceeded(
        ops in proptest::collection::vec(op_strategy(), 1..300),
        policy_idx in 0usize..7,
    ) {
        let config = &every_policy()[policy_idx];
        let mut manager = EvictionManager::new(config, limits(16));
        for op in ops {
            match op {
                Op::Insert(i) => {
                    manager.record_insert(&key(&format!("k{i}")), 1);
                }
                Op::Access(i) => manager.record_access(&key(&format!("k{i}"))),
                Op::Remove(i) => manager.record_remove(&key(&format!("k{i}"))),
            }
            prop_assert!(manager.len() <= 16);
            prop_assert_eq!(manager.bytes(), manager.len() as u64);
        }
    }
}
