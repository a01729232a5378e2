//! Randomised operation sequences against the transaction cache proxy.
//!
//! Tests verify that:
//! - Reads through a proxy see the proxy's own writes
//! - Keys the proxy never touched read through to the super cache
//! - Replaying the log reproduces the direct effect of the same operations

use db_orm_layer::cache::{CacheAction, CacheProvider, CacheProxy, MemoryCache, SharedCache};
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const KEYS: &[&str] = &["a", "b", "c", "d", "e"];

#[derive(Debug, Clone)]
enum Op {
    Set(String, Value),
    Delete(String),
    DeleteAll,
}

/// Generate a random operation sequence over a small key space
fn random_ops(len: usize) -> Vec<Op> {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let key = KEYS.choose(&mut rng).unwrap().to_string();
            match rng.gen_range(0..10) {
                0..=5 => Op::Set(key, json!(rng.gen_range(0..1000))),
                6..=8 => Op::Delete(key),
                _ => Op::DeleteAll,
            }
        })
        .collect()
}

fn apply(ops: &[Op], cache: &dyn CacheProvider) {
    for op in ops {
        match op {
            Op::Set(key, value) => cache.set(key, value.clone()).unwrap(),
            Op::Delete(key) => cache.delete(key).unwrap(),
            Op::DeleteAll => cache.delete_all().unwrap(),
        }
    }
}

fn seeded_base() -> Arc<MemoryCache> {
    let base = MemoryCache::shared();
    base.set("a", json!("base-a")).unwrap();
    base.set("c", json!("base-c")).unwrap();
    base
}

/// Expected proxy view: local additions win, local removals hide, and
/// everything else reads through (DeleteAll resets the overlay).
fn expected_view(ops: &[Op], base: &BTreeMap<String, Value>, key: &str) -> Option<Value> {
    let mut additions: HashMap<String, Value> = HashMap::new();
    let mut removals: HashSet<String> = HashSet::new();
    for op in ops {
        match op {
            Op::Set(k, v) => {
                removals.remove(k);
                additions.insert(k.clone(), v.clone());
            }
            Op::Delete(k) => {
                additions.remove(k);
                removals.insert(k.clone());
            }
            Op::DeleteAll => {
                additions.clear();
                removals.clear();
            }
        }
    }
    if let Some(value) = additions.get(key) {
        return Some(value.clone());
    }
    if removals.contains(key) {
        return None;
    }
    base.get(key).cloned()
}

#[test]
fn test_read_your_own_writes_over_empty_super_cache() {
    for _ in 0..200 {
        let len = rand::thread_rng().gen_range(0..40);
        let ops = random_ops(len);

        let proxy = CacheProxy::new(MemoryCache::shared());
        let direct = MemoryCache::new();
        apply(&ops, &proxy);
        apply(&ops, &direct);

        for key in KEYS {
            assert_eq!(
                proxy.get(key).unwrap(),
                direct.get(key).unwrap(),
                "key {} after {:?}",
                key,
                ops
            );
        }
    }
}

#[test]
fn test_proxy_view_over_populated_super_cache() {
    for _ in 0..200 {
        let len = rand::thread_rng().gen_range(0..40);
        let ops = random_ops(len);

        let base = seeded_base();
        let before = base.snapshot();
        let proxy = CacheProxy::new(base.clone() as SharedCache);
        apply(&ops, &proxy);

        for key in KEYS {
            assert_eq!(
                proxy.get(key).unwrap(),
                expected_view(&ops, &before, key),
                "key {} after {:?}",
                key,
                ops
            );
        }
        // The super cache is untouched until replay.
        assert_eq!(base.snapshot(), before);
    }
}

#[test]
fn test_replay_matches_direct_application() {
    for _ in 0..200 {
        let len = rand::thread_rng().gen_range(0..40);
        let ops = random_ops(len);

        let base = seeded_base();
        let proxy = CacheProxy::new(base.clone() as SharedCache);
        apply(&ops, &proxy);
        assert_eq!(proxy.pending(), ops.len());

        let direct = seeded_base();
        apply(&ops, direct.as_ref());

        proxy.replay(base.as_ref()).unwrap();
        assert_eq!(base.snapshot(), direct.snapshot(), "after {:?}", ops);
        assert_eq!(proxy.pending(), 0);

        // A second replay has nothing left to apply.
        base.set("sentinel", json!(true)).unwrap();
        proxy.replay(base.as_ref()).unwrap();
        assert_eq!(base.get("sentinel").unwrap(), Some(json!(true)));
    }
}

#[test]
fn test_full_history_is_replayed() {
    let proxy = CacheProxy::new(MemoryCache::shared());
    proxy.set("k", json!("v1")).unwrap();
    proxy.delete("k").unwrap();
    proxy.set("k", json!("v2")).unwrap();
    proxy.delete_all().unwrap();
    proxy.set("j", json!(1)).unwrap();

    assert_eq!(
        proxy.actions(),
        vec![
            CacheAction::set("k", json!("v1")),
            CacheAction::delete("k"),
            CacheAction::set("k", json!("v2")),
            CacheAction::DeleteAll,
            CacheAction::set("j", json!(1)),
        ]
    );

    let target = seeded_base();
    proxy.replay(target.as_ref()).unwrap();
    // DeleteAll wiped the pre-existing entries as well.
    assert_eq!(target.len(), 1);
    assert_eq!(target.get("j").unwrap(), Some(json!(1)));
}
