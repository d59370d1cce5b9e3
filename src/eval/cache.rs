// eval/cache.rs - LRU caches for compiled equations and chain runs
//
// Two caches, both thread-safe via Mutex:
//   - compiled equations keyed by equation text, so repeated runs and
//     sweeps parse each distinct equation once
//   - run snapshots keyed by a deterministic hash of the node table,
//     execution order and initial input
//
// Values are stored behind `Arc` so a hit is a reference count bump.

use crate::eval::chain::{
    apply_steps, compile_steps_with, CompileResult, CompiledStep, NodeId, NodeTable,
};
use crate::eval::compiled::compile;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_CACHE_CAPACITY: usize = 64;

pub struct EvalCache {
    equations: Mutex<LruCache<String, Arc<CompileResult>>>,
    runs: Mutex<LruCache<u64, Arc<NodeTable>>>,
}

impl Default for EvalCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl EvalCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            equations: Mutex::new(LruCache::new(cap)),
            runs: Mutex::new(LruCache::new(cap)),
        }
    }

    // ── Equations ──

    /// Compiled form of `equation`, compiling and storing it on a miss.
    pub fn compiled(&self, equation: &str) -> Arc<CompileResult> {
        let mut cache = self.equations.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(equation) {
            return Arc::clone(hit);
        }
        let compiled = Arc::new(compile(equation));
        cache.put(equation.to_string(), Arc::clone(&compiled));
        compiled
    }

    /// Compile the steps of a chain through the equation cache.
    pub fn compile_steps(&self, nodes: &NodeTable, order: &[NodeId]) -> Vec<CompiledStep> {
        compile_steps_with(nodes, order, |equation| self.compiled(equation))
    }

    // ── Runs ──

    pub fn get_run(&self, hash: u64) -> Option<Arc<NodeTable>> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&hash)
            .cloned()
    }

    pub fn put_run(&self, hash: u64, nodes: Arc<NodeTable>) {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(hash, nodes);
    }

    /// `run_chain`, answered from the cache when the same request was seen.
    pub fn run_chain(
        &self,
        initial_input: f64,
        nodes: &NodeTable,
        order: &[NodeId],
    ) -> Arc<NodeTable> {
        let hash = hash_run_request(nodes, order, initial_input);
        if let Some(hit) = self.get_run(hash) {
            log::trace!("run cache hit {hash:016x}");
            return hit;
        }

        let steps = self.compile_steps(nodes, order);
        let result = Arc::new(apply_steps(&steps, nodes, initial_input));
        self.put_run(hash, Arc::clone(&result));
        result
    }

    // ── Maintenance ──

    pub fn clear(&self) {
        self.equations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Number of entries currently cached (equations + runs).
    pub fn len(&self) -> usize {
        let e = self.equations.lock().unwrap_or_else(PoisonError::into_inner).len();
        let r = self.runs.lock().unwrap_or_else(PoisonError::into_inner).len();
        e + r
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Request hashing ────────────────────────────────────────────────

/// Hash a run request deterministically. Same table + order + input = same
/// hash, regardless of the table's iteration order.
pub fn hash_run_request(nodes: &NodeTable, order: &[NodeId], initial_input: f64) -> u64 {
    let mut hasher = DefaultHasher::new();

    hash_nodes(&mut hasher, nodes);

    order.len().hash(&mut hasher);
    order.hash(&mut hasher);
    initial_input.to_bits().hash(&mut hasher);

    hasher.finish()
}

/// Hash only the node table. Useful to detect changes between snapshots.
pub fn hash_snapshot(nodes: &NodeTable) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_nodes(&mut hasher, nodes);
    hasher.finish()
}

fn hash_nodes(hasher: &mut DefaultHasher, nodes: &NodeTable) {
    let mut ids: Vec<NodeId> = nodes.keys().copied().collect();
    ids.sort_unstable();

    ids.len().hash(hasher);
    for id in ids {
        let node = &nodes[&id];
        node.id.hash(hasher);
        node.equation.hash(hasher);
        node.next_function.hash(hasher);
        node.input.to_bits().hash(hasher);
        node.output.to_bits().hash(hasher);
        node.path_shape.hash(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::chain::{run_chain, FunctionNode};

    fn nodes_from(list: Vec<FunctionNode>) -> NodeTable {
        list.into_iter().map(|n| (n.id, n)).collect()
    }

    fn sample() -> NodeTable {
        nodes_from(vec![
            FunctionNode::new(1, "x^2", Some(2), Some("quadratic")),
            FunctionNode::new(2, "2*x+4", None, None),
        ])
    }

    #[test]
    fn same_request_same_hash() {
        let h1 = hash_run_request(&sample(), &[1, 2], 2.0);
        let h2 = hash_run_request(&sample(), &[1, 2], 2.0);
        assert_eq!(h1, h2);
    }

    #[test]
    fn insertion_order_independent() {
        let a = nodes_from(vec![
            FunctionNode::new(1, "x", Some(2), None),
            FunctionNode::new(2, "x", None, None),
        ]);
        let b = nodes_from(vec![
            FunctionNode::new(2, "x", None, None),
            FunctionNode::new(1, "x", Some(2), None),
        ]);
        assert_eq!(hash_snapshot(&a), hash_snapshot(&b));
    }

    #[test]
    fn different_equation_different_hash() {
        let mut edited = sample();
        edited.get_mut(&2).unwrap().equation = "2*x+5".into();
        assert_ne!(
            hash_run_request(&sample(), &[1, 2], 2.0),
            hash_run_request(&edited, &[1, 2], 2.0)
        );
    }

    #[test]
    fn different_input_or_order_different_hash() {
        let nodes = sample();
        let base = hash_run_request(&nodes, &[1, 2], 2.0);
        assert_ne!(base, hash_run_request(&nodes, &[1, 2], 3.0));
        assert_ne!(base, hash_run_request(&nodes, &[2, 1], 2.0));
    }

    #[test]
    fn computed_values_change_snapshot_hash() {
        let nodes = sample();
        let ran = run_chain(2.0, &nodes, &[1, 2]);
        assert_ne!(hash_snapshot(&nodes), hash_snapshot(&ran));
    }

    #[test]
    fn equation_cache_reuses_compilation() {
        let cache = EvalCache::new(8);
        let a = cache.compiled("x^2");
        let b = cache.compiled("x^2");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_compilations_are_cached_too() {
        let cache = EvalCache::new(8);
        assert!(cache.compiled("x+").is_err());
        assert!(Arc::ptr_eq(&cache.compiled("x+"), &cache.compiled("x+")));
    }

    #[test]
    fn cached_run_matches_uncached() {
        let cache = EvalCache::default();
        let nodes = sample();
        let first = cache.run_chain(2.0, &nodes, &[1, 2]);
        assert_eq!(*first, run_chain(2.0, &nodes, &[1, 2]));
        let second = cache.run_chain(2.0, &nodes, &[1, 2]);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn lru_evicts_oldest() {
        let cache = EvalCache::new(1);
        cache.compiled("x");
        cache.compiled("x+1");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_both_caches() {
        let cache = EvalCache::new(4);
        cache.run_chain(1.0, &sample(), &[1, 2]);
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
