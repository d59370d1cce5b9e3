// commands/mod.rs - Host-facing command layer
//
// Commands take JSON-shaped request structs and return `Result<_, String>`
// so they can be wired straight into a desktop host's IPC handler. Errors
// are flattened to their display text at this boundary.

pub mod chain;

use crate::eval::cache::EvalCache;
use crate::schema::LayoutConfig;

pub use chain::{
    connector_paths, evaluate_equation, run_chain, set_node_equation, sweep_chain,
    validate_equation,
};

/// State shared by all commands: caches and the connector layout.
#[derive(Default)]
pub struct ChainState {
    pub cache: EvalCache,
    pub layout: LayoutConfig,
}

impl ChainState {
    pub fn new(layout: LayoutConfig, cache_capacity: usize) -> Self {
        Self {
            cache: EvalCache::new(cache_capacity),
            layout,
        }
    }
}
