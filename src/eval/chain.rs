// eval/chain.rs - Node table + execution order → evaluated chain
//
// A chain is a table of function nodes keyed by id plus an execution order
// supplied from outside. `nextFunction` links only describe how the host
// draws connectors; they never decide evaluation order.
//
// Evaluation compiles every equation in the order once (`compile_steps`) and
// then folds the running value through the steps. Missing ids are skipped
// and failing steps output zero, so a pass always runs to the end.

use crate::error::{ChainError, EquationError};
use crate::eval::compiled::{compile, CompiledEquation};
use crate::eval::equation::check_syntax;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Stable identifier of a function node.
pub type NodeId = u32;

/// All nodes of a chain keyed by id.
pub type NodeTable = FxHashMap<NodeId, FunctionNode>;

/// Evaluation sequence of node ids.
pub type ExecutionOrder = SmallVec<[NodeId; 8]>;

/// Outcome of compiling one equation; shared so caches can hand it out.
pub type CompileResult = Result<CompiledEquation, EquationError>;

/// One step of the chain, as exchanged with the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNode {
    pub id: NodeId,
    pub equation: String,
    /// Downstream node, `None` for the terminal node.
    #[serde(default)]
    pub next_function: Option<NodeId>,
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
    /// Connector curve family towards `next_function` (see `paths::PathShape`).
    #[serde(default, alias = "path")]
    pub path_shape: Option<String>,
}

impl FunctionNode {
    pub fn new(
        id: NodeId,
        equation: impl Into<String>,
        next_function: Option<NodeId>,
        path_shape: Option<&str>,
    ) -> Self {
        Self {
            id,
            equation: equation.into(),
            next_function,
            input: 0.0,
            output: 0.0,
            path_shape: path_shape.map(str::to_string),
        }
    }
}

// ── Compiled steps ──────────────────────────────────────────────────

/// A node id paired with its compiled equation.
#[derive(Debug, Clone)]
pub struct CompiledStep {
    pub id: NodeId,
    program: Arc<CompileResult>,
}

impl CompiledStep {
    /// Output of this step for `input`, or `0.0` if the equation cannot be
    /// evaluated.
    pub fn apply(&self, input: f64) -> f64 {
        let result = match &*self.program {
            Ok(program) => program.evaluate(input),
            Err(err) => Err(err.clone()),
        };
        result.unwrap_or_else(|err| {
            log::trace!("node {}: evaluation failed at x = {input}, using 0: {err}", self.id);
            0.0
        })
    }
}

/// Compile the equations of every node named in `order`.
pub fn compile_steps(nodes: &NodeTable, order: &[NodeId]) -> Vec<CompiledStep> {
    compile_steps_with(nodes, order, |equation| Arc::new(compile(equation)))
}

/// Like `compile_steps`, but obtains compiled equations from `lookup`
/// (typically a cache).
pub fn compile_steps_with<F>(
    nodes: &NodeTable,
    order: &[NodeId],
    mut lookup: F,
) -> Vec<CompiledStep>
where
    F: FnMut(&str) -> Arc<CompileResult>,
{
    let mut steps = Vec::with_capacity(order.len());
    for &id in order {
        let Some(node) = nodes.get(&id) else {
            log::trace!("execution order references missing node {id}, skipping");
            continue;
        };
        let program = lookup(&node.equation);
        if let Err(err) = &*program {
            log::warn!(
                "node {id}: equation '{}' does not compile, outputs 0: {err}",
                node.equation
            );
        }
        steps.push(CompiledStep { id, program });
    }
    steps
}

/// Run `initial_input` through `steps` and return only the final value.
pub fn final_value(steps: &[CompiledStep], initial_input: f64) -> f64 {
    steps
        .iter()
        .fold(initial_input, |running, step| step.apply(running))
}

/// Run `initial_input` through `steps`, recording each node's input/output
/// in a copy of `nodes`.
pub fn apply_steps(steps: &[CompiledStep], nodes: &NodeTable, initial_input: f64) -> NodeTable {
    let mut updated = nodes.clone();
    let mut running = initial_input;
    for step in steps {
        if let Some(node) = updated.get_mut(&step.id) {
            node.input = running;
            running = step.apply(running);
            node.output = running;
        }
    }
    updated
}

// ── Chain operations ────────────────────────────────────────────────

/// Evaluate the chain in `order`, seeded with `initial_input`.
///
/// Returns a full snapshot. Ids in `order` that are not in `nodes` are
/// skipped; nodes not named in `order` are returned unchanged.
pub fn run_chain(initial_input: f64, nodes: &NodeTable, order: &[NodeId]) -> NodeTable {
    let steps = compile_steps(nodes, order);
    let updated = apply_steps(&steps, nodes, initial_input);
    log::debug!(
        "ran chain of {} steps from x = {initial_input} -> {:?}",
        steps.len(),
        final_output(&updated, order)
    );
    updated
}

/// Replace the equation of node `id` if it passes validation.
///
/// The node keeps its previous `input`/`output` until the next run.
pub fn set_node_equation(
    nodes: &NodeTable,
    id: NodeId,
    equation: &str,
) -> Result<NodeTable, ChainError> {
    check_syntax(equation).map_err(|source| ChainError::InvalidEquation { id, source })?;
    if !nodes.contains_key(&id) {
        return Err(ChainError::UnknownNode(id));
    }

    let mut updated = nodes.clone();
    if let Some(node) = updated.get_mut(&id) {
        node.equation = equation.to_string();
    }
    Ok(updated)
}

/// Output of the last node in `order` that exists in `nodes`.
pub fn final_output(nodes: &NodeTable, order: &[NodeId]) -> Option<f64> {
    order
        .iter()
        .rev()
        .find_map(|id| nodes.get(id))
        .map(|node| node.output)
}

/// `true` if the two snapshots differ in any field of any node.
#[inline]
pub fn snapshot_changed(previous: &NodeTable, next: &NodeTable) -> bool {
    previous != next
}

// ── Chain ───────────────────────────────────────────────────────────

/// A validated node table with its execution order.
///
/// Construction checks that ids are positive and unique, that every
/// `nextFunction` exists, that the order lists each node exactly once and
/// that every equation passes validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    nodes: NodeTable,
    order: ExecutionOrder,
}

impl Chain {
    pub fn new(
        nodes: Vec<FunctionNode>,
        order: impl IntoIterator<Item = NodeId>,
    ) -> Result<Self, ChainError> {
        let mut table = NodeTable::default();
        for node in nodes {
            if node.id == 0 {
                return Err(ChainError::InvalidNodeId(node.id));
            }
            check_syntax(&node.equation).map_err(|source| ChainError::InvalidEquation {
                id: node.id,
                source,
            })?;
            let id = node.id;
            if table.insert(id, node).is_some() {
                return Err(ChainError::DuplicateNode(id));
            }
        }

        for node in table.values() {
            if let Some(next) = node.next_function {
                if !table.contains_key(&next) {
                    return Err(ChainError::UnknownSuccessor {
                        node: node.id,
                        next,
                    });
                }
            }
        }

        let order: ExecutionOrder = order.into_iter().collect();
        let mut seen = FxHashSet::default();
        for &id in &order {
            if !table.contains_key(&id) {
                return Err(ChainError::OrderMismatch {
                    reason: format!("node {id} does not exist"),
                });
            }
            if !seen.insert(id) {
                return Err(ChainError::OrderMismatch {
                    reason: format!("node {id} appears more than once"),
                });
            }
        }
        if let Some(missing) = table.keys().find(|id| !seen.contains(*id)) {
            return Err(ChainError::OrderMismatch {
                reason: format!("node {missing} is never evaluated"),
            });
        }

        Ok(Self {
            nodes: table,
            order,
        })
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn node(&self, id: NodeId) -> Option<&FunctionNode> {
        self.nodes.get(&id)
    }

    /// Re-evaluate from `initial_input`. Returns `true` if any node changed.
    pub fn run(&mut self, initial_input: f64) -> bool {
        let updated = run_chain(initial_input, &self.nodes, &self.order);
        if snapshot_changed(&self.nodes, &updated) {
            self.nodes = updated;
            true
        } else {
            false
        }
    }

    /// Commit a validated equation edit. On error the chain is unchanged.
    pub fn set_equation(&mut self, id: NodeId, equation: &str) -> Result<(), ChainError> {
        self.nodes = set_node_equation(&self.nodes, id, equation)?;
        Ok(())
    }

    pub fn final_output(&self) -> Option<f64> {
        final_output(&self.nodes, &self.order)
    }

    pub fn into_parts(self) -> (NodeTable, ExecutionOrder) {
        (self.nodes, self.order)
    }
}
