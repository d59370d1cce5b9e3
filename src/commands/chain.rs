use crate::commands::ChainState;
use crate::eval::chain::{self, FunctionNode, NodeId, NodeTable};
use crate::eval::equation;
use crate::eval::paths::{self, AnchorMap, Connector};
use crate::eval::sweep::{self, SweepResult};
use serde::{Deserialize, Serialize};

/// Turn the node list sent by the host into a table, rejecting duplicates.
fn into_table(nodes: Vec<FunctionNode>) -> Result<NodeTable, String> {
    let mut table = NodeTable::default();
    for node in nodes {
        let id = node.id;
        if table.insert(id, node).is_some() {
            return Err(format!("node {id} is defined more than once"));
        }
    }
    Ok(table)
}

/// Table → list sorted by id, so responses are stable.
fn into_sorted(table: NodeTable) -> Vec<FunctionNode> {
    let mut nodes: Vec<FunctionNode> = table.into_values().collect();
    nodes.sort_by_key(|n| n.id);
    nodes
}

// ── Equations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub equation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    /// Warning to show the user when `valid` is false.
    pub message: Option<String>,
}

/// Check an equation before the host commits an edit.
pub fn validate_equation(request: ValidateRequest) -> ValidateResponse {
    match equation::check_syntax(&request.equation) {
        Ok(()) => ValidateResponse {
            valid: true,
            message: None,
        },
        Err(err) => ValidateResponse {
            valid: false,
            message: Some(format!("Invalid equation: {err}")),
        },
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub x: f64,
    pub equation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateResponse {
    pub value: f64,
    /// Set when evaluation failed and `value` fell back to 0.
    pub error: Option<String>,
}

/// Evaluate one equation. Never fails; see `EvaluateResponse::error`.
pub fn evaluate_equation(request: EvaluateRequest) -> EvaluateResponse {
    match equation::try_evaluate(request.x, &request.equation) {
        Ok(value) => EvaluateResponse { value, error: None },
        Err(err) => {
            log::warn!("failed to evaluate '{}': {err}", request.equation);
            EvaluateResponse {
                value: 0.0,
                error: Some(err.to_string()),
            }
        }
    }
}

// ── Chain ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunChainRequest {
    pub initial_input: f64,
    pub nodes: Vec<FunctionNode>,
    pub execution_order: Vec<NodeId>,
    /// Snapshot the host currently renders, for change detection.
    #[serde(default)]
    pub previous: Option<Vec<FunctionNode>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunChainResponse {
    /// Updated nodes, sorted by id.
    pub nodes: Vec<FunctionNode>,
    pub final_output: Option<f64>,
    /// `false` when the result equals `previous`; the host can skip
    /// re-rendering.
    pub changed: bool,
}

/// Evaluate the chain from `initial_input`.
pub fn run_chain(state: &ChainState, request: RunChainRequest) -> Result<RunChainResponse, String> {
    let nodes = into_table(request.nodes)?;
    let updated = state
        .cache
        .run_chain(request.initial_input, &nodes, &request.execution_order);

    let changed = match request.previous {
        Some(previous) => chain::snapshot_changed(&into_table(previous)?, &updated),
        None => true,
    };
    let final_output = chain::final_output(&updated, &request.execution_order);

    Ok(RunChainResponse {
        nodes: into_sorted(updated.as_ref().clone()),
        final_output,
        changed,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetEquationRequest {
    pub nodes: Vec<FunctionNode>,
    pub id: NodeId,
    pub equation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetEquationResponse {
    pub nodes: Vec<FunctionNode>,
}

/// Commit an equation edit. The error string is the warning to show the
/// user; the host keeps its current nodes in that case.
pub fn set_node_equation(request: SetEquationRequest) -> Result<SetEquationResponse, String> {
    let nodes = into_table(request.nodes)?;
    let updated = chain::set_node_equation(&nodes, request.id, &request.equation)
        .map_err(|e| e.to_string())?;
    Ok(SetEquationResponse {
        nodes: into_sorted(updated),
    })
}

// ── Connectors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorRequest {
    pub nodes: Vec<FunctionNode>,
    /// Measured anchors per node id.
    #[serde(default)]
    pub anchors: AnchorMap,
}

/// Build the connector paths for every measured link.
pub fn connector_paths(
    state: &ChainState,
    request: ConnectorRequest,
) -> Result<Vec<Connector>, String> {
    let nodes = into_table(request.nodes)?;
    Ok(paths::connector_paths(&nodes, &request.anchors, &state.layout))
}

// ── Sweep ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    pub nodes: Vec<FunctionNode>,
    pub execution_order: Vec<NodeId>,
    pub range_min: f64,
    pub range_max: f64,
    pub samples: u32,
}

/// Upper bound on sweep samples per request.
pub const MAX_SWEEP_SAMPLES: u32 = 65_536;

/// Evaluate the final output over a range of initial inputs.
pub fn sweep_chain(state: &ChainState, request: SweepRequest) -> Result<SweepResult, String> {
    if request.samples > MAX_SWEEP_SAMPLES {
        return Err(format!(
            "too many samples: {} (max {MAX_SWEEP_SAMPLES})",
            request.samples
        ));
    }
    if !(request.range_min.is_finite() && request.range_max.is_finite()) {
        return Err("sweep range must be finite".into());
    }

    let nodes = into_table(request.nodes)?;
    let steps = state.cache.compile_steps(&nodes, &request.execution_order);
    Ok(sweep::sweep_steps(
        &steps,
        request.range_min,
        request.range_max,
        request.samples,
    ))
}
