// eval/sweep.rs - Final chain output over a range of initial inputs
//
// Samples `[range_min, range_max]` at cell centres and runs the whole chain
// for each sample. Equations are compiled once up front; samples are
// independent and evaluated in parallel with rayon. Each individual pass is
// still strictly sequential.

use crate::eval::chain::{compile_steps, final_value, CompiledStep, NodeId, NodeTable};
use rayon::prelude::*;
use serde::Serialize;

/// Result of sweeping the initial input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    /// Initial input of each sample.
    pub inputs: Vec<f64>,
    /// Final chain output of each sample.
    pub outputs: Vec<f64>,
    /// Minimum output (for normalization); 0 when empty.
    pub min_value: f64,
    /// Maximum output (for normalization); 0 when empty.
    pub max_value: f64,
}

/// Sweep the chain described by `nodes` and `order`.
pub fn evaluate_sweep(
    nodes: &NodeTable,
    order: &[NodeId],
    range_min: f64,
    range_max: f64,
    samples: u32,
) -> SweepResult {
    let steps = compile_steps(nodes, order);
    sweep_steps(&steps, range_min, range_max, samples)
}

/// Sweep already compiled steps.
pub fn sweep_steps(
    steps: &[CompiledStep],
    range_min: f64,
    range_max: f64,
    samples: u32,
) -> SweepResult {
    let n = samples as usize;
    if n == 0 {
        return SweepResult {
            inputs: Vec::new(),
            outputs: Vec::new(),
            min_value: 0.0,
            max_value: 0.0,
        };
    }

    // Samples stay finite for any finite bounds.
    let inputs: Vec<f64> = (0..n)
        .map(|i| {
            let t = (i as f64 + 0.5) / n as f64;
            range_min * (1.0 - t) + range_max * t
        })
        .collect();

    let outputs: Vec<f64> = inputs
        .par_iter()
        .map(|&x| final_value(steps, x))
        .collect();

    let (min_value, max_value) = outputs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    SweepResult {
        inputs,
        outputs,
        min_value,
        max_value,
    }
}
