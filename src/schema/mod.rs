// schema/mod.rs - Chain configuration
//
// The host describes a chain as JSON: the node table, the execution order,
// the starting value of `x` and the connector layout constants. Every field
// except `nodes` has a default; the defaults reproduce the reference
// five-node card layout.

use crate::error::ChainError;
use crate::eval::chain::{Chain, FunctionNode, NodeId};
use crate::eval::paths::Point;
use serde::{Deserialize, Serialize};

/// Horizontal inset from an anchor edge into its connector dot.
pub const DEFAULT_ANCHOR_INSET: f64 = 8.0;
/// Depth of the "U" dip of quadratic connectors below the lower endpoint.
pub const DEFAULT_BULGE_DEPTH: f64 = 50.0;
/// Fixed "S" control points of the cubic connector (node 2 → node 4).
pub const DEFAULT_CUBIC_CONTROL_1: Point = Point::new(1029.0, 556.0);
pub const DEFAULT_CUBIC_CONTROL_2: Point = Point::new(771.0, 525.0);
/// Fixed control point of the bottom-to-top connector (node 5 → node 3).
pub const DEFAULT_BOTTOM_TOP_CONTROL: Point = Point::new(1264.0, 571.0);
/// Starting value of `x` in the reference chain.
pub const DEFAULT_INITIAL_INPUT: f64 = 2.0;

fn default_anchor_inset() -> f64 {
    DEFAULT_ANCHOR_INSET
}

fn default_bulge_depth() -> f64 {
    DEFAULT_BULGE_DEPTH
}

fn default_cubic_control_1() -> Point {
    DEFAULT_CUBIC_CONTROL_1
}

fn default_cubic_control_2() -> Point {
    DEFAULT_CUBIC_CONTROL_2
}

fn default_bottom_top_control() -> Point {
    DEFAULT_BOTTOM_TOP_CONTROL
}

fn default_initial_input() -> f64 {
    DEFAULT_INITIAL_INPUT
}

/// Constants used by the connector path builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    #[serde(default = "default_anchor_inset")]
    pub anchor_inset: f64,
    #[serde(default = "default_bulge_depth")]
    pub bulge_depth: f64,
    #[serde(default = "default_cubic_control_1")]
    pub cubic_control_1: Point,
    #[serde(default = "default_cubic_control_2")]
    pub cubic_control_2: Point,
    #[serde(default = "default_bottom_top_control")]
    pub bottom_top_control: Point,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            anchor_inset: DEFAULT_ANCHOR_INSET,
            bulge_depth: DEFAULT_BULGE_DEPTH,
            cubic_control_1: DEFAULT_CUBIC_CONTROL_1,
            cubic_control_2: DEFAULT_CUBIC_CONTROL_2,
            bottom_top_control: DEFAULT_BOTTOM_TOP_CONTROL,
        }
    }
}

/// A complete chain description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub nodes: Vec<FunctionNode>,
    /// Evaluation sequence. When absent, nodes run in the order listed.
    #[serde(default)]
    pub execution_order: Option<Vec<NodeId>>,
    #[serde(default = "default_initial_input")]
    pub initial_input: f64,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl ChainConfig {
    /// The reference chain: five cards, evaluated 1 → 2 → 4 → 5 → 3.
    pub fn reference() -> Self {
        Self {
            nodes: vec![
                FunctionNode::new(1, "x^2", Some(2), Some("quadratic")),
                FunctionNode::new(2, "2*x+4", Some(4), Some("cubic")),
                FunctionNode::new(3, "x^2+20", None, None),
                FunctionNode::new(4, "x-2", Some(5), Some("quadratic")),
                FunctionNode::new(5, "x/2", Some(3), Some("bottomTopQuadratic")),
            ],
            execution_order: Some(vec![1, 2, 4, 5, 3]),
            initial_input: DEFAULT_INITIAL_INPUT,
            layout: LayoutConfig::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The effective execution order.
    pub fn order(&self) -> Vec<NodeId> {
        match &self.execution_order {
            Some(order) => order.clone(),
            None => self.nodes.iter().map(|n| n.id).collect(),
        }
    }

    /// Validate the configuration and build a `Chain` from it.
    pub fn build(&self) -> Result<Chain, ChainError> {
        Chain::new(self.nodes.clone(), self.order())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::reference()
    }
}
