//! Function chain engine.
//!
//! A scalar flows from an initial input through an ordered sequence of
//! single-variable equations. This crate validates and evaluates those
//! equations, runs the chain in a fixed execution order, and builds the SVG
//! connector paths a host draws between the function cards.

pub mod commands;
pub mod error;
pub mod eval;
pub mod schema;

pub use error::{ChainError, EquationError, SyntaxError};
pub use eval::chain::{
    final_output, run_chain, set_node_equation, Chain, FunctionNode, NodeId, NodeTable,
};
pub use eval::equation::{evaluate_equation, try_evaluate, validate_equation};
pub use eval::paths::{build_connector_path, build_path, Anchor, PathShape};
pub use schema::{ChainConfig, LayoutConfig};
