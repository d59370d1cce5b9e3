// error.rs - Error types for equation handling and chain construction

use crate::eval::chain::NodeId;
use thiserror::Error;

/// Why an equation failed the syntactic guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("character '{ch}' at position {position} is not allowed (use x, digits, + - * / ^ and parentheses)")]
    DisallowedCharacter { ch: char, position: usize },

    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParentheses { position: usize },
}

/// Failure to evaluate an equation that may or may not have passed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EquationError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("equation ends unexpectedly")]
    UnexpectedEnd,

    #[error("unexpected input after expression at position {position}")]
    TrailingInput { position: usize },

    #[error("number literal '{literal}' is out of range")]
    InvalidNumber { literal: String },

    #[error("equation nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("result is not a finite number ({value})")]
    NonFinite { value: f64 },
}

/// Errors raised while building or editing a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("node id must be a positive integer, got {0}")]
    InvalidNodeId(NodeId),

    #[error("node {0} is defined more than once")]
    DuplicateNode(NodeId),

    #[error("node {node} points at unknown successor {next}")]
    UnknownSuccessor { node: NodeId, next: NodeId },

    #[error("execution order must list every node exactly once: {reason}")]
    OrderMismatch { reason: String },

    #[error("no node with id {0}")]
    UnknownNode(NodeId),

    #[error("invalid equation for node {id}: {source}")]
    InvalidEquation {
        id: NodeId,
        #[source]
        source: SyntaxError,
    },

    #[error("invalid chain configuration: {0}")]
    Config(#[from] serde_json::Error),
}
