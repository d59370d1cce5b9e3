pub mod cache;
pub mod chain;
pub mod compiled;
pub mod equation;
pub mod paths;
pub mod sweep;
