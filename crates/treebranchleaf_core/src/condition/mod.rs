//! Condition sub-language: expressions, operand tokens and per-node
//! condition sets.

pub mod expr;
pub mod set;
pub mod token;
