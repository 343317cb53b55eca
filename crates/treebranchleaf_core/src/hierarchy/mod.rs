//! Tree structure engine: node store, nesting rules, drop placement,
//! sibling reordering and integrity checks.

pub mod integrity;
pub mod placement;
pub mod reorder;
pub mod rules;
pub mod store;
