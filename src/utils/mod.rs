//! Shared utilities that are not specific to the IR.

pub mod graph;
