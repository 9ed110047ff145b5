//! Graph algorithms used by the control-flow analyses.
//!
//! ## Traversal
//!
//! - [`dfs`] - Depth-first pre-order
//! - [`postorder`] / [`reverse_postorder`] - Orders for dataflow iteration
//!
//! ## Dominator Analysis
//!
//! - [`compute_dominators`] - Iterative (Cooper-Harvey-Kennedy) dominator tree
//! - [`compute_dominance_frontiers`] - Dominance frontiers for phi placement
//! - [`DominatorTree`] - Result of dominator computation
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | DFS / post-order | O(V + E) | Block ordering |
//! | Dominators | O(d(V + E)), d = loop nesting | SSA construction |
//! | Frontiers | O(V + E + size of frontiers) | Phi placement |

mod dominators;
mod traversal;

pub use dominators::{
    compute_dominance_frontiers, compute_dominators, DominatorIterator, DominatorTree,
};
pub use traversal::{dfs, postorder, reverse_postorder, DfsIterator};
