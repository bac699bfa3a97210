//! The per-session graph of evaluated requests.
//!
//! Every memoized request is a node; an edge `a -> b` records that the rule for
//! `a` awaited `b`. Adding an edge that would close a cycle is refused and the
//! offending chain is returned instead, so a cyclic request never deadlocks.

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};

const MAX_LABEL_LEN: usize = 160;

#[derive(Debug, Default)]
pub(crate) struct RuleGraph {
  graph: DiGraph<String, ()>,
}

impl RuleGraph {
  pub(crate) fn add_node(&mut self, label: String) -> NodeIndex {
    self.graph.add_node(truncate(label))
  }

  /// Record that `caller` depends on `callee`.
  ///
  /// # Errors
  ///
  /// Returns the node labels along the cycle, starting and ending at `caller`,
  /// when `callee` already (transitively) depends on `caller`.
  pub(crate) fn add_dependency(&mut self, caller: NodeIndex, callee: NodeIndex) -> Result<(), Vec<String>> {
    if let Some((_, path)) = astar(&self.graph, callee, |n| n == caller, |_| 1usize, |_| 0) {
      let mut chain = vec![self.graph[caller].clone()];
      chain.extend(path.into_iter().map(|idx| self.graph[idx].clone()));
      return Err(chain);
    }
    self.graph.update_edge(caller, callee, ());
    Ok(())
  }

  pub(crate) fn node_count(&self) -> usize {
    self.graph.node_count()
  }

  pub(crate) fn edges(&self) -> Vec<(String, String)> {
    self
      .graph
      .raw_edges()
      .iter()
      .map(|e| (self.graph[e.source()].clone(), self.graph[e.target()].clone()))
      .collect()
  }
}

fn truncate(mut label: String) -> String {
  if label.len() > MAX_LABEL_LEN {
    let mut cut = MAX_LABEL_LEN;
    while !label.is_char_boundary(cut) {
      cut -= 1;
    }
    label.truncate(cut);
    label.push_str("...");
  }
  label
}
