//! Static task graph declaration.
//!
//! The pipeline's dependency structure is data, not control flow: nodes and
//! edges live in a petgraph `DiGraph`, validated up front, and the executor
//! follows the declared ordering.

use crate::error::PipelineError;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The five pipeline tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskNode {
    Preprocess,
    TrainBasic,
    TrainCrossVal,
    TrainResNet,
    Compare,
}

impl fmt::Display for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskNode::Preprocess => "preprocess",
            TaskNode::TrainBasic => "train_basic",
            TaskNode::TrainCrossVal => "train_crossval",
            TaskNode::TrainResNet => "train_resnet",
            TaskNode::Compare => "compare",
        };
        f.write_str(name)
    }
}

/// The declared task graph: tasks as nodes, data hand-offs as edges.
pub struct TaskGraph {
    graph: DiGraph<TaskNode, ()>,
    indices: HashMap<TaskNode, NodeIndex>,
}

impl TaskGraph {
    /// The standard pipeline shape:
    /// `preprocess -> {train_basic, train_crossval, train_resnet} -> compare`.
    pub fn standard() -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        for node in [
            TaskNode::Preprocess,
            TaskNode::TrainBasic,
            TaskNode::TrainCrossVal,
            TaskNode::TrainResNet,
            TaskNode::Compare,
        ] {
            indices.insert(node, graph.add_node(node));
        }
        for train in [
            TaskNode::TrainBasic,
            TaskNode::TrainCrossVal,
            TaskNode::TrainResNet,
        ] {
            graph.add_edge(indices[&TaskNode::Preprocess], indices[&train], ());
            graph.add_edge(indices[&train], indices[&TaskNode::Compare], ());
        }
        Self { graph, indices }
    }

    /// Tasks a node waits on before it may start.
    pub fn dependencies(&self, node: TaskNode) -> Vec<TaskNode> {
        self.graph
            .neighbors_directed(self.indices[&node], Direction::Incoming)
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// The three training nodes, in candidate order.
    pub fn training_nodes(&self) -> [TaskNode; 3] {
        [
            TaskNode::TrainBasic,
            TaskNode::TrainCrossVal,
            TaskNode::TrainResNet,
        ]
    }

    /// A valid execution order. Fails if the declared graph has a cycle.
    pub fn execution_order(&self) -> Result<Vec<TaskNode>, PipelineError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.graph[idx]).collect())
            .map_err(|cycle| {
                PipelineError::config(format!(
                    "task graph has a cycle at {}",
                    self.graph[cycle.node_id()]
                ))
            })
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_graph_toposorts() {
        let graph = TaskGraph::standard();
        let order = graph.execution_order().unwrap();
        assert_eq!(order.len(), 5);

        let pos = |node: TaskNode| order.iter().position(|&n| n == node).unwrap();
        assert!(pos(TaskNode::Preprocess) < pos(TaskNode::TrainBasic));
        assert!(pos(TaskNode::Preprocess) < pos(TaskNode::TrainCrossVal));
        assert!(pos(TaskNode::Preprocess) < pos(TaskNode::TrainResNet));
        assert!(pos(TaskNode::TrainBasic) < pos(TaskNode::Compare));
        assert!(pos(TaskNode::TrainCrossVal) < pos(TaskNode::Compare));
        assert!(pos(TaskNode::TrainResNet) < pos(TaskNode::Compare));
    }

    #[test]
    fn compare_joins_all_three_trainings() {
        let graph = TaskGraph::standard();
        let deps = graph.dependencies(TaskNode::Compare);
        assert_eq!(deps.len(), 3);
        assert!(deps.contains(&TaskNode::TrainBasic));
        assert!(deps.contains(&TaskNode::TrainCrossVal));
        assert!(deps.contains(&TaskNode::TrainResNet));
    }

    #[test]
    fn trainings_depend_only_on_preprocess() {
        let graph = TaskGraph::standard();
        for node in graph.training_nodes() {
            assert_eq!(graph.dependencies(node), vec![TaskNode::Preprocess]);
        }
        assert!(graph.dependencies(TaskNode::Preprocess).is_empty());
    }
}
