//! Dependency graph building, topological ordering, and visual export

use crate::error::{CoreError, CoreResult};
use crate::model::ModelDescriptor;
use crate::model_name::ModelName;
use crate::registry::ModelRegistry;
use crate::task::Task;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

/// A directed graph of "must complete before" relationships between models.
///
/// Edges point from a dependency to its dependent, so a topological order
/// lists dependencies first.
#[derive(Debug, Clone, Default)]
pub struct ModelDag {
    graph: DiGraph<ModelName, ()>,
    node_map: HashMap<ModelName, NodeIndex>,
}

/// Flattened node/edge projection for graph renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualElements {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualEdge {
    pub source: String,
    pub target: String,
}

impl VisualElements {
    /// Cytoscape element JSON: every node and edge wrapped in a `data` object
    pub fn to_cytoscape(&self) -> serde_json::Value {
        serde_json::json!({
            "nodes": self.nodes.iter().map(|n| serde_json::json!({ "data": n })).collect::<Vec<_>>(),
            "edges": self.edges.iter().map(|e| serde_json::json!({ "data": e })).collect::<Vec<_>>(),
        })
    }
}

impl ModelDag {
    /// Create a new empty DAG
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a set of tasks.
    ///
    /// Every task's model becomes a node; each declared dependency adds an
    /// edge, creating the dependency node if no task backs it.
    pub fn from_tasks(tasks: &[Task]) -> CoreResult<Self> {
        Self::from_descriptors(tasks.iter().map(|task| &task.model))
    }

    /// Build the graph from every model in a registry, in registration order
    pub fn from_registry(registry: &ModelRegistry) -> CoreResult<Self> {
        Self::from_descriptors(registry.iter())
    }

    fn from_descriptors<'a>(
        models: impl IntoIterator<Item = &'a Arc<dyn ModelDescriptor>>,
    ) -> CoreResult<Self> {
        let mut dag = Self::new();
        for model in models {
            let name = model.unique_name();
            dag.add_model(name)?;
            for dep in model.dependencies() {
                dag.add_dependency(name, dep)?;
            }
        }
        Ok(dag)
    }

    /// Build the graph from a map of model name -> dependency names.
    ///
    /// Keys are inserted in sorted order so the result does not depend on
    /// hash map iteration order.
    pub fn build(dependencies: &HashMap<String, Vec<String>>) -> CoreResult<Self> {
        let mut dag = Self::new();

        let mut models: Vec<&String> = dependencies.keys().collect();
        models.sort();

        for model in &models {
            dag.add_model(model)?;
        }
        for model in models {
            for dep in &dependencies[model] {
                dag.add_dependency(model, dep)?;
            }
        }

        Ok(dag)
    }

    /// Add a model to the DAG, returning its existing node if already present
    pub fn add_model(&mut self, name: &str) -> CoreResult<NodeIndex> {
        if let Some(&idx) = self.node_map.get(name) {
            return Ok(idx);
        }
        let model_name = ModelName::parse(name, "model name in DAG")?;
        let idx = self.graph.add_node(model_name.clone());
        self.node_map.insert(model_name, idx);
        Ok(idx)
    }

    /// Record that `model` depends on `dependency`
    pub fn add_dependency(&mut self, model: &str, dependency: &str) -> CoreResult<()> {
        if model == dependency {
            return Err(CoreError::SelfDependency {
                name: model.to_string(),
            });
        }
        let model_idx = self.add_model(model)?;
        let dep_idx = self.add_model(dependency)?;
        if !self.graph.contains_edge(dep_idx, model_idx) {
            self.graph.add_edge(dep_idx, model_idx, ());
        }
        Ok(())
    }

    /// Models in dependency order (Kahn's algorithm).
    ///
    /// Among models that are ready at the same time, the one inserted first
    /// comes first. Fails with [`CoreError::CircularDependency`] if any
    /// models remain after the ready set drains.
    pub fn topological_order(&self) -> CoreResult<Vec<ModelName>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(self.graph[idx].clone());
            for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
                let target = edge.target();
                in_degree[target.index()] -= 1;
                if in_degree[target.index()] == 0 {
                    ready.push(Reverse(target));
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let residual: HashSet<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|idx| in_degree[idx.index()] > 0)
                .collect();
            return Err(CoreError::CircularDependency {
                cycle: self.find_cycle_path(&residual),
            });
        }

        Ok(order)
    }

    /// Describe one cycle among nodes Kahn's algorithm could not order.
    ///
    /// Every residual node has a residual predecessor, so walking
    /// predecessors must revisit a node.
    fn find_cycle_path(&self, residual: &HashSet<NodeIndex>) -> String {
        let Some(&start) = residual.iter().min() else {
            return String::new();
        };

        let mut walk: Vec<NodeIndex> = Vec::new();
        let mut position: HashMap<NodeIndex, usize> = HashMap::new();
        let mut current = start;

        let cycle_start = loop {
            if let Some(&pos) = position.get(&current) {
                break pos;
            }
            position.insert(current, walk.len());
            walk.push(current);

            match self
                .graph
                .neighbors_directed(current, Direction::Incoming)
                .filter(|n| residual.contains(n))
                .min()
            {
                Some(prev) => current = prev,
                None => break walk.len() - 1,
            }
        };

        // The walk followed edges backwards; flip it to read in edge direction.
        let mut names: Vec<String> = walk[cycle_start..]
            .iter()
            .rev()
            .map(|idx| self.graph[*idx].to_string())
            .collect();
        if let Some(first) = names.first().cloned() {
            names.push(first);
        }
        names.join(" -> ")
    }

    /// Validate that a topological order exists
    pub fn validate(&self) -> CoreResult<()> {
        self.topological_order().map(|_| ())
    }

    /// The first model in topological order: an ultimate upstream model
    /// with no dependencies. `None` for an empty graph.
    ///
    /// Orders the whole graph, so a cycle anywhere fails with
    /// [`CoreError::CircularDependency`] just like [`Self::topological_order`].
    pub fn root(&self) -> CoreResult<Option<ModelName>> {
        Ok(self.topological_order()?.into_iter().next())
    }

    /// Node/edge projection for rendering. Pure: repeated calls on an
    /// unchanged graph return identical output.
    pub fn to_visual_elements(&self) -> VisualElements {
        let nodes = self
            .graph
            .node_indices()
            .map(|idx| {
                let name = self.graph[idx].to_string();
                VisualNode {
                    id: name.clone(),
                    label: name,
                }
            })
            .collect();

        let edges = self
            .graph
            .edge_references()
            .map(|edge| VisualEdge {
                source: self.graph[edge.source()].to_string(),
                target: self.graph[edge.target()].to_string(),
            })
            .collect();

        VisualElements { nodes, edges }
    }

    /// Direct dependencies of a model, in insertion order
    pub fn dependencies(&self, model: &str) -> Vec<ModelName> {
        self.neighbors(model, Direction::Incoming)
    }

    /// Direct dependents of a model, in insertion order
    pub fn dependents(&self, model: &str) -> Vec<ModelName> {
        self.neighbors(model, Direction::Outgoing)
    }

    fn neighbors(&self, model: &str, direction: Direction) -> Vec<ModelName> {
        let Some(&idx) = self.node_map.get(model) else {
            return Vec::new();
        };
        let mut indices: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        indices.sort();
        indices
            .into_iter()
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// All model names, in insertion order
    pub fn models(&self) -> Vec<ModelName> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Check if a model exists in the DAG
    pub fn contains(&self, model: &str) -> bool {
        self.node_map.contains_key(model)
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of dependency edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
#[path = "dag_test.rs"]
mod tests;
