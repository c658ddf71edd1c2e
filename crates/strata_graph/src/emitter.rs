//! Topological emitter.
//!
//! Orders a stack so that every resource follows everything it depends on
//! (explicit `depends_on` edges plus every reference in its property tree)
//! and produces a [`SerializedDocument`].
//!
//! The walk is a depth-first search that visits roots in declaration order
//! and each node's edge targets in declaration order too, so identical
//! input always yields identical output.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{GraphError, GraphResult};
use crate::node::ResourceNode;
use crate::schema::SchemaRegistry;
use crate::stack::{Output, Stack};
use crate::value::Properties;

/// One resource in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedResource {
    pub logical_id: String,
    pub resource_type: String,
    pub properties: Properties,
    /// Explicit dependencies only, in declaration order.
    pub depends_on: Vec<String>,
    pub attributes: Properties,
}

/// The ordered, resolved form of a stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SerializedDocument {
    pub description: Option<String>,
    pub resources: Vec<EmittedResource>,
    pub outputs: IndexMap<String, Output>,
}

impl SerializedDocument {
    /// Logical ids in emission order.
    pub fn order(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.logical_id.as_str()).collect()
    }

    pub fn resource(&self, logical_id: &str) -> Option<&EmittedResource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn position(&self, logical_id: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.logical_id == logical_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Emits stacks, optionally checking each resource against schemas.
#[derive(Debug, Default)]
pub struct Emitter {
    schemas: Option<SchemaRegistry>,
}

impl Emitter {
    pub fn new() -> Self {
        Self { schemas: None }
    }

    /// Validate every emitted resource against `schemas`.
    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Order, check and serialize `stack`. No partial document is returned on failure.
    pub fn emit(&self, stack: &Stack) -> GraphResult<SerializedDocument> {
        let nodes: Vec<&ResourceNode> = stack.nodes().collect();
        let edges = resolve_edges(stack, &nodes)?;
        let order = topological_order(&nodes, &edges)?;

        let mut resources = Vec::with_capacity(order.len());
        for index in order {
            let node = nodes[index];
            if let Some(schemas) = &self.schemas {
                schemas.check_node(node)?;
            }
            debug!("Emitting {} ({})", node.logical_id, node.resource_type);
            resources.push(emitted(stack, node));
        }

        for (name, output) in stack.outputs() {
            if let Some(missing) = output
                .value
                .references()
                .into_iter()
                .find(|r| !stack.contains(&r.target))
            {
                return Err(GraphError::UnresolvedOutput {
                    output: name.clone(),
                    target: missing.target.clone(),
                });
            }
        }

        info!(
            "Emitted stack {} with {} resources and {} outputs",
            stack.name(),
            resources.len(),
            stack.outputs().len()
        );

        Ok(SerializedDocument {
            description: stack.description().map(str::to_string),
            resources,
            outputs: stack.outputs().clone(),
        })
    }
}

/// Emit with the default emitter.
pub fn emit(stack: &Stack) -> GraphResult<SerializedDocument> {
    Emitter::new().emit(stack)
}

/// Edge targets of every node as declaration indices, sorted.
fn resolve_edges(stack: &Stack, nodes: &[&ResourceNode]) -> GraphResult<Vec<Vec<usize>>> {
    nodes
        .iter()
        .map(|node| {
            let mut targets = node
                .edges()
                .into_iter()
                .map(|target| {
                    stack
                        .position(target)
                        .ok_or_else(|| GraphError::UnresolvedReference {
                            source_id: node.logical_id.clone(),
                            target: target.to_string(),
                        })
                })
                .collect::<GraphResult<Vec<usize>>>()?;
            targets.sort_unstable();
            targets.dedup();
            Ok(targets)
        })
        .collect()
}

/// Depth-first post-order over `edges`, roots and children in index order.
fn topological_order(nodes: &[&ResourceNode], edges: &[Vec<usize>]) -> GraphResult<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut path: Vec<usize> = Vec::new();

    for root in 0..nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // Explicit stack of (node, next edge to look at) instead of recursion.
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::InProgress;
        path.push(root);

        while let Some(frame) = stack.last_mut() {
            let (current, cursor) = *frame;
            if let Some(&next) = edges[current].get(cursor) {
                frame.1 += 1;
                match marks[next] {
                    Mark::Done => {}
                    Mark::Unvisited => {
                        marks[next] = Mark::InProgress;
                        path.push(next);
                        stack.push((next, 0));
                    }
                    Mark::InProgress => {
                        let start = path.iter().position(|&p| p == next).unwrap_or(0);
                        let cycle = path[start..]
                            .iter()
                            .map(|&i| nodes[i].logical_id.clone())
                            .collect();
                        return Err(GraphError::CyclicDependency { cycle });
                    }
                }
            } else {
                marks[current] = Mark::Done;
                order.push(current);
                path.pop();
                stack.pop();
            }
        }
    }

    Ok(order)
}

fn emitted(stack: &Stack, node: &ResourceNode) -> EmittedResource {
    let mut depends_on: Vec<&String> = node.depends_on.iter().collect();
    depends_on.sort_by_key(|id| stack.position(id));

    EmittedResource {
        logical_id: node.logical_id.clone(),
        resource_type: node.resource_type.clone(),
        properties: node.properties.clone(),
        depends_on: depends_on.into_iter().cloned().collect(),
        attributes: node.attributes.clone(),
    }
}
