//! Stack template: one deployable unit of resources and outputs.

use indexmap::IndexMap;

use crate::emitter::{Emitter, SerializedDocument};
use crate::error::GraphResult;
use crate::logical_id::sanitize_hint;
use crate::node::ResourceNode;
use crate::overrides::{self, OverridePatch};
use crate::value::PropertyValue;

/// A named stack output.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: PropertyValue,
    pub description: Option<String>,
    pub export_name: Option<String>,
}

impl Output {
    pub fn new(value: PropertyValue) -> Self {
        Self {
            value,
            description: None,
            export_name: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn export_name(mut self, name: impl Into<String>) -> Self {
        self.export_name = Some(name.into());
        self
    }
}

/// A frozen collection of resource declarations.
///
/// Stacks are produced by [`StackBuilder::build`](crate::StackBuilder::build).
/// After that the only mutation allowed is [`Stack::apply_override`].
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    name: String,
    description: Option<String>,
    nodes: IndexMap<String, ResourceNode>,
    outputs: IndexMap<String, Output>,
}

impl Stack {
    pub(crate) fn from_parts(
        name: String,
        description: Option<String>,
        nodes: IndexMap<String, ResourceNode>,
        outputs: IndexMap<String, Output>,
    ) -> Self {
        Self {
            name,
            description,
            nodes,
            outputs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn node(&self, logical_id: &str) -> Option<&ResourceNode> {
        self.nodes.get(logical_id)
    }

    pub(crate) fn node_mut(&mut self, logical_id: &str) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(logical_id)
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.nodes.contains_key(logical_id)
    }

    /// Declaration index of a node.
    pub fn position(&self, logical_id: &str) -> Option<usize> {
        self.nodes.get_index_of(logical_id)
    }

    pub fn outputs(&self) -> &IndexMap<String, Output> {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    pub fn find_by_type(&self, resource_type: &str) -> Vec<&ResourceNode> {
        self.nodes
            .values()
            .filter(|n| n.resource_type == resource_type)
            .collect()
    }

    /// Generated ids that were declared with `hint`.
    pub fn ids_with_hint(&self, hint: &str) -> Vec<&str> {
        let hint = sanitize_hint(hint);
        self.nodes
            .keys()
            .filter(|id| {
                id.strip_prefix(hint.as_str())
                    .is_some_and(|rest| rest.len() == 8 && rest.chars().all(|c| c.is_ascii_hexdigit()))
            })
            .map(String::as_str)
            .collect()
    }

    /// Apply one override patch. See [`overrides::apply_override`].
    pub fn apply_override(&mut self, patch: &OverridePatch) -> GraphResult<()> {
        overrides::apply_override(self, patch)
    }

    /// Emit with the default emitter.
    pub fn emit(&self) -> GraphResult<SerializedDocument> {
        Emitter::new().emit(self)
    }
}
