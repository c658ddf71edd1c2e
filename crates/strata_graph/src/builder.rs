//! Graph builder for declaring resources into a stack.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{GraphError, GraphResult};
use crate::logical_id::{validate_forced_id, IdAllocator};
use crate::node::{RemovalPolicy, ResourceHandle, ResourceNode};
use crate::overrides::{self, OverridePatch};
use crate::stack::{Output, Stack};
use crate::value::{Properties, PropertyValue};

/// Accumulates resource declarations for one stack.
///
/// Mutation is confined to the builder; [`StackBuilder::build`] hands
/// back a frozen [`Stack`]. References to nodes that are declared later
/// are accepted here and checked at emission.
#[derive(Debug)]
pub struct StackBuilder {
    name: String,
    description: Option<String>,
    nodes: IndexMap<String, ResourceNode>,
    outputs: IndexMap<String, Output>,
    ids: IdAllocator,
}

impl StackBuilder {
    /// Create a builder for a stack called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            ids: IdAllocator::new(name.clone()),
            name,
            description: None,
            nodes: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a resource under a generated logical id derived from `hint`.
    pub fn declare(
        &mut self,
        resource_type: impl Into<String>,
        hint: &str,
        properties: Properties,
    ) -> ResourceHandle {
        let resource_type = resource_type.into();
        let nodes = &self.nodes;
        let logical_id = self
            .ids
            .allocate(&resource_type, hint, |candidate| nodes.contains_key(candidate));
        self.insert(ResourceNode::new(logical_id, resource_type, properties))
    }

    /// Declare a resource under exactly `logical_id`.
    pub fn declare_with_id(
        &mut self,
        resource_type: impl Into<String>,
        logical_id: &str,
        properties: Properties,
    ) -> GraphResult<ResourceHandle> {
        validate_forced_id(logical_id)?;
        if self.nodes.contains_key(logical_id) {
            return Err(GraphError::DuplicateLogicalId(logical_id.to_string()));
        }
        Ok(self.insert(ResourceNode::new(logical_id, resource_type, properties)))
    }

    fn insert(&mut self, node: ResourceNode) -> ResourceHandle {
        debug!(
            "Declared {} ({}) with {} properties",
            node.logical_id,
            node.resource_type,
            node.properties.len()
        );
        let handle = ResourceHandle::new(&node.logical_id, &node.resource_type);
        self.nodes.insert(node.logical_id.clone(), node);
        handle
    }

    /// Record an explicit `dependsOn` edge. The dependency may be declared later.
    pub fn add_dependency(&mut self, dependent: &ResourceHandle, dependency: &str) -> GraphResult<()> {
        let node = self
            .nodes
            .get_mut(dependent.logical_id())
            .ok_or_else(|| GraphError::UnknownTarget(dependent.logical_id().to_string()))?;
        debug!("{} depends on {}", node.logical_id, dependency);
        node.depends_on.insert(dependency.to_string());
        Ok(())
    }

    /// Set a resource-level attribute such as `Metadata` or `Condition`.
    pub fn set_attribute(
        &mut self,
        handle: &ResourceHandle,
        name: impl Into<String>,
        value: PropertyValue,
    ) -> GraphResult<()> {
        let node = self
            .nodes
            .get_mut(handle.logical_id())
            .ok_or_else(|| GraphError::UnknownTarget(handle.logical_id().to_string()))?;
        node.attributes.insert(name.into(), value);
        Ok(())
    }

    /// Set `DeletionPolicy` and `UpdateReplacePolicy` together.
    pub fn apply_removal_policy(&mut self, handle: &ResourceHandle, policy: RemovalPolicy) -> GraphResult<()> {
        self.set_attribute(handle, "UpdateReplacePolicy", PropertyValue::string(policy.as_str()))?;
        self.set_attribute(handle, "DeletionPolicy", PropertyValue::string(policy.as_str()))
    }

    /// Register a named output.
    pub fn add_output(&mut self, name: impl Into<String>, output: Output) -> GraphResult<()> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(GraphError::DuplicateOutput(name));
        }
        debug!("Registered output {}", name);
        self.outputs.insert(name, output);
        Ok(())
    }

    pub fn node(&self, logical_id: &str) -> Option<&ResourceNode> {
        self.nodes.get(logical_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Freeze the declarations into a stack.
    pub fn build(self) -> Stack {
        info!(
            "Built stack {} with {} resources and {} outputs",
            self.name,
            self.nodes.len(),
            self.outputs.len()
        );
        Stack::from_parts(self.name, self.description, self.nodes, self.outputs)
    }

    /// Freeze, then apply `patches` in order.
    pub fn build_with_overrides(self, patches: &[OverridePatch]) -> GraphResult<Stack> {
        let mut stack = self.build();
        overrides::apply_overrides(&mut stack, patches)?;
        Ok(stack)
    }
}
