//! Resource nodes.

use indexmap::IndexSet;

use crate::value::{Properties, PropertyValue, Reference, REF_ATTRIBUTE};

/// What happens to a resource when it leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

/// A declared unit of infrastructure.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub logical_id: String,
    pub resource_type: String,
    pub properties: Properties,
    /// Explicit dependency edges, in the order they were added.
    pub depends_on: IndexSet<String>,
    /// Resource-level template attributes (`DeletionPolicy`, `Metadata`, ...).
    pub attributes: Properties,
}

impl ResourceNode {
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>, properties: Properties) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties,
            depends_on: IndexSet::new(),
            attributes: Properties::new(),
        }
    }

    /// References found in properties and attributes, depth first.
    pub fn references(&self) -> Vec<&Reference> {
        self.properties
            .values()
            .chain(self.attributes.values())
            .flat_map(PropertyValue::references)
            .collect()
    }

    /// Explicit `depends_on` edges followed by reference targets, deduplicated.
    pub fn edges(&self) -> IndexSet<&str> {
        let mut edges: IndexSet<&str> = self.depends_on.iter().map(String::as_str).collect();
        edges.extend(self.references().into_iter().map(|r| r.target.as_str()));
        edges
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Handle returned by a declaration, used to wire later declarations to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    logical_id: String,
    resource_type: String,
}

impl ResourceHandle {
    pub(crate) fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The resource's primary identifier.
    pub fn ref_value(&self) -> PropertyValue {
        PropertyValue::Reference(Reference::new(&self.logical_id, REF_ATTRIBUTE))
    }

    /// A generated attribute of the resource.
    pub fn get_att(&self, attribute: impl Into<String>) -> PropertyValue {
        PropertyValue::get_att(&self.logical_id, attribute)
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.logical_id, self.resource_type)
    }
}
