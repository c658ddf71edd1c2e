//! Override resolver.
//!
//! An override writes a value at a path inside one resource's template
//! entry. Paths starting with `Properties` address the property bag; any
//! other first segment addresses resource-level attributes. Missing levels
//! are created, so an override can add a field the declaration never had.
//! Values are not checked against any resource schema.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::stack::Stack;
use crate::value::{Properties, PropertyValue};

const PROPERTIES: &str = "Properties";
const RESERVED: [&str; 2] = ["Type", "DependsOn"];

/// Replacement of one path on one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverridePatch {
    /// Logical id of the resource to patch.
    pub target: String,
    /// Path from the template entry, e.g. `["Properties", "Environment", "STAGE"]`.
    /// A dotted string is accepted when deserializing.
    #[serde(deserialize_with = "path_segments")]
    pub path: Vec<String>,
    pub value: PropertyValue,
}

impl OverridePatch {
    pub fn new<S: Into<String>>(
        target: impl Into<String>,
        path: impl IntoIterator<Item = S>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            target: target.into(),
            path: path.into_iter().map(Into::into).collect(),
            value: value.into(),
        }
    }

    /// Patch below `Properties`.
    pub fn property<S: Into<String>>(
        target: impl Into<String>,
        path: impl IntoIterator<Item = S>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        let path = std::iter::once(PROPERTIES.to_string()).chain(path.into_iter().map(Into::into));
        Self::new(target, path, value)
    }

    fn invalid(&self, reason: &str) -> GraphError {
        GraphError::InvalidOverridePath {
            target: self.target.clone(),
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

fn path_segments<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPath {
        Dotted(String),
        Segments(Vec<String>),
    }

    Ok(match RawPath::deserialize(deserializer)? {
        RawPath::Dotted(path) => path.split('.').map(str::to_string).collect(),
        RawPath::Segments(segments) => segments,
    })
}

/// Apply `patch` to `stack`.
///
/// Fails without touching the stack when the target is unknown (whatever
/// the path), or when the path is empty or addresses `Type`/`DependsOn`.
pub fn apply_override(stack: &mut Stack, patch: &OverridePatch) -> GraphResult<()> {
    if !stack.contains(&patch.target) {
        return Err(GraphError::UnknownTarget(patch.target.clone()));
    }

    let (first, rest) = patch
        .path
        .split_first()
        .ok_or_else(|| patch.invalid("path is empty"))?;
    if RESERVED.contains(&first.as_str()) {
        return Err(patch.invalid("this segment cannot be overridden"));
    }
    if first == PROPERTIES && rest.is_empty() && patch.value.as_map().is_none() {
        return Err(patch.invalid("replacing all properties requires a map"));
    }

    let node = stack
        .node_mut(&patch.target)
        .ok_or_else(|| GraphError::UnknownTarget(patch.target.clone()))?;

    if first == PROPERTIES {
        match (rest.is_empty(), &patch.value) {
            (true, PropertyValue::Map(map)) => node.properties = map.clone(),
            _ => set_in_map(&mut node.properties, rest, patch.value.clone()),
        }
    } else {
        set_in_map(&mut node.attributes, &patch.path, patch.value.clone());
    }

    debug!("Applied override {} on {}", patch.path.join("."), patch.target);
    Ok(())
}

/// Apply patches in order, stopping at the first failure.
pub fn apply_overrides(stack: &mut Stack, patches: &[OverridePatch]) -> GraphResult<()> {
    for patch in patches {
        apply_override(stack, patch)?;
    }
    Ok(())
}

fn set_in_map(map: &mut Properties, path: &[String], value: PropertyValue) {
    match path {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let slot = map.entry(head.clone()).or_insert_with(PropertyValue::empty_map);
            set_in_value(slot, rest, value);
        }
    }
}

fn set_in_value(slot: &mut PropertyValue, path: &[String], value: PropertyValue) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    if let PropertyValue::List(items) = slot {
        if let Some(item) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            if rest.is_empty() {
                *item = value;
            } else {
                set_in_value(item, rest, value);
            }
            return;
        }
    }

    if slot.as_map().is_none() {
        *slot = PropertyValue::empty_map();
    }
    if let Some(map) = slot.as_map_mut() {
        set_in_map(map, path, value);
    }
}
