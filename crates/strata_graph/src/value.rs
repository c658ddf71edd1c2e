//! Property values and references between resources.
//!
//! A [`PropertyValue`] serializes to the form a CloudFormation template uses
//! and parses back from it, so `{"Ref": "Table"}` written in an override
//! file becomes a [`Reference`] the emitter can order by.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Attribute name used for a resource's primary identifier.
pub const REF_ATTRIBUTE: &str = "Ref";

/// Ordered property bag of a resource.
pub type Properties = IndexMap<String, PropertyValue>;

/// A literal scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

/// Pointer from a property to an attribute of another resource, by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Logical id of the referenced resource.
    pub target: String,
    /// Attribute name, or [`REF_ATTRIBUTE`] for the primary identifier.
    pub attribute: String,
}

impl Reference {
    pub fn new(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: attribute.into(),
        }
    }

    /// Reference to the primary identifier (`{"Ref": target}`).
    pub fn primary(target: impl Into<String>) -> Self {
        Self::new(target, REF_ATTRIBUTE)
    }

    pub fn is_primary(&self) -> bool {
        self.attribute == REF_ATTRIBUTE
    }
}

/// A property value in a resource's property tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Literal(Scalar),
    List(Vec<PropertyValue>),
    Map(Properties),
    Reference(Reference),
    /// Provider pseudo parameter such as `AWS::Region`. Never creates an edge.
    Pseudo(String),
    /// Intrinsic function call such as `Fn::Join`.
    Intrinsic {
        function: String,
        argument: Box<PropertyValue>,
    },
}

impl PropertyValue {
    pub fn null() -> Self {
        PropertyValue::Literal(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        PropertyValue::Literal(Scalar::String(value.into()))
    }

    pub fn number(value: impl Into<Number>) -> Self {
        PropertyValue::Literal(Scalar::Number(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        PropertyValue::Literal(Scalar::Bool(value))
    }

    pub fn list(items: impl IntoIterator<Item = PropertyValue>) -> Self {
        PropertyValue::List(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, PropertyValue)>) -> Self {
        PropertyValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty_map() -> Self {
        PropertyValue::Map(Properties::new())
    }

    /// `{"Ref": target}`.
    pub fn reference(target: impl Into<String>) -> Self {
        PropertyValue::Reference(Reference::primary(target))
    }

    /// `{"Fn::GetAtt": [target, attribute]}`.
    pub fn get_att(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        PropertyValue::Reference(Reference::new(target, attribute))
    }

    pub fn intrinsic(function: impl Into<String>, argument: PropertyValue) -> Self {
        PropertyValue::Intrinsic {
            function: function.into(),
            argument: Box::new(argument),
        }
    }

    pub fn join(delimiter: impl Into<String>, parts: impl IntoIterator<Item = PropertyValue>) -> Self {
        Self::intrinsic(
            "Fn::Join",
            PropertyValue::List(vec![PropertyValue::string(delimiter), Self::list(parts)]),
        )
    }

    /// `Fn::Sub`; the short form is used when there are no variables.
    pub fn sub(template: impl Into<String>, variables: Properties) -> Self {
        if variables.is_empty() {
            return Self::intrinsic("Fn::Sub", PropertyValue::string(template));
        }
        Self::intrinsic(
            "Fn::Sub",
            PropertyValue::List(vec![PropertyValue::string(template), PropertyValue::Map(variables)]),
        )
    }

    pub fn base64(value: PropertyValue) -> Self {
        Self::intrinsic("Fn::Base64", value)
    }

    pub fn select(index: u32, list: PropertyValue) -> Self {
        Self::intrinsic("Fn::Select", PropertyValue::List(vec![PropertyValue::number(index), list]))
    }

    pub fn cidr(ip_block: PropertyValue, count: u32, cidr_bits: u32) -> Self {
        Self::intrinsic(
            "Fn::Cidr",
            PropertyValue::List(vec![
                ip_block,
                PropertyValue::number(count),
                PropertyValue::string(cidr_bits.to_string()),
            ]),
        )
    }

    /// Availability zones of the deployment region.
    pub fn get_azs() -> Self {
        Self::intrinsic("Fn::GetAZs", PropertyValue::string(""))
    }

    pub fn region() -> Self {
        PropertyValue::Pseudo("AWS::Region".to_string())
    }

    pub fn partition() -> Self {
        PropertyValue::Pseudo("AWS::Partition".to_string())
    }

    pub fn account_id() -> Self {
        PropertyValue::Pseudo("AWS::AccountId".to_string())
    }

    pub fn url_suffix() -> Self {
        PropertyValue::Pseudo("AWS::URLSuffix".to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Literal(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Properties> {
        match self {
            PropertyValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Properties> {
        match self {
            PropertyValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            PropertyValue::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Follow a path of map keys (and list indices) down the tree.
    pub fn pointer<S: AsRef<str>>(&self, path: &[S]) -> Option<&PropertyValue> {
        path.iter().try_fold(self, |current, segment| {
            let segment = segment.as_ref();
            match current {
                PropertyValue::Map(map) => map.get(segment),
                PropertyValue::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
        })
    }

    /// Every reference reachable in this tree, depth first.
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a Reference>) {
        match self {
            PropertyValue::Reference(reference) => found.push(reference),
            PropertyValue::List(items) => {
                for item in items {
                    item.collect_references(found);
                }
            }
            PropertyValue::Map(map) => {
                for value in map.values() {
                    value.collect_references(found);
                }
            }
            PropertyValue::Intrinsic { argument, .. } => argument.collect_references(found),
            PropertyValue::Literal(_) | PropertyValue::Pseudo(_) => {}
        }
    }

    /// Template (JSON) form of this value.
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Literal(Scalar::Null) => Value::Null,
            PropertyValue::Literal(Scalar::Bool(b)) => Value::Bool(*b),
            PropertyValue::Literal(Scalar::Number(n)) => Value::Number(n.clone()),
            PropertyValue::Literal(Scalar::String(s)) => Value::String(s.clone()),
            PropertyValue::List(items) => Value::Array(items.iter().map(PropertyValue::to_json).collect()),
            PropertyValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
            PropertyValue::Reference(reference) if reference.is_primary() => {
                single_key("Ref", Value::String(reference.target.clone()))
            }
            PropertyValue::Reference(reference) => single_key(
                "Fn::GetAtt",
                Value::Array(vec![
                    Value::String(reference.target.clone()),
                    Value::String(reference.attribute.clone()),
                ]),
            ),
            PropertyValue::Pseudo(name) => single_key("Ref", Value::String(name.clone())),
            PropertyValue::Intrinsic { function, argument } => single_key(function, argument.to_json()),
        }
    }
}

fn single_key(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Convert a JSON object into a property bag. Non-object values yield an empty bag.
pub fn properties_from_json(value: Value) -> Properties {
    match PropertyValue::from(value) {
        PropertyValue::Map(map) => map,
        _ => Properties::new(),
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PropertyValue::null(),
            Value::Bool(b) => PropertyValue::bool(b),
            Value::Number(n) => PropertyValue::Literal(Scalar::Number(n)),
            Value::String(s) => PropertyValue::string(s),
            Value::Array(items) => PropertyValue::List(items.into_iter().map(PropertyValue::from).collect()),
            Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
                Some((key, inner)) => from_single_key(key, inner),
                None => PropertyValue::empty_map(),
            },
            Value::Object(map) => PropertyValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, PropertyValue::from(v)))
                    .collect(),
            ),
        }
    }
}

fn from_single_key(key: String, inner: Value) -> PropertyValue {
    match (key.as_str(), inner) {
        ("Ref", Value::String(name)) if name.contains("::") => PropertyValue::Pseudo(name),
        ("Ref", Value::String(target)) => PropertyValue::reference(target),
        ("Fn::GetAtt", Value::Array(parts)) if is_get_att_pair(&parts) => {
            let mut parts = parts.into_iter().filter_map(|p| match p {
                Value::String(s) => Some(s),
                _ => None,
            });
            match (parts.next(), parts.next()) {
                (Some(target), Some(attribute)) => PropertyValue::get_att(target, attribute),
                _ => PropertyValue::null(),
            }
        }
        ("Fn::GetAtt", Value::String(dotted)) if dotted.contains('.') => {
            match dotted.split_once('.') {
                Some((target, attribute)) => PropertyValue::get_att(target, attribute),
                None => PropertyValue::null(),
            }
        }
        (function, inner) if function.starts_with("Fn::") => {
            PropertyValue::intrinsic(function, PropertyValue::from(inner))
        }
        (_, inner) => {
            let mut map = Properties::new();
            map.insert(key.clone(), PropertyValue::from(inner));
            PropertyValue::Map(map)
        }
    }
}

fn is_get_att_pair(parts: &[Value]) -> bool {
    parts.len() == 2 && parts.iter().all(Value::is_string)
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(PropertyValue::from)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::string(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::string(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::number(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::number(value)
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::number(value)
    }
}

impl From<Reference> for PropertyValue {
    fn from(value: Reference) -> Self {
        PropertyValue::Reference(value)
    }
}

impl From<Properties> for PropertyValue {
    fn from(value: Properties) -> Self {
        PropertyValue::Map(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(value: Vec<T>) -> Self {
        PropertyValue::List(value.into_iter().map(Into::into).collect())
    }
}
