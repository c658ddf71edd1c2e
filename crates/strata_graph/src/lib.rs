//! # strata_graph
//!
//! Declarative resource graph engine for strata.
//!
//! Stack-definition code declares resources through a [`StackBuilder`],
//! wiring them together with [`Reference`] values. Callers may then patch
//! any field of the frozen [`Stack`] with an [`OverridePatch`], and the
//! [`Emitter`] orders everything so dependencies come first before the
//! result is rendered as a CloudFormation template.
//!
//! ## Features
//!
//! - Stable, collision-free logical ids derived from readable hints
//! - Implicit dependency edges from references, explicit `depends_on` edges
//! - Path-based overrides that may add fields absent from the declaration
//! - Deterministic depth-first emission with cycle detection
//! - Optional JSON Schema validation of property bags
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use strata_graph::{properties_from_json, OverridePatch, StackBuilder};
//!
//! let mut builder = StackBuilder::new("Demo");
//! let table = builder.declare("AWS::DynamoDB::Table", "Table", properties_from_json(json!({
//!     "BillingMode": "PAY_PER_REQUEST"
//! })));
//! let function = builder.declare("AWS::Lambda::Function", "Fn", properties_from_json(json!({
//!     "Environment": { "Variables": { "TABLE_NAME": table.ref_value() } }
//! })));
//!
//! let mut stack = builder.build();
//! stack
//!     .apply_override(&OverridePatch::property(
//!         function.logical_id(),
//!         ["Environment", "Variables", "STAGE"],
//!         "qa",
//!     ))
//!     .unwrap();
//!
//! let document = stack.emit().unwrap();
//! assert_eq!(document.order(), vec![table.logical_id(), function.logical_id()]);
//! println!("{}", document.to_json().unwrap());
//! ```

pub mod builder;
pub mod emitter;
pub mod error;
pub mod logical_id;
pub mod node;
pub mod overrides;
pub mod render;
pub mod schema;
pub mod stack;
pub mod value;

pub use builder::StackBuilder;
pub use emitter::{emit, EmittedResource, Emitter, SerializedDocument};
pub use error::{GraphError, GraphResult};
pub use node::{RemovalPolicy, ResourceHandle, ResourceNode};
pub use overrides::{apply_override, apply_overrides, OverridePatch};
pub use render::{parse_template, TemplateFormat};
pub use schema::{ResourceSchema, SchemaRegistry, ValidationReport};
pub use stack::{Output, Stack};
pub use value::{properties_from_json, Properties, PropertyValue, Reference, Scalar, REF_ATTRIBUTE};
