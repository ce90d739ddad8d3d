//! polydoc describes nested documents with schemas whose embedded parts are polymorphic. The
//! schema governing any one sub-document is picked per instance, by a tag the sub-document
//! carries, rather than being fixed when the schema is defined.
//!
//! It provides:
//!
//! - Schemas made of ordered field descriptors: scalars, embedded sub-documents, and arrays of
//!   either
//! - A primary key on every schema unless disabled. It is auto-generated by default or can be
//!   declared explicitly.
//! - Discriminators, registered either on an embedded path or on a schema itself
//!     - A tag value found under the discriminator key (`"kind"` by default) selects the schema
//!     - Registered schemas inherit the base schema's fields and primary key
//!     - A schema may be registered as a discriminator of itself, describing documents nested to
//!       any depth
//! - Building typed documents from blobs, with scalar checking through a pluggable type registry
//! - Serializing documents back into the exact blob they were built from
//!
//! Schemas are assembled in a [`SchemaGraph`], which owns them and hands out [`SchemaId`]s.
//! Assembly needs mutable access to the graph, while building and serializing only need shared
//! access, so a finished graph can be used from many threads at once.
//!
//! # Example
//!
//! ```
//! use polydoc::{blob, FieldDescriptor, Schema, SchemaGraph, SchemaOptions};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let mut graph = SchemaGraph::new();
//! let event = graph.add(
//!     Schema::new("Event")
//!         .field("_id", FieldDescriptor::scalar("Number").required(true))
//!         .field("message", FieldDescriptor::scalar("String")),
//! )?;
//! let sub_event = graph.add(
//!     Schema::new("SubEvent")
//!         .field("sub_events", FieldDescriptor::array(FieldDescriptor::embedded(event))),
//! )?;
//!
//! // Sub-events tagged "SubEvent" are themselves SubEvents, at every depth
//! graph.path_mut(sub_event, "sub_events")?.discriminator("SubEvent", sub_event)?;
//! assert_eq!(graph.path(sub_event, "_id").unwrap().instance(), "Number");
//!
//! let input = blob!({
//!     "_id": 1,
//!     "sub_events": [{
//!         "_id": 2,
//!         "kind": "SubEvent",
//!         "message": "outer",
//!         "sub_events": [{ "_id": 3, "message": "inner" }]
//!     }]
//! });
//! let doc = graph.build(sub_event, &input)?;
//! assert_eq!(doc.to_value(), input);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

mod compose;
pub mod document;
pub mod error;
pub mod field;
pub mod graph;
pub mod schema;
pub mod ser;
pub mod types;
pub mod value;

pub use self::document::{Document, FieldValue};
pub use self::error::{Error, Result};
pub use self::field::{FieldDescriptor, FieldKind, FieldOptions};
pub use self::graph::{PathMut, Resolved, SchemaGraph};
pub use self::schema::{DiscriminatorMap, Schema, SchemaId, SchemaOptions};
pub use self::ser::serialize;
pub use self::types::{Codec, TypeRegistry};
pub use self::value::{Map, Value};

/// The path holding a discriminator tag unless a schema picks another with
/// [`SchemaOptions::discriminator_key`].
pub const DEFAULT_DISCRIMINATOR_KEY: &str = "kind";
/// The path of the primary key.
pub const ID_PATH: &str = "_id";
/// The default limit on how deeply sub-documents may nest in a blob being built. Each level of
/// nesting takes a few stack frames, so this keeps builds well inside a default thread stack.
pub const MAX_DEPTH: usize = 64;
