//! Field descriptors: the declared shape of one path in a schema.
//!
//! A descriptor is either a scalar (named by a type token from the
//! [`TypeRegistry`][crate::types::TypeRegistry]), an embedded sub-document governed by another
//! schema in the same [`SchemaGraph`][crate::graph::SchemaGraph], or an array of either.
//!
//! ```
//! # use polydoc::{field::FieldDescriptor, schema::Schema, graph::SchemaGraph};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = SchemaGraph::new();
//! let tag = graph.add(Schema::new("Tag").field("label", FieldDescriptor::scalar("String")))?;
//! let post = Schema::new("Post")
//!     .field("title", FieldDescriptor::scalar("String").required(true))
//!     .field("tags", FieldDescriptor::array(FieldDescriptor::embedded(tag)));
//! let post = graph.add(post)?;
//! assert_eq!(graph.path(post, "tags").unwrap().element_schema(), Some(tag));
//! # Ok(())
//! # }
//! ```

use crate::schema::SchemaId;
use crate::value::Value;
use educe::Educe;
use serde::{Deserialize, Serialize};

#[inline]
fn is_false(v: &bool) -> bool {
    !v
}

/// What a path holds.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// A scalar, validated by the codec registered under this type token.
    Scalar(String),
    /// An ordered sequence whose elements all follow the contained descriptor.
    Array(Box<FieldDescriptor>),
    /// A sub-document governed by the referenced schema, or by one of its discriminators.
    Embedded(SchemaId),
}

/// Options that apply to a single path.
///
/// # Defaults
///
/// - comment: ""
/// - required: false
/// - auto: false
/// - default: None
///
#[derive(Educe, Clone, Debug, Serialize, Deserialize)]
#[educe(PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct FieldOptions {
    /// An optional comment explaining the field.
    #[educe(PartialEq(ignore))]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// If true, the field must be present and non-null in every document.
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    /// If true, a missing value is generated when the document is built. Only meaningful for the
    /// primary key.
    #[serde(skip_serializing_if = "is_false")]
    pub auto: bool,
    /// Value stored when the field is missing from the input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// The declared shape of one path.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub kind: FieldKind,
    pub options: FieldOptions,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            options: FieldOptions::default(),
        }
    }

    /// A scalar field of the given type token.
    pub fn scalar(token: impl Into<String>) -> Self {
        Self::new(FieldKind::Scalar(token.into()))
    }

    /// An array whose elements follow `element`.
    pub fn array(element: FieldDescriptor) -> Self {
        Self::new(FieldKind::Array(Box::new(element)))
    }

    /// A single embedded sub-document.
    pub fn embedded(schema: SchemaId) -> Self {
        Self::new(FieldKind::Embedded(schema))
    }

    /// An auto-generated `ObjectId`, the default primary key.
    pub fn auto_id() -> Self {
        Self::scalar("ObjectId").auto(true)
    }

    /// Set a comment for the field.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.options.comment = comment.into();
        self
    }

    /// Set whether or not the field is required.
    pub fn required(mut self, required: bool) -> Self {
        self.options.required = required;
        self
    }

    /// Set whether or not a missing value is generated.
    pub fn auto(mut self, auto: bool) -> Self {
        self.options.auto = auto;
        self
    }

    /// Set the value stored when the field is missing.
    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        self.options.default = Some(default.into());
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_required(&self) -> bool {
        self.options.required
    }

    pub fn is_auto(&self) -> bool {
        self.options.auto
    }

    /// The type token, if this is a scalar field.
    pub fn type_token(&self) -> Option<&str> {
        match self.kind {
            FieldKind::Scalar(ref token) => Some(token.as_str()),
            _ => None,
        }
    }

    /// The schema governing the sub-document(s) held here. Only embedded fields and arrays of
    /// embedded fields have one, and only those paths may carry discriminators.
    pub fn element_schema(&self) -> Option<SchemaId> {
        match self.kind {
            FieldKind::Embedded(id) => Some(id),
            FieldKind::Array(ref element) => match element.kind {
                FieldKind::Embedded(id) => Some(id),
                _ => None,
            },
            FieldKind::Scalar(_) => None,
        }
    }

    /// A short name for the kind of field, like `"Number"`, `"Embedded"`, `"DocumentArray"`, or
    /// `"Array"`.
    pub fn instance(&self) -> &str {
        match self.kind {
            FieldKind::Scalar(ref token) => token,
            FieldKind::Embedded(_) => "Embedded",
            FieldKind::Array(ref element) => match element.kind {
                FieldKind::Embedded(_) => "DocumentArray",
                _ => "Array",
            },
        }
    }

    /// Every type token used by this descriptor, including inside arrays.
    pub(crate) fn type_tokens(&self) -> Vec<&str> {
        match self.kind {
            FieldKind::Scalar(ref token) => vec![token.as_str()],
            FieldKind::Array(ref element) => element.type_tokens(),
            FieldKind::Embedded(_) => Vec::new(),
        }
    }

    /// Every schema referenced by this descriptor, including inside arrays.
    pub(crate) fn schema_refs(&self) -> Vec<SchemaId> {
        match self.kind {
            FieldKind::Scalar(_) => Vec::new(),
            FieldKind::Array(ref element) => element.schema_refs(),
            FieldKind::Embedded(id) => vec![id],
        }
    }
}
