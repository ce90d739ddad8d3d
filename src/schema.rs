//! Schemas and their discriminator maps.
//!
//! A [`Schema`] is a named, ordered set of field descriptors plus the options that govern the
//! documents built from it. Schemas are put into a [`SchemaGraph`][crate::graph::SchemaGraph]
//! before use, and the graph hands back a [`SchemaId`] that other schemas use to embed them.
//!
//! Each schema owns its [`DiscriminatorMap`]s: one per embedded path that has discriminators
//! registered on it, plus an optional map for the schema itself. The maps hold ids, not copies,
//! so a schema that lists itself as one of its own discriminators forms a cycle of ids and can
//! describe documents nested to any depth.

use crate::field::FieldDescriptor;
use crate::{DEFAULT_DISCRIMINATOR_KEY, ID_PATH};
use educe::Educe;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[inline]
fn is_true(v: &bool) -> bool {
    *v
}

#[inline]
fn key_is_default(v: &String) -> bool {
    v == DEFAULT_DISCRIMINATOR_KEY
}

/// Handle to a schema stored in a [`SchemaGraph`][crate::graph::SchemaGraph].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    /// Position of the schema in its graph.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Options that apply to a whole schema.
///
/// # Defaults
///
/// - comment: ""
/// - discriminator_key: "kind"
/// - id: true
/// - strict: true
///
/// ```
/// # use polydoc::schema::SchemaOptions;
/// let opts: SchemaOptions = serde_json::from_str(r#"{"id":false,"discriminator_key":"type"}"#).unwrap();
/// assert_eq!(opts, SchemaOptions::new().id(false).discriminator_key("type"));
/// ```
#[derive(Educe, Clone, Debug, Serialize, Deserialize)]
#[educe(PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct SchemaOptions {
    /// An optional comment explaining the schema.
    #[educe(PartialEq(ignore))]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// The path holding the tag that selects a discriminator.
    #[educe(Default(expression = DEFAULT_DISCRIMINATOR_KEY.to_string()))]
    #[serde(skip_serializing_if = "key_is_default")]
    pub discriminator_key: String,
    /// If true, the schema gets an auto-generated `_id` primary key when created.
    #[educe(Default = true)]
    #[serde(skip_serializing_if = "is_true")]
    pub id: bool,
    /// If true, keys in the input that the schema doesn't declare are dropped. Otherwise they are
    /// kept as they are and written back out after the declared fields.
    #[educe(Default = true)]
    #[serde(skip_serializing_if = "is_true")]
    pub strict: bool,
}

impl SchemaOptions {
    /// Make new options with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a comment for the schema.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Set the discriminator key.
    pub fn discriminator_key(mut self, key: impl Into<String>) -> Self {
        self.discriminator_key = key.into();
        self
    }

    /// Set whether or not an auto-generated `_id` is added.
    pub fn id(mut self, id: bool) -> Self {
        self.id = id;
        self
    }

    /// Set whether or not undeclared keys are dropped.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Tag values and the schemas they select, for one path of one schema.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiscriminatorMap {
    variants: IndexMap<String, SchemaId>,
}

impl DiscriminatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the schema selected by a tag value.
    pub fn get(&self, tag: &str) -> Option<SchemaId> {
        self.variants.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.variants.contains_key(tag)
    }

    /// Store a tag, returning the schema it previously selected, if any.
    pub(crate) fn insert(&mut self, tag: impl Into<String>, schema: SchemaId) -> Option<SchemaId> {
        self.variants.insert(tag.into(), schema)
    }

    /// Iterate over tags and schemas in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SchemaId)> {
        self.variants.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Iterate over the registered tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// A named, ordered mapping from path names to field descriptors.
///
/// ```
/// # use polydoc::{field::FieldDescriptor, schema::{Schema, SchemaOptions}};
/// let event = Schema::with_options("Event", SchemaOptions::new().id(false))
///     .field("message", FieldDescriptor::scalar("String"));
/// assert!(event.id_field().is_none());
/// assert_eq!(event.path("message").unwrap().instance(), "String");
///
/// // Schemas get an auto-generated primary key unless told otherwise
/// let user = Schema::new("User");
/// assert!(user.id_field().unwrap().is_auto());
/// ```
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    options: SchemaOptions,
    fields: IndexMap<String, FieldDescriptor>,
    pub(crate) discriminators: BTreeMap<String, DiscriminatorMap>,
    pub(crate) own: Option<DiscriminatorMap>,
}

impl Schema {
    /// Make a new schema with the default options.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, SchemaOptions::default())
    }

    /// Make a new schema with the given options.
    pub fn with_options(name: impl Into<String>, options: SchemaOptions) -> Self {
        let mut fields = IndexMap::new();
        if options.id {
            fields.insert(ID_PATH.to_string(), FieldDescriptor::auto_id());
        }
        Self {
            name: name.into(),
            options,
            fields,
            discriminators: BTreeMap::new(),
            own: None,
        }
    }

    /// Add a field, replacing any existing descriptor for the same path.
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.define_path(name, descriptor);
        self
    }

    /// Add or overwrite a field descriptor. An overwritten path keeps its position. If the new
    /// descriptor can't hold sub-documents, any discriminators on the path are dropped.
    pub fn define_path(&mut self, name: impl Into<String>, descriptor: FieldDescriptor) {
        let name = name.into();
        if descriptor.element_schema().is_none() {
            self.discriminators.remove(&name);
        }
        self.fields.insert(name, descriptor);
    }

    /// Remove a field, returning its descriptor.
    pub(crate) fn remove_path(&mut self, name: &str) -> Option<FieldDescriptor> {
        self.discriminators.remove(name);
        self.fields.shift_remove(name)
    }

    /// Put a field at the front of the declared order, replacing any existing descriptor.
    pub(crate) fn define_path_first(&mut self, name: &str, descriptor: FieldDescriptor) {
        match self.fields.get_mut(name) {
            Some(existing) => *existing = descriptor,
            None => {
                self.fields.shift_insert(0, name.to_string(), descriptor);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn discriminator_key(&self) -> &str {
        &self.options.discriminator_key
    }

    pub fn is_strict(&self) -> bool {
        self.options.strict
    }

    /// Get the descriptor for a path.
    pub fn path(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn has_path(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over the fields in declared order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The primary-key descriptor, if this schema has one.
    pub fn id_field(&self) -> Option<&FieldDescriptor> {
        self.fields.get(ID_PATH)
    }

    /// The discriminator map registered on one of this schema's paths.
    pub fn discriminators(&self, path: &str) -> Option<&DiscriminatorMap> {
        self.discriminators.get(path)
    }

    /// The discriminator map registered on the schema itself.
    pub fn own_discriminators(&self) -> Option<&DiscriminatorMap> {
        self.own.as_ref()
    }

    /// Iterate over every path that has a discriminator map.
    pub fn discriminated_paths(&self) -> impl Iterator<Item = (&str, &DiscriminatorMap)> {
        self.discriminators.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_id_is_first_and_auto() {
        let schema = Schema::new("User").field("name", FieldDescriptor::scalar("String"));
        let paths: Vec<&str> = schema.fields().map(|(k, _)| k).collect();
        assert_eq!(paths, [ID_PATH, "name"]);
        let id = schema.id_field().unwrap();
        assert!(id.is_auto());
        assert_eq!(id.type_token(), Some("ObjectId"));
    }

    #[test]
    fn explicit_id_replaces_auto_in_place() {
        let schema = Schema::new("Event")
            .field("message", FieldDescriptor::scalar("String"))
            .field(ID_PATH, FieldDescriptor::scalar("Number").required(true));
        let paths: Vec<&str> = schema.fields().map(|(k, _)| k).collect();
        assert_eq!(paths, [ID_PATH, "message"]);
        let id = schema.id_field().unwrap();
        assert!(!id.is_auto());
        assert!(id.is_required());
        assert_eq!(id.instance(), "Number");
    }

    #[test]
    fn redefining_as_scalar_drops_discriminators() {
        let mut schema = Schema::with_options("Box", SchemaOptions::new().id(false))
            .field("items", FieldDescriptor::array(FieldDescriptor::embedded(SchemaId(0))));
        schema
            .discriminators
            .entry("items".to_string())
            .or_default()
            .insert("A", SchemaId(1));
        assert!(schema.discriminators("items").is_some());
        schema.define_path("items", FieldDescriptor::scalar("Mixed"));
        assert!(schema.discriminators("items").is_none());
    }

    #[test]
    fn options_round_trip_through_json() {
        let opts = SchemaOptions::new().strict(false).comment("scratch");
        let text = serde_json::to_string(&opts).unwrap();
        assert_eq!(text, r#"{"comment":"scratch","strict":false}"#);
        let back: SchemaOptions = serde_json::from_str(&text).unwrap();
        assert_eq!(back, opts);
        assert_eq!(back.discriminator_key, DEFAULT_DISCRIMINATOR_KEY);
        assert!(back.id);
    }

    #[test]
    fn discriminator_map_overwrites() {
        let mut map = DiscriminatorMap::new();
        assert_eq!(map.insert("A", SchemaId(1)), None);
        assert_eq!(map.insert("B", SchemaId(2)), None);
        assert_eq!(map.insert("A", SchemaId(3)), Some(SchemaId(1)));
        assert_eq!(map.get("A"), Some(SchemaId(3)));
        let tags: Vec<&str> = map.tags().collect();
        assert_eq!(tags, ["A", "B"]);
    }
}
