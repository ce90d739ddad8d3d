//! The schema graph: where schemas are assembled, linked, and discriminated.
//!
//! Schemas are added to a [`SchemaGraph`], which hands back [`SchemaId`]s. Embedded fields and
//! discriminator maps refer to other schemas by id, so the graph may contain cycles (a schema
//! discriminated by itself) while staying a small, finite set of schemas. Building a document
//! walks the *data*, not the graph, so a cycle in the graph never causes unbounded work on its
//! own.
//!
//! All assembly needs `&mut SchemaGraph`, and building or serializing documents needs only
//! `&SchemaGraph`. Once assembly is finished the graph can be shared across threads and used for
//! any number of independent builds.
//!
//! # Example
//!
//! An event that holds a list of sub-events of the same shape, to any depth:
//!
//! ```
//! # use polydoc::{blob, field::FieldDescriptor, graph::SchemaGraph, schema::{Schema, SchemaOptions}};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = SchemaGraph::new();
//! let event = graph.add(
//!     Schema::with_options("Event", SchemaOptions::new().id(false))
//!         .field("message", FieldDescriptor::scalar("String")),
//! )?;
//! let sub_event = graph.add(
//!     Schema::with_options("SubEvent", SchemaOptions::new().id(false))
//!         .field("sub_events", FieldDescriptor::array(FieldDescriptor::embedded(event))),
//! )?;
//! graph.path_mut(sub_event, "sub_events")?.discriminator("SubEvent", sub_event)?;
//!
//! let input = blob!({
//!     "kind": "SubEvent",
//!     "message": "level 1",
//!     "sub_events": [{ "kind": "SubEvent", "message": "level 2", "sub_events": [] }]
//! });
//! let doc = graph.build(sub_event, &input)?;
//! assert_eq!(doc.to_value(), input);
//! # Ok(())
//! # }
//! ```

use crate::compose;
use crate::document::{Builder, Document};
use crate::error::{Error, Result};
use crate::field::{FieldDescriptor, FieldKind};
use crate::schema::{DiscriminatorMap, Schema, SchemaId};
use crate::types::TypeRegistry;
use crate::value::Value;
use crate::MAX_DEPTH;
use tracing::{debug, trace, warn};

/// Outcome of discriminator resolution: the schema to build with, and the tag that chose it.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub schema: SchemaId,
    /// The key the tag was read from. `None` when no discriminator map governs the position.
    pub key: Option<String>,
    pub tag: Option<String>,
}

impl Resolved {
    fn plain(schema: SchemaId) -> Self {
        Self {
            schema,
            key: None,
            tag: None,
        }
    }

    fn untagged(schema: SchemaId, key: &str) -> Self {
        Self {
            schema,
            key: Some(key.to_string()),
            tag: None,
        }
    }
}

/// Which discriminator map of a schema a registration goes into.
enum Scope<'a> {
    Path(&'a str),
    Own,
}

/// An arena of schemas connected by id, plus the type registry their scalar fields use.
#[derive(Clone, Debug)]
pub struct SchemaGraph {
    schemas: Vec<Schema>,
    types: TypeRegistry,
    max_depth: usize,
}

impl Default for SchemaGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaGraph {
    /// Make an empty graph using the built-in scalar types.
    pub fn new() -> Self {
        Self::with_types(TypeRegistry::new())
    }

    /// Make an empty graph using a custom type registry.
    pub fn with_types(types: TypeRegistry) -> Self {
        Self {
            schemas: Vec::new(),
            types,
            max_depth: MAX_DEPTH,
        }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// How deeply sub-documents may nest in a blob passed to [`build`][Self::build]. Defaults to
    /// [`MAX_DEPTH`].
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Change the nesting limit for builds. Building recurses once per level of nesting, so a
    /// limit much above the default needs a correspondingly large thread stack.
    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth;
    }

    /// Add a schema to the graph. Fails if any field names a type token the registry doesn't
    /// know, or embeds a schema that isn't in the graph.
    pub fn add(&mut self, schema: Schema) -> Result<SchemaId> {
        for (_, descriptor) in schema.fields() {
            self.check_descriptor(descriptor)?;
        }
        let id = SchemaId(self.schemas.len());
        debug!(schema = schema.name(), id = id.0, "added schema");
        self.schemas.push(schema);
        Ok(id)
    }

    /// Get a schema by id.
    pub fn get(&self, id: SchemaId) -> Option<&Schema> {
        self.schemas.get(id.0)
    }

    pub(crate) fn node(&self, id: SchemaId) -> Result<&Schema> {
        self.schemas.get(id.0).ok_or(Error::UnknownSchema(id.0))
    }

    fn node_mut(&mut self, id: SchemaId) -> Result<&mut Schema> {
        self.schemas.get_mut(id.0).ok_or(Error::UnknownSchema(id.0))
    }

    /// Find the most recently added schema with the given name.
    pub fn find(&self, name: &str) -> Option<SchemaId> {
        self.schemas
            .iter()
            .rposition(|s| s.name() == name)
            .map(SchemaId)
    }

    /// Iterate over every schema in the graph, including ones created by discriminator
    /// registration.
    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &Schema)> {
        self.schemas.iter().enumerate().map(|(i, s)| (SchemaId(i), s))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn check_descriptor(&self, descriptor: &FieldDescriptor) -> Result<()> {
        if let Some(token) = descriptor
            .type_tokens()
            .into_iter()
            .find(|t| !self.types.contains(t))
        {
            return Err(Error::UnknownType(token.to_string()));
        }
        if let Some(id) = descriptor
            .schema_refs()
            .into_iter()
            .find(|id| id.0 >= self.schemas.len())
        {
            return Err(Error::UnknownSchema(id.0));
        }
        Ok(())
    }

    /// Add or overwrite a field on a schema already in the graph.
    pub fn define_path(
        &mut self,
        id: SchemaId,
        name: impl Into<String>,
        descriptor: FieldDescriptor,
    ) -> Result<()> {
        self.check_descriptor(&descriptor)?;
        self.node_mut(id)?.define_path(name, descriptor);
        Ok(())
    }

    /// Get the descriptor for one path of a schema. For embedded paths,
    /// [`FieldDescriptor::element_schema`] gives the schema to navigate into.
    pub fn path(&self, id: SchemaId, name: &str) -> Option<&FieldDescriptor> {
        self.get(id).and_then(|s| s.path(name))
    }

    /// Get a handle for registering discriminators on one path of a schema.
    pub fn path_mut(&mut self, id: SchemaId, name: &str) -> Result<PathMut<'_>> {
        let schema = self.node(id)?;
        if !schema.has_path(name) {
            return Err(Error::PathNotFound {
                schema: schema.name().to_string(),
                path: name.to_string(),
            });
        }
        Ok(PathMut {
            graph: self,
            schema: id,
            path: name.to_string(),
        })
    }

    /// The discriminator map on one path of a schema.
    pub fn discriminators(&self, id: SchemaId, path: &str) -> Option<&DiscriminatorMap> {
        self.get(id).and_then(|s| s.discriminators(path))
    }

    /// The discriminator map on a schema itself.
    pub fn own_discriminators(&self, id: SchemaId) -> Option<&DiscriminatorMap> {
        self.get(id).and_then(|s| s.own_discriminators())
    }

    /// Register `child` as a discriminated variant of schema `id` itself, selected by `tag`.
    ///
    /// The variant applies wherever `id` is embedded without a path-level map of its own, and to
    /// documents built directly from `id`. Returns the id actually stored: `child` itself when
    /// `child` is `id`, otherwise a new schema composed from both.
    pub fn discriminator(&mut self, id: SchemaId, tag: &str, child: SchemaId) -> Result<SchemaId> {
        self.register(id, Scope::Own, id, tag, child)
    }

    fn register(
        &mut self,
        owner: SchemaId,
        scope: Scope<'_>,
        base: SchemaId,
        tag: &str,
        child: SchemaId,
    ) -> Result<SchemaId> {
        let base_schema = self.node(base)?;
        let key = base_schema.discriminator_key();
        if let Some(descriptor) = base_schema.path(key) {
            if descriptor.type_token() != Some("String") {
                return Err(Error::InvalidDiscriminatorTarget(format!(
                    "schema {:?} declares its discriminator key `{}` as {}",
                    base_schema.name(),
                    key,
                    descriptor.instance()
                )));
            }
        }
        let child_schema = self.node(child)?;
        if let Some(descriptor) = child_schema.path(key) {
            if descriptor.type_token() != Some("String") {
                return Err(Error::InvalidDiscriminatorTarget(format!(
                    "schema {:?} declares the discriminator key `{}` as {}",
                    child_schema.name(),
                    key,
                    descriptor.instance()
                )));
            }
        }

        let target = if child == base || child == owner {
            let base_schema = self.node(base)?.clone();
            compose::merge_into(&base_schema, self.node_mut(child)?);
            child
        } else {
            let derived = compose::derive(base_schema, child_schema, tag);
            self.add(derived)?
        };

        let owner_schema = self.node_mut(owner)?;
        let map = match scope {
            Scope::Path(path) => owner_schema
                .discriminators
                .entry(path.to_string())
                .or_default(),
            Scope::Own => owner_schema.own.get_or_insert_with(DiscriminatorMap::new),
        };
        if let Some(previous) = map.insert(tag, target) {
            warn!(
                tag,
                previous = previous.0,
                replacement = target.0,
                "discriminator tag registered twice, keeping the last one"
            );
        }
        debug!(
            owner = owner.0,
            tag,
            target = target.0,
            self_referential = target == owner,
            "registered discriminator"
        );
        Ok(target)
    }

    /// Pick the schema for one sub-document stored at `path` of schema `id`.
    ///
    /// The path's own discriminator map is used if it has one, otherwise the map on the path's
    /// element schema. Without either, or when the sub-document carries no tag, the element
    /// schema is used as-is.
    pub fn resolve(&self, id: SchemaId, path: &str, blob: &Value) -> Result<Resolved> {
        let schema = self.node(id)?;
        let descriptor = schema.path(path).ok_or_else(|| Error::PathNotFound {
            schema: schema.name().to_string(),
            path: path.to_string(),
        })?;
        let base = descriptor.element_schema().ok_or_else(|| {
            Error::InvalidDiscriminatorTarget(format!(
                "path `{}` of {:?} holds {}, not sub-documents",
                path,
                schema.name(),
                descriptor.instance()
            ))
        })?;
        self.resolve_at(schema, path, base, blob, path)
    }

    /// Resolution with an explicit location for error reporting. `schema` owns `path`, and `base`
    /// is the path's element schema.
    pub(crate) fn resolve_at(
        &self,
        schema: &Schema,
        path: &str,
        base: SchemaId,
        blob: &Value,
        location: &str,
    ) -> Result<Resolved> {
        let base_schema = self.node(base)?;
        let map = match schema
            .discriminators(path)
            .or_else(|| base_schema.own_discriminators())
        {
            Some(map) => map,
            None => return Ok(Resolved::plain(base)),
        };
        self.lookup(map, base_schema.discriminator_key(), base, blob, location)
    }

    /// Resolution for a document built directly from `id`, using the schema's own map.
    pub(crate) fn resolve_root(&self, id: SchemaId, blob: &Value) -> Result<Resolved> {
        let schema = self.node(id)?;
        match schema.own_discriminators() {
            Some(map) => self.lookup(map, schema.discriminator_key(), id, blob, ""),
            None => Ok(Resolved::plain(id)),
        }
    }

    fn lookup(
        &self,
        map: &DiscriminatorMap,
        key: &str,
        base: SchemaId,
        blob: &Value,
        location: &str,
    ) -> Result<Resolved> {
        let tag = match blob.as_map().and_then(|m| m.get(key)) {
            None | Some(Value::Null) => {
                trace!(location, "no discriminator tag, using base schema");
                return Ok(Resolved::untagged(base, key));
            }
            Some(Value::Str(tag)) => tag,
            Some(other) => {
                return Err(Error::InvalidFieldValue {
                    path: crate::error::join_path(location, key),
                    reason: format!("discriminator tag must be a string, got {}", other.kind_name()),
                })
            }
        };
        match map.get(tag) {
            Some(schema) => {
                trace!(location, tag = tag.as_str(), schema = schema.0, "resolved discriminator");
                Ok(Resolved {
                    schema,
                    key: Some(key.to_string()),
                    tag: Some(tag.clone()),
                })
            }
            None => Err(Error::UnknownDiscriminator {
                path: location.to_string(),
                tag: tag.clone(),
            }),
        }
    }

    /// Build a document from a blob, starting at schema `id`.
    ///
    /// The whole tree is built or nothing is: the first invalid field anywhere fails the call.
    /// Blobs nesting sub-documents deeper than [`max_depth`][Self::max_depth] fail with
    /// [`Error::DepthLimit`].
    pub fn build(&self, id: SchemaId, blob: &Value) -> Result<Document<'_>> {
        Builder::new(self).root(id, blob)
    }
}

/// A path of a schema, borrowed mutably for discriminator registration.
pub struct PathMut<'g> {
    graph: &'g mut SchemaGraph,
    schema: SchemaId,
    path: String,
}

impl<'g> PathMut<'g> {
    fn owner(&self) -> &Schema {
        &self.graph.schemas[self.schema.0]
    }

    pub fn descriptor(&self) -> Option<&FieldDescriptor> {
        self.owner().path(&self.path)
    }

    /// The schema governing sub-documents at this path, if it holds any.
    pub fn element_schema(&self) -> Option<SchemaId> {
        self.descriptor().and_then(|d| d.element_schema())
    }

    /// Register `child` as a discriminated variant of this path, selected by `tag`.
    ///
    /// Fails with [`Error::InvalidDiscriminatorTarget`] if the path holds scalars. Returns the id
    /// actually stored: `child` itself when it is the schema owning this path or the path's
    /// element schema, otherwise a new schema composed from the element schema and `child`.
    pub fn discriminator(self, tag: &str, child: SchemaId) -> Result<SchemaId> {
        let descriptor = self.descriptor().ok_or_else(|| Error::PathNotFound {
            schema: self.owner().name().to_string(),
            path: self.path.clone(),
        })?;
        let base = match descriptor.element_schema() {
            Some(base) => base,
            None => {
                let reason = match descriptor.kind {
                    FieldKind::Array(_) => "an array of non-documents",
                    _ => "a scalar",
                };
                return Err(Error::InvalidDiscriminatorTarget(format!(
                    "path `{}` of {:?} is {}",
                    self.path,
                    self.owner().name(),
                    reason
                )));
            }
        };
        let PathMut {
            graph,
            schema,
            path,
        } = self;
        graph.register(schema, Scope::Path(&path), base, tag, child)
    }
}
