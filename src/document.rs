//! Documents built from data blobs.
//!
//! A [`Document`] is made by calling [`SchemaGraph::build`][crate::graph::SchemaGraph::build]
//! with a schema and a blob. Building walks the blob depth-first. Scalars go through the codec
//! for their type token, and embedded sub-documents first go through discriminator resolution,
//! which picks the schema for that one sub-document based on the tag it carries. Each element of
//! an array of sub-documents is resolved on its own, so one array can hold documents of several
//! schemas.
//!
//! A document borrows the graph it was built from, and can always be turned back into the blob
//! it came from with [`Document::to_value`].

use crate::error::{join_path, Error, Result};
use crate::field::{FieldDescriptor, FieldKind};
use crate::graph::{Resolved, SchemaGraph};
use crate::schema::{Schema, SchemaId};
use crate::value::{Map, Value};
use crate::ID_PATH;
use indexmap::IndexMap;
use uuid::Uuid;

/// The built value of one field.
#[derive(Clone, Debug)]
pub enum FieldValue<'g> {
    /// A scalar, already coerced by its codec. Also used for explicit nulls.
    Scalar(Value),
    /// A sub-document, built against whichever schema its tag resolved to.
    Embedded(Box<Document<'g>>),
    /// An ordered sequence of values.
    Array(Vec<FieldValue<'g>>),
}

impl<'g> FieldValue<'g> {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(Value::Null))
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document<'g>> {
        match self {
            FieldValue::Embedded(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue<'g>]> {
        match self {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convert back into a plain blob value.
    pub fn to_value(&self) -> Value {
        crate::ser::field_value(self)
    }
}

/// A typed document tree.
///
/// Holds the values of the declared fields that were present in the input (or generated, for an
/// auto primary key), the tag that selected this document's schema if there was one, and any
/// undeclared keys kept by a non-strict schema.
#[derive(Clone, Debug)]
pub struct Document<'g> {
    schema_id: SchemaId,
    schema: &'g Schema,
    key: Option<String>,
    tag: Option<String>,
    values: IndexMap<String, FieldValue<'g>>,
    extra: Map,
}

impl<'g> Document<'g> {
    /// The id of the schema this document was actually built with, after discriminator
    /// resolution.
    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    pub fn schema(&self) -> &'g Schema {
        self.schema
    }

    /// The discriminator tag that selected this document's schema.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// The key the discriminator tag was read from, if a discriminator map governed this
    /// document's position. This is the key of the schema the map belongs to, which may differ
    /// from the key of the schema it selected.
    pub fn discriminator_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Get a built field. The discriminator key is not stored as a field when a tag selected the
    /// schema; use [`tag`][Self::tag] for it.
    pub fn get(&self, name: &str) -> Option<&FieldValue<'g>> {
        self.values.get(name)
    }

    /// The primary key, if the schema has one and the document holds it.
    pub fn id(&self) -> Option<&Value> {
        self.values.get(ID_PATH).and_then(|v| v.as_scalar())
    }

    /// Iterate over the built fields in declared order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue<'g>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Undeclared keys kept from the input.
    pub fn extra(&self) -> &Map {
        &self.extra
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize the document back into a blob.
    pub fn to_value(&self) -> Value {
        crate::ser::serialize(self)
    }
}

/// Builds document trees against one schema graph.
pub(crate) struct Builder<'g> {
    graph: &'g SchemaGraph,
}

impl<'g> Builder<'g> {
    pub(crate) fn new(graph: &'g SchemaGraph) -> Self {
        Self { graph }
    }

    /// Build a top-level document. The root schema's own discriminators apply here.
    pub(crate) fn root(&self, id: SchemaId, blob: &Value) -> Result<Document<'g>> {
        let map = as_document(blob, "")?;
        let resolved = self.graph.resolve_root(id, blob)?;
        self.document(resolved, map, "", 0)
    }

    fn document(
        &self,
        resolved: Resolved,
        map: &Map,
        location: &str,
        depth: usize,
    ) -> Result<Document<'g>> {
        let limit = self.graph.max_depth();
        if depth > limit {
            return Err(Error::DepthLimit {
                path: location.to_string(),
                limit,
            });
        }
        let schema = self.graph.node(resolved.schema)?;
        let key = resolved.key.as_deref().unwrap_or_default();
        let tagged = resolved.tag.is_some();

        let mut values = IndexMap::with_capacity(schema.len());
        for (name, descriptor) in schema.fields() {
            if tagged && name == key {
                continue;
            }
            let path = join_path(location, name);
            let built = match map.get(name) {
                None | Some(Value::Null) if descriptor.is_auto() => {
                    Some(self.generate(descriptor, &path)?)
                }
                None => match descriptor.options.default {
                    Some(ref default) => {
                        Some(self.field(schema, name, descriptor, default, &path, depth)?)
                    }
                    None if descriptor.is_required() => {
                        return Err(Error::MissingRequiredField(path))
                    }
                    None => None,
                },
                Some(Value::Null) if descriptor.is_required() => {
                    return Err(Error::MissingRequiredField(path))
                }
                Some(Value::Null) => Some(FieldValue::Scalar(Value::Null)),
                Some(value) => Some(self.field(schema, name, descriptor, value, &path, depth)?),
            };
            if let Some(built) = built {
                values.insert(name.to_string(), built);
            }
        }

        let mut extra = Map::new();
        if !schema.is_strict() {
            for (k, v) in map.iter() {
                if schema.has_path(k) || (tagged && k == key) {
                    continue;
                }
                extra.insert(k.clone(), v.clone());
            }
        }
        // An explicit null tag was read as "no tag", and is kept as given
        if resolved.key.is_some() && !tagged && !schema.has_path(key) {
            if let Some(Value::Null) = map.get(key) {
                extra.insert(key.to_string(), Value::Null);
            }
        }

        Ok(Document {
            schema_id: resolved.schema,
            schema,
            key: resolved.key,
            tag: resolved.tag,
            values,
            extra,
        })
    }

    /// Build the value at one path. `owner` and `name` locate the path for discriminator lookup,
    /// and stay the same while descending through nested arrays.
    fn field(
        &self,
        owner: &'g Schema,
        name: &str,
        descriptor: &FieldDescriptor,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<FieldValue<'g>> {
        match descriptor.kind {
            FieldKind::Scalar(ref token) => self.scalar(token, value.clone(), path),
            FieldKind::Embedded(base) => {
                let map = as_document(value, path)?;
                let resolved = self.graph.resolve_at(owner, name, base, value, path)?;
                let doc = self.document(resolved, map, path, depth + 1)?;
                Ok(FieldValue::Embedded(Box::new(doc)))
            }
            FieldKind::Array(ref element) => {
                let items = value.as_array().ok_or_else(|| Error::InvalidFieldValue {
                    path: path.to_string(),
                    reason: format!("expected an array, got {}", value.kind_name()),
                })?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let path = join_path(path, &i.to_string());
                        if item.is_null() {
                            Ok(FieldValue::Scalar(Value::Null))
                        } else {
                            self.field(owner, name, element, item, &path, depth)
                        }
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(FieldValue::Array)
            }
        }
    }

    fn scalar(&self, token: &str, value: Value, path: &str) -> Result<FieldValue<'g>> {
        let codec = self
            .graph
            .types()
            .resolve(token)
            .ok_or_else(|| Error::UnknownType(token.to_string()))?;
        codec
            .cast(value)
            .map(FieldValue::Scalar)
            .map_err(|reason| Error::InvalidFieldValue {
                path: path.to_string(),
                reason,
            })
    }

    /// Make a fresh value for an auto-generated field.
    fn generate(&self, descriptor: &FieldDescriptor, path: &str) -> Result<FieldValue<'g>> {
        match descriptor.type_token() {
            Some(token) => self.scalar(token, Value::Id(Uuid::new_v4()), path),
            None => Err(Error::InvalidFieldValue {
                path: path.to_string(),
                reason: format!("{} values can't be generated", descriptor.instance()),
            }),
        }
    }
}

fn as_document<'a>(value: &'a Value, path: &str) -> Result<&'a Map> {
    value.as_map().ok_or_else(|| Error::InvalidFieldValue {
        path: path.to_string(),
        reason: format!("expected a sub-document, got {}", value.kind_name()),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::SchemaOptions;
    use crate::MAX_DEPTH;
    use rand::Rng;

    fn no_id(name: &str) -> Schema {
        Schema::with_options(name, SchemaOptions::new().id(false))
    }

    /// Event { message } and Container { items: [Event] }, with Container registered on its own
    /// `items` path under "SubEvent".
    fn containers() -> (SchemaGraph, SchemaId, SchemaId) {
        let mut graph = SchemaGraph::new();
        let event = graph
            .add(no_id("Event").field("message", FieldDescriptor::scalar("String")))
            .unwrap();
        let container = graph
            .add(no_id("Container").field(
                "items",
                FieldDescriptor::array(FieldDescriptor::embedded(event)),
            ))
            .unwrap();
        graph
            .path_mut(container, "items")
            .unwrap()
            .discriminator("SubEvent", container)
            .unwrap();
        (graph, event, container)
    }

    fn nested(depth: usize) -> Value {
        let mut blob = blob!({ "kind": "SubEvent", "message": format!("level {}", depth), "items": [] });
        for level in (0..depth).rev() {
            blob = blob!({
                "kind": "SubEvent",
                "message": format!("level {}", level),
                "items": [blob, { "message": "plain" }]
            });
        }
        blob
    }

    #[test]
    fn nested_sub_events_round_trip() {
        let (graph, _, container) = containers();
        let input = blob!({
            "kind": "SubEvent",
            "message": "m",
            "items": [{ "kind": "SubEvent", "message": "m2", "items": [] }]
        });
        let doc = graph.build(container, &input).unwrap();
        assert_eq!(doc.to_value(), input);

        let child = doc.get("items").unwrap().as_array().unwrap()[0]
            .as_document()
            .unwrap();
        assert_eq!(child.tag(), Some("SubEvent"));
        assert_eq!(child.schema_id(), container);
        assert_eq!(child.get("message").unwrap().as_scalar(), Some(&Value::from("m2")));
        assert!(child.get("kind").is_none());
    }

    #[test]
    fn missing_tag_uses_base_schema() {
        let (graph, event, container) = containers();
        let input = blob!({ "message": "m", "items": [{ "message": "untagged" }] });
        let doc = graph.build(container, &input).unwrap();
        let child = doc.get("items").unwrap().as_array().unwrap()[0]
            .as_document()
            .unwrap();
        assert_eq!(child.schema_id(), event);
        assert_eq!(child.tag(), None);
        let output = doc.to_value();
        assert_eq!(output, input);
        assert!(output["items"][0].as_map().unwrap().get("kind").is_none());
    }

    #[test]
    fn unknown_tag_fails_whole_build() {
        let (graph, _, container) = containers();
        let input = blob!({
            "message": "m",
            "items": [{ "message": "ok" }, { "kind": "Clicked", "message": "bad" }]
        });
        assert_eq!(
            graph.build(container, &input).unwrap_err(),
            Error::UnknownDiscriminator {
                path: "items.1".into(),
                tag: "Clicked".into()
            }
        );
    }

    #[test]
    fn any_depth_round_trips() {
        let (graph, _, container) = containers();
        let mut rng = rand::thread_rng();
        for _ in 0..8 {
            let depth = rng.gen_range(0..=MAX_DEPTH);
            let input = nested(depth);
            let doc = graph.build(container, &input).unwrap();
            assert_eq!(doc.to_value(), input, "depth {}", depth);
        }
    }

    #[test]
    fn nesting_past_limit_fails() {
        let (graph, _, container) = containers();
        assert!(graph.build(container, &nested(MAX_DEPTH)).is_ok());
        assert_eq!(
            graph.build(container, &nested(MAX_DEPTH + 1)).unwrap_err(),
            Error::DepthLimit {
                path: vec!["items.0"; MAX_DEPTH + 1].join("."),
                limit: MAX_DEPTH
            }
        );
        // Far past the limit still returns instead of exhausting the stack
        assert!(matches!(
            graph.build(container, &nested(300)),
            Err(Error::DepthLimit { .. })
        ));
    }

    #[test]
    fn raised_limit_with_larger_stack() {
        let (mut graph, _, container) = containers();
        graph.set_max_depth(1000);
        let handle = std::thread::Builder::new()
            .stack_size(256 << 20)
            .spawn(move || {
                let input = nested(1000);
                let doc = graph.build(container, &input).unwrap();
                doc.to_value() == input
            })
            .unwrap();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn base_and_child_keys_differ() {
        let mut graph = SchemaGraph::new();
        let event = graph
            .add(
                Schema::with_options("Event", SchemaOptions::new().id(false).discriminator_key("type"))
                    .field("message", FieldDescriptor::scalar("String")),
            )
            .unwrap();
        let sub = graph
            .add(no_id("SubEvent").field(
                "sub_events",
                FieldDescriptor::array(FieldDescriptor::embedded(event)),
            ))
            .unwrap();
        graph
            .path_mut(sub, "sub_events")
            .unwrap()
            .discriminator("SubEvent", sub)
            .unwrap();
        assert!(graph.path(sub, "type").is_some());
        assert!(graph.path(sub, "kind").is_none());

        let input = blob!({
            "sub_events": [{
                "type": "SubEvent",
                "message": "m2",
                "sub_events": [{ "type": "SubEvent", "message": "m3", "sub_events": [] }]
            }]
        });
        let doc = graph.build(sub, &input).unwrap();
        let child = doc.get("sub_events").unwrap().as_array().unwrap()[0]
            .as_document()
            .unwrap();
        assert_eq!(child.discriminator_key(), Some("type"));
        assert_eq!(child.tag(), Some("SubEvent"));
        assert!(child.get("type").is_none());
        let out = doc.to_value();
        assert_eq!(out, input);
        let keys: Vec<&str> = out["sub_events"][0]
            .as_map()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect();
        assert_eq!(keys, ["sub_events", "message", "type"]);
    }

    #[test]
    fn null_tag_uses_base_schema_and_is_kept() {
        let (graph, event, container) = containers();
        let input = blob!({
            "message": "m",
            "items": [{ "kind": null, "message": "untagged" }]
        });
        let doc = graph.build(container, &input).unwrap();
        let child = doc.get("items").unwrap().as_array().unwrap()[0]
            .as_document()
            .unwrap();
        assert_eq!(child.schema_id(), event);
        assert_eq!(child.tag(), None);
        assert_eq!(child.discriminator_key(), Some("kind"));
        assert_eq!(doc.to_value(), input);
        assert_eq!(serde_json::to_value(&doc).unwrap(), serde_json::to_value(&input).unwrap());
    }

    #[test]
    fn explicit_key_required_at_every_level() {
        let mut graph = SchemaGraph::new();
        let event = graph
            .add(
                Schema::new("Event")
                    .field(ID_PATH, FieldDescriptor::scalar("Number").required(true))
                    .field("message", FieldDescriptor::scalar("String")),
            )
            .unwrap();
        let sub = graph
            .add(Schema::new("SubEvent").field(
                "sub_events",
                FieldDescriptor::array(FieldDescriptor::embedded(event)),
            ))
            .unwrap();
        graph
            .path_mut(sub, "sub_events")
            .unwrap()
            .discriminator("SubEvent", sub)
            .unwrap();

        let good = blob!({
            "_id": 1,
            "sub_events": [{ "_id": 2, "kind": "SubEvent", "sub_events": [{ "_id": 3, "message": "leaf" }] }]
        });
        let doc = graph.build(sub, &good).unwrap();
        assert_eq!(doc.id(), Some(&Value::Int(1)));
        assert_eq!(doc.to_value(), good);

        let missing = blob!({
            "_id": 1,
            "sub_events": [{ "kind": "SubEvent", "sub_events": [] }]
        });
        assert_eq!(
            graph.build(sub, &missing).unwrap_err(),
            Error::MissingRequiredField("sub_events.0._id".into())
        );

        let wrong = blob!({ "_id": "one" });
        assert!(matches!(
            graph.build(sub, &wrong),
            Err(Error::InvalidFieldValue { ref path, .. }) if path == "_id"
        ));
    }

    #[test]
    fn auto_key_generated() {
        let mut graph = SchemaGraph::new();
        let user = graph
            .add(Schema::new("User").field("name", FieldDescriptor::scalar("String")))
            .unwrap();
        let a = graph.build(user, &blob!({ "name": "a" })).unwrap();
        let b = graph.build(user, &blob!({ "name": "b", "_id": null })).unwrap();
        assert!(a.id().unwrap().is_id());
        assert!(b.id().unwrap().is_id());
        assert_ne!(a.id(), b.id());
        let out = a.to_value();
        let paths: Vec<&str> = out.as_map().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(paths, [ID_PATH, "name"]);

        let id = Uuid::new_v4();
        let kept = graph
            .build(user, &blob!({ "_id": id.to_string(), "name": "c" }))
            .unwrap();
        assert_eq!(kept.id(), Some(&Value::Id(id)));
    }

    #[test]
    fn defaults_nulls_and_coercion() {
        let mut graph = SchemaGraph::new();
        let s = graph
            .add(
                no_id("S")
                    .field("count", FieldDescriptor::scalar("Number"))
                    .field("label", FieldDescriptor::scalar("String").default_value("none"))
                    .field("note", FieldDescriptor::scalar("String"))
                    .field("flags", FieldDescriptor::array(FieldDescriptor::scalar("Boolean"))),
            )
            .unwrap();
        let doc = graph
            .build(s, &blob!({ "count": "12", "note": null, "flags": [true, "false", null] }))
            .unwrap();
        assert_eq!(
            doc.to_value(),
            blob!({ "count": 12, "label": "none", "note": null, "flags": [true, false, null] })
        );
        assert!(doc.get("note").unwrap().is_null());

        assert_eq!(
            graph.build(s, &blob!({ "flags": [true, 7] })).unwrap_err(),
            Error::InvalidFieldValue {
                path: "flags.1".into(),
                reason: "expected Boolean, got Int(7)".into()
            }
        );
        assert!(matches!(
            graph.build(s, &blob!({ "flags": true })),
            Err(Error::InvalidFieldValue { ref path, .. }) if path == "flags"
        ));
        assert!(matches!(
            graph.build(s, &blob!([1, 2])),
            Err(Error::InvalidFieldValue { ref path, .. }) if path.is_empty()
        ));
    }

    #[test]
    fn strict_drops_unknown_keys() {
        let mut graph = SchemaGraph::new();
        let strict = graph
            .add(no_id("Strict").field("a", FieldDescriptor::scalar("Number")))
            .unwrap();
        let loose = graph
            .add(
                Schema::with_options("Loose", SchemaOptions::new().id(false).strict(false))
                    .field("a", FieldDescriptor::scalar("Number")),
            )
            .unwrap();
        let input = blob!({ "z": "extra", "a": 1 });
        assert_eq!(graph.build(strict, &input).unwrap().to_value(), blob!({ "a": 1 }));
        let doc = graph.build(loose, &input).unwrap();
        assert_eq!(doc.extra().len(), 1);
        let out = doc.to_value();
        assert_eq!(out, input);
        let keys: Vec<&str> = out.as_map().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["a", "z"]);
    }

    #[test]
    fn root_uses_own_discriminators() {
        let mut graph = SchemaGraph::new();
        let shape = graph
            .add(no_id("Shape").field("name", FieldDescriptor::scalar("String")))
            .unwrap();
        let circle = graph
            .add(no_id("Circle").field("r", FieldDescriptor::scalar("Number")))
            .unwrap();
        let circle = graph.discriminator(shape, "Circle", circle).unwrap();

        let input = blob!({ "name": "c", "kind": "Circle", "r": 2 });
        let doc = graph.build(shape, &input).unwrap();
        assert_eq!(doc.schema_id(), circle);
        assert_eq!(doc.tag(), Some("Circle"));
        assert_eq!(doc.to_value(), input);

        assert_eq!(
            graph.build(shape, &blob!({ "kind": "Square" })).unwrap_err(),
            Error::UnknownDiscriminator {
                path: String::new(),
                tag: "Square".into()
            }
        );
        assert!(matches!(
            graph.build(shape, &blob!({ "kind": 3 })),
            Err(Error::InvalidFieldValue { ref path, .. }) if path == "kind"
        ));
    }

    #[test]
    fn mixed_variants_in_one_array() {
        let mut graph = SchemaGraph::new();
        let event = graph
            .add(no_id("Event").field("message", FieldDescriptor::scalar("String")))
            .unwrap();
        let click = graph
            .add(no_id("Click").field("x", FieldDescriptor::scalar("Number")))
            .unwrap();
        let key = graph
            .add(no_id("Key").field("code", FieldDescriptor::scalar("String")))
            .unwrap();
        let log = graph
            .add(no_id("Log").field(
                "events",
                FieldDescriptor::array(FieldDescriptor::embedded(event)),
            ))
            .unwrap();
        let click = graph.path_mut(log, "events").unwrap().discriminator("Click", click).unwrap();
        let key = graph.path_mut(log, "events").unwrap().discriminator("Key", key).unwrap();

        let input = blob!({
            "events": [
                { "kind": "Click", "message": "a", "x": 3 },
                { "message": "b" },
                { "kind": "Key", "code": "Enter", "message": "c" }
            ]
        });
        let doc = graph.build(log, &input).unwrap();
        let ids: Vec<SchemaId> = doc
            .get("events")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_document().unwrap().schema_id())
            .collect();
        assert_eq!(ids, [click, event, key]);
        assert_eq!(doc.to_value(), input);
    }

    #[test]
    fn parallel_builds() {
        let (graph, _, container) = containers();
        let graph = &graph;
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|depth| {
                    s.spawn(move || {
                        let input = nested(depth * 3);
                        let doc = graph.build(container, &input).unwrap();
                        doc.to_value() == input
                    })
                })
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap());
            }
        });
    }
}
