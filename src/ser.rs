//! Serialization of built documents.
//!
//! A [`Document`] is written back out as the blob it was built from. Declared fields come first,
//! in the schema's declared order. When a discriminator tag selected the document's schema, the
//! tag is written under the key it was read from, at that key's declared position if the schema
//! has one and at the end of the declared fields otherwise. Undeclared keys kept by a non-strict
//! schema come last.
//!
//! Two forms are available: [`serialize`] produces a [`Value`], and `Document` implements
//! [`serde::Serialize`] so it can be streamed straight into any serde format.
//!
//! ```
//! # use polydoc::{blob, field::FieldDescriptor, graph::SchemaGraph, schema::{Schema, SchemaOptions}};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = SchemaGraph::new();
//! let note = graph.add(
//!     Schema::with_options("Note", SchemaOptions::new().id(false))
//!         .field("text", FieldDescriptor::scalar("String")),
//! )?;
//! let doc = graph.build(note, &blob!({ "text": "hi" }))?;
//! assert_eq!(serde_json::to_string(&doc)?, r#"{"text":"hi"}"#);
//! # Ok(())
//! # }
//! ```

use crate::document::{Document, FieldValue};
use crate::value::{Map, Value};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// One output entry of a document.
enum Entry<'a, 'g> {
    Tag(&'a str),
    Field(&'a FieldValue<'g>),
    Extra(&'a Value),
}

/// The entries of a document, keyed and in output order.
fn entries<'a, 'g>(doc: &'a Document<'g>) -> Vec<(&'a str, Entry<'a, 'g>)> {
    let schema = doc.schema();
    let tag = doc.discriminator_key().zip(doc.tag());
    let mut out = Vec::with_capacity(doc.len() + doc.extra().len() + 1);
    for (name, _) in schema.fields() {
        match tag {
            Some((key, tag)) if name == key => out.push((name, Entry::Tag(tag))),
            _ => {
                if let Some(value) = doc.get(name) {
                    out.push((name, Entry::Field(value)));
                }
            }
        }
    }
    if let Some((key, tag)) = tag {
        if !schema.has_path(key) {
            out.push((key, Entry::Tag(tag)));
        }
    }
    for (k, v) in doc.extra() {
        out.push((k.as_str(), Entry::Extra(v)));
    }
    out
}

/// Write a document back out as a blob.
pub fn serialize(doc: &Document) -> Value {
    let mut map = Map::with_capacity(doc.len() + doc.extra().len() + 1);
    for (k, entry) in entries(doc) {
        let v = match entry {
            Entry::Tag(tag) => Value::from(tag),
            Entry::Field(value) => field_value(value),
            Entry::Extra(value) => value.clone(),
        };
        map.insert(k.to_string(), v);
    }
    Value::Map(map)
}

pub(crate) fn field_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Scalar(v) => v.clone(),
        FieldValue::Embedded(doc) => serialize(doc),
        FieldValue::Array(items) => Value::Array(items.iter().map(field_value).collect()),
    }
}

impl<'g> Serialize for Document<'g> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = entries(self);
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, entry) in entries {
            match entry {
                Entry::Tag(tag) => map.serialize_entry(k, tag)?,
                Entry::Field(value) => map.serialize_entry(k, value)?,
                Entry::Extra(value) => map.serialize_entry(k, value)?,
            }
        }
        map.end()
    }
}

impl<'g> Serialize for FieldValue<'g> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Scalar(v) => v.serialize(serializer),
            FieldValue::Embedded(doc) => doc.serialize(serializer),
            FieldValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::field::FieldDescriptor;
    use crate::graph::SchemaGraph;
    use crate::schema::{Schema, SchemaOptions};
    use crate::value::Value;

    fn keys(v: &Value) -> Vec<&str> {
        v.as_map().unwrap().keys().map(|k| k.as_str()).collect()
    }

    #[test]
    fn tag_written_at_key_position() {
        let mut graph = SchemaGraph::new();
        let event = graph
            .add(
                Schema::with_options("Event", SchemaOptions::new().id(false))
                    .field("message", FieldDescriptor::scalar("String")),
            )
            .unwrap();
        let log = graph
            .add(
                Schema::with_options("Log", SchemaOptions::new().id(false))
                    .field("entry", FieldDescriptor::embedded(event)),
            )
            .unwrap();
        let click = graph
            .add(
                Schema::with_options("Click", SchemaOptions::new().id(false))
                    .field("x", FieldDescriptor::scalar("Number")),
            )
            .unwrap();
        graph
            .path_mut(log, "entry")
            .unwrap()
            .discriminator("Click", click)
            .unwrap();

        let doc = graph
            .build(log, &blob!({ "entry": { "x": 4, "message": "m", "kind": "Click" } }))
            .unwrap();
        let out = doc.to_value();
        assert_eq!(keys(&out["entry"]), ["message", "kind", "x"]);
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"entry":{"message":"m","kind":"Click","x":4}}"#
        );
    }

    #[test]
    fn json_matches_value() {
        let mut graph = SchemaGraph::new();
        let item = graph
            .add(
                Schema::with_options("Item", SchemaOptions::new().id(false))
                    .field("n", FieldDescriptor::scalar("Number"))
                    .field("data", FieldDescriptor::scalar("Buffer")),
            )
            .unwrap();
        let list = graph
            .add(
                Schema::with_options("List", SchemaOptions::new().id(false).strict(false))
                    .field("items", FieldDescriptor::array(FieldDescriptor::embedded(item))),
            )
            .unwrap();
        let input = blob!({
            "items": [{ "n": 1, "data": Value::Bin(vec![1, 2]) }, null],
            "extra": [true, 1.5]
        });
        let doc = graph.build(list, &input).unwrap();
        let from_serde: serde_json::Value = serde_json::to_value(&doc).unwrap();
        let from_value: serde_json::Value = serde_json::to_value(doc.to_value()).unwrap();
        assert_eq!(from_serde, from_value);
        assert_eq!(
            from_serde,
            serde_json::json!({ "items": [{ "n": 1, "data": [1, 2] }, null], "extra": [true, 1.5] })
        );
    }
}
