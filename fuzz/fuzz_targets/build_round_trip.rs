#![no_main]
use libfuzzer_sys::fuzz_target;
use polydoc::{FieldDescriptor, Schema, SchemaGraph, SchemaOptions, Value};

fn graph() -> (SchemaGraph, polydoc::SchemaId) {
    let mut graph = SchemaGraph::new();
    let event = graph
        .add(
            Schema::with_options("Event", SchemaOptions::new().id(false))
                .field("message", FieldDescriptor::scalar("String"))
                .field("count", FieldDescriptor::scalar("Mixed")),
        )
        .unwrap();
    let sub = graph
        .add(
            Schema::with_options("SubEvent", SchemaOptions::new().id(false))
                .field("items", FieldDescriptor::array(FieldDescriptor::embedded(event))),
        )
        .unwrap();
    graph
        .path_mut(sub, "items")
        .unwrap()
        .discriminator("SubEvent", sub)
        .unwrap();
    (graph, sub)
}

fuzz_target!(|data: &[u8]| {
    let blob: Value = match serde_json::from_slice(data) {
        Ok(blob) => blob,
        Err(_) => return,
    };
    let (graph, root) = graph();
    if let Ok(doc) = graph.build(root, &blob) {
        // Only blobs that use declared keys with canonical values are expected to come back
        // unchanged, so check that serializing is stable instead.
        let once = doc.to_value();
        let again = graph.build(root, &once).unwrap();
        assert_eq!(again.to_value(), once);
    }
});
