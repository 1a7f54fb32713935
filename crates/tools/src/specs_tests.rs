use super::*;

#[test]
fn tool_descriptors_cover_the_closed_set() {
    let names: Vec<&str> = tool_descriptors().iter().map(|d| d.name).collect();
    assert_eq!(names, crate::dispatcher::TOOL_NAMES);
}

#[test]
fn every_descriptor_declares_an_object_schema() {
    for descriptor in tool_descriptors() {
        assert_eq!(descriptor.input_schema.get("type").and_then(Value::as_str), Some("object"));
    }
}
