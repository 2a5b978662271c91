//! Generated protobuf messages and tonic bindings for `todo.proto`.

tonic::include_proto!("todo");

/// Encoded file descriptor set for `todo.proto`, served by the reflection
/// service.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("todo_descriptor");
