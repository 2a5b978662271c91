//! gRPC service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`ToDoHandler`).

pub mod handler;

#[cfg(test)]
mod tests;
