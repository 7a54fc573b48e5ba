//! Workflow execution runtime
//!
//! This crate provides the block type registry, structural validation and
//! the execution engine that resolves a workflow's sinks backward through
//! their producers.

mod executor;
mod registry;
mod runtime;
mod store;
mod validator;

pub use executor::{RunOptions, RunReport, WorkflowExecutor};
pub use registry::BlockRegistry;
pub use runtime::{BlockRuntime, RunHandle, RuntimeConfig};
pub use store::{InMemoryStore, WorkflowStore};
pub use validator::{build_graph, validate_workflow};
