//! Core abstractions for the block workflow engine
//!
//! This crate provides the graph data model, the block behavior contract
//! and the interfaces of the external collaborators blocks call into.
//! It does not execute anything itself.

mod block;
mod definition;
mod error;
pub mod events;
mod outcome;
pub mod services;
mod value;
mod workflow;

pub use block::{Block, BlockContext, BlockOutput, RunMetadata};
pub use definition::{
    BlockTypeDefinition, ConnectionPoint, DataField, ParamSpec, ParamType, SocketDirection,
};
pub use error::{BlockError, FlowError, WorkflowError};
pub use events::*;
pub use outcome::{BlockOutcome, BlockStatus, Failure};
pub use services::{ExternalServices, HandshakeHub, ProtocolClient, ServiceError};
pub use value::Value;
pub use workflow::{
    BlockConfig, BlockId, BlockSpec, Connection, ConnectionId, Position, SinkPolicy, Size,
    Workflow, WorkflowId, WorkflowSettings,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
