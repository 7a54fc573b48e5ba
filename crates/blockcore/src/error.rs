use crate::services::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Block error: {0}")]
    Block(#[from] BlockError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a block behavior or while preparing its context
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Service call failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,
}

/// Structural problems with a workflow graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Duplicate block id: {0}")]
    DuplicateBlock(String),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Unknown block type '{block_type}' on block {block_id}")]
    UnknownBlockType { block_id: String, block_type: String },

    #[error("Invalid connection {connection_id}: {reason}")]
    InvalidConnection { connection_id: String, reason: String },

    #[error("Input '{socket}' of block {block_id} has multiple producers: {connections:?}")]
    MultipleProducers {
        block_id: String,
        socket: String,
        connections: Vec<String>,
    },

    #[error("Cyclic dependency detected through connections {connections:?}")]
    CyclicDependency { connections: Vec<String> },

    #[error("Config {config_id} refers to missing block {block_id}")]
    DanglingConfig { config_id: String, block_id: String },

    #[error("Invalid config for block {block_id}: {reason}")]
    InvalidConfig { block_id: String, reason: String },
}
