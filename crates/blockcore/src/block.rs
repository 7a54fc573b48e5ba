use crate::{
    events::EventEmitter, BlockError, BlockId, BlockTypeDefinition, ExternalServices, Value,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Behavior of a block type. One implementation per kind, registered by id.
#[async_trait]
pub trait Block: Send + Sync {
    /// Unique type identifier (e.g., "trigger", "payment-request")
    fn block_type(&self) -> &str;

    /// Palette metadata, parameter schema and sockets
    fn definition(&self) -> BlockTypeDefinition;

    /// Run the behavior. Populate only the outputs whose branch was taken.
    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError>;

    /// Validate configuration at workflow load time
    fn validate_config(&self, config: &HashMap<String, Value>) -> Result<(), BlockError> {
        self.definition()
            .validate_values(config)
            .map_err(BlockError::Configuration)
    }
}

/// Execution context passed to each block invocation
#[derive(Clone)]
pub struct BlockContext {
    pub block_id: BlockId,

    /// Values received on input sockets, keyed by input socket id
    pub inputs: HashMap<String, Value>,

    /// Instance configuration with schema defaults filled in
    pub config: HashMap<String, Value>,

    pub services: ExternalServices,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Fired when the run is cancelled or times out
    pub cancellation: CancellationToken,

    /// Upper bound imposed by the run on open-ended waits
    pub wait_timeout: Option<Duration>,
}

impl BlockContext {
    pub fn new(block_id: impl Into<String>, services: ExternalServices, events: EventEmitter) -> Self {
        Self {
            block_id: block_id.into(),
            inputs: HashMap::new(),
            config: HashMap::new(),
            services,
            events,
            cancellation: CancellationToken::new(),
            wait_timeout: None,
        }
    }

    pub fn with_input(mut self, socket: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(socket.into(), value.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, BlockError> {
        self.inputs
            .get(name)
            .ok_or_else(|| BlockError::MissingInput(name.to_string()))
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, BlockError> {
        self.config
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| BlockError::Configuration(format!("Missing config: {}", name)))
    }

    /// Get config with default
    pub fn get_config_or(&self, name: &str, default: Value) -> Value {
        self.config.get(name).cloned().unwrap_or(default)
    }

    /// Config value as text, if set and non-empty
    pub fn config_str(&self, name: &str) -> Option<String> {
        self.config
            .get(name)
            .filter(|v| !v.is_null())
            .map(Value::to_text)
            .filter(|s| !s.trim().is_empty())
    }

    /// Numeric config value; numeric strings from the editor are accepted
    pub fn config_number(&self, name: &str) -> Result<f64, BlockError> {
        let value = self.require_config(name)?;
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
            .ok_or_else(|| {
                BlockError::Configuration(format!(
                    "'{}' must be a number, got {}",
                    name,
                    value.type_name()
                ))
            })
    }

    /// Positive whole amount, as used for payments and tickets
    pub fn config_amount(&self, name: &str) -> Result<u64, BlockError> {
        let amount = self.config_number(name)?;
        if amount <= 0.0 || amount.fract() != 0.0 {
            return Err(BlockError::Configuration(format!(
                "'{}' must be a positive whole number, got {}",
                name, amount
            )));
        }
        Ok(amount as u64)
    }

    /// Text from an optional input socket, falling back to a config key
    pub fn input_or_config(&self, input: &str, config_key: &str) -> Option<String> {
        self.inputs
            .get(input)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.config_str(config_key))
    }

    /// Await `fut` unless the run is cancelled first; the future is dropped on cancel
    pub async fn until_cancelled<F>(&self, fut: F) -> Result<F::Output, BlockError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(BlockError::Cancelled),
            output = fut => Ok(output),
        }
    }
}

/// Output from a block invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockOutput {
    /// Partial map of output socket id to value; absent keys were not taken
    pub outputs: HashMap<String, Value>,

    /// Execution metadata
    pub metadata: RunMetadata,
}

impl BlockOutput {
    pub fn new() -> Self {
        Self {
            outputs: HashMap::new(),
            metadata: RunMetadata::default(),
        }
    }

    pub fn with_output(mut self, socket: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(socket.into(), value.into());
        self
    }

    pub fn get(&self, socket: &str) -> Option<&Value> {
        self.outputs.get(socket)
    }
}

impl Default for BlockOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata about a block invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub execution_time_ms: u64,
    pub custom: HashMap<String, Value>,
}
