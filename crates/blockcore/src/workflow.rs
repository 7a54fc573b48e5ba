use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type BlockId = String;
pub type ConnectionId = String;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Complete workflow aggregate, loaded and saved as a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub blocks: Vec<BlockSpec>,
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub configs: Vec<BlockConfig>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

fn default_active() -> bool {
    true
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            blocks: Vec::new(),
            connections: Vec::new(),
            configs: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
            settings: WorkflowSettings::default(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn add_block(&mut self, block: BlockSpec) -> BlockId {
        let id = block.id.clone();
        self.blocks.push(block);
        self.touch();
        id
    }

    /// Wire an output socket to an input socket and return the connection id
    pub fn connect(
        &mut self,
        from_block: impl Into<String>,
        from_socket: impl Into<String>,
        to_block: impl Into<String>,
        to_socket: impl Into<String>,
    ) -> ConnectionId {
        let connection = Connection {
            id: new_id(),
            from_block: from_block.into(),
            from_socket: from_socket.into(),
            to_block: to_block.into(),
            to_socket: to_socket.into(),
        };
        let id = connection.id.clone();
        self.connections.push(connection);
        self.touch();
        id
    }

    pub fn disconnect(&mut self, connection_id: &str) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == connection_id)?;
        self.touch();
        Some(self.connections.remove(index))
    }

    /// Set one config value, creating the block's config on first use
    pub fn configure(
        &mut self,
        block_id: &str,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) {
        match self.configs.iter_mut().find(|c| c.block_id == block_id) {
            Some(config) => {
                config.values.insert(key.into(), value.into());
            }
            None => {
                let config = BlockConfig::new(block_id).with_value(key, value);
                self.configs.push(config);
            }
        }
        self.touch();
    }

    /// Remove a block along with every connection and config referencing it
    pub fn remove_block(&mut self, block_id: &str) -> Option<BlockSpec> {
        let index = self.blocks.iter().position(|b| b.id == block_id)?;
        let removed = self.blocks.remove(index);
        self.connections
            .retain(|c| c.from_block != block_id && c.to_block != block_id);
        self.configs.retain(|c| c.block_id != block_id);
        self.touch();
        Some(removed)
    }

    pub fn find_block(&self, id: &str) -> Option<&BlockSpec> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn config_for(&self, block_id: &str) -> Option<&BlockConfig> {
        self.configs.iter().find(|c| c.block_id == block_id)
    }

    /// Connections whose destination is `block_id`
    pub fn incoming<'a>(&'a self, block_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.to_block == block_id)
    }

    /// Connections whose source is `block_id`
    pub fn outgoing<'a>(&'a self, block_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.from_block == block_id)
    }

    /// Blocks nothing consumes from; a run evaluates backward from these
    pub fn sinks(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| self.outgoing(&b.id).next().is_none())
            .map(|b| b.id.clone())
            .collect()
    }
}

/// Block instance placed in a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    pub id: BlockId,
    pub block_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub size: Option<Size>,
}

impl BlockSpec {
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            block_type: block_type.into(),
            name: None,
            position: None,
            size: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Some(Size { width, height });
        self
    }
}

/// Edge from an output socket to an input socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub from_block: BlockId,
    pub from_socket: String,
    pub to_block: BlockId,
    pub to_socket: String,
}

/// Per-instance parameter values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    pub id: String,
    pub block_id: BlockId,
    pub values: HashMap<String, Value>,
}

impl BlockConfig {
    pub fn new(block_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            block_id: block_id.into(),
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// Block position in the visual editor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// How a run treats its sink blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkPolicy {
    /// Evaluate every sink and report each outcome
    #[default]
    All,
    /// First sink to complete wins; the rest of the run is cancelled
    FirstCompleted,
}

/// Per-workflow execution settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub max_execution_time_ms: Option<u64>,
    #[serde(default)]
    pub trigger_timeout_ms: Option<u64>,
    #[serde(default)]
    pub sink_policy: SinkPolicy,
}
