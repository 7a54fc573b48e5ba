use blockcore::{Block, BlockTypeDefinition};
use std::collections::HashMap;
use std::sync::Arc;

struct RegisteredBlock {
    block: Arc<dyn Block>,
    definition: BlockTypeDefinition,
}

/// Registry of available block types.
///
/// Built once at startup and handed to the runtime explicitly; nothing in
/// here is global.
pub struct BlockRegistry {
    blocks: HashMap<String, RegisteredBlock>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
        }
    }

    /// Register a block type. A later registration with the same id wins.
    pub fn register(&mut self, block: Arc<dyn Block>) {
        let block_type = block.block_type().to_string();
        let definition = block.definition();

        if definition.id != block_type {
            tracing::warn!(
                "Block type {} declares definition id {}; registering under {}",
                block_type,
                definition.id,
                block_type
            );
        }

        if self.blocks.contains_key(&block_type) {
            tracing::info!("Replacing block type: {}", block_type);
        } else {
            tracing::info!("Registering block type: {}", block_type);
        }

        self.blocks
            .insert(block_type, RegisteredBlock { block, definition });
    }

    /// Behavior registered under `block_type`
    pub fn lookup(&self, block_type: &str) -> Option<Arc<dyn Block>> {
        self.blocks.get(block_type).map(|r| r.block.clone())
    }

    /// Metadata registered under `block_type`
    pub fn definition(&self, block_type: &str) -> Option<&BlockTypeDefinition> {
        self.blocks.get(block_type).map(|r| &r.definition)
    }

    /// All definitions, sorted by id, for the editor palette
    pub fn list(&self) -> Vec<BlockTypeDefinition> {
        let mut definitions: Vec<_> = self.blocks.values().map(|r| r.definition.clone()).collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        definitions
    }

    /// Get all registered block type ids, sorted
    pub fn list_block_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.blocks.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.blocks.contains_key(block_type)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
