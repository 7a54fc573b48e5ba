//! Standard block library
//!
//! The built-in block types of the automation palette

mod conditional;
mod constant;
mod payment;
mod split;
mod ticket;
mod trigger;

pub use conditional::{evaluate as evaluate_condition, ConditionalBlock, OPERATORS};
pub use constant::ConstantBlock;
pub use payment::PaymentRequestBlock;
pub use split::SplitBlock;
pub use ticket::{TicketRequestBlock, TicketSendBlock};
pub use trigger::TriggerBlock;

use blockcore::{BlockError, Value};
use blockruntime::BlockRegistry;
use serde::Serialize;
use std::sync::Arc;

/// Register all standard blocks with a registry
pub fn register_all(registry: &mut BlockRegistry) {
    registry.register(Arc::new(TriggerBlock));
    registry.register(Arc::new(ConstantBlock));
    registry.register(Arc::new(SplitBlock));
    registry.register(Arc::new(ConditionalBlock));
    registry.register(Arc::new(PaymentRequestBlock));
    registry.register(Arc::new(TicketRequestBlock));
    registry.register(Arc::new(TicketSendBlock));
}

/// A registry holding every standard block
pub fn builtin_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    register_all(&mut registry);
    registry
}

/// Serialize a collaborator result into a socket value
pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value, BlockError> {
    serde_json::to_value(value)
        .map(Value::from_json)
        .map_err(|e| BlockError::ExecutionFailed(format!("serialization error: {}", e)))
}
