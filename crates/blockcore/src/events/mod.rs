// crates/blockcore/src/events/mod.rs

mod base;

pub use base::{BlockEvent, EventBus, EventEmitter, ExecutionEvent, ExecutionId};
