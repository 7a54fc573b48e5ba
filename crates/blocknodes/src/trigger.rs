use async_trait::async_trait;
use blockcore::{
    Block, BlockContext, BlockError, BlockOutput, BlockTypeDefinition, ConnectionPoint, ParamSpec,
    ParamType, ServiceError,
};
use tokio::time::Duration;

/// Entry point of a workflow: waits for the handshake callback keyed by its token
pub struct TriggerBlock;

#[async_trait]
impl Block for TriggerBlock {
    fn block_type(&self) -> &str {
        "trigger"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("trigger", "Trigger")
            .with_description("Waits for a handshake callback and emits its payload")
            .with_category("triggers")
            .with_param(
                ParamSpec::new("token", ParamType::String)
                    .required()
                    .with_description("Handshake token to listen on"),
            )
            .with_param(
                ParamSpec::new("timeout_ms", ParamType::Number)
                    .with_description("Give up after this many milliseconds"),
            )
            .with_output(
                ConnectionPoint::output("event", "Event")
                    .with_field("payload", ParamType::Object, "Value delivered with the callback"),
            )
            .waiting_for_event()
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let token = ctx
            .config_str("token")
            .ok_or_else(|| BlockError::Configuration("Missing config: token".to_string()))?;

        let own_timeout = match ctx.config.get("timeout_ms") {
            Some(v) if !v.is_null() => Some(Duration::from_millis(ctx.config_amount("timeout_ms")?)),
            _ => None,
        };
        // The tighter of the configured and run-imposed bounds wins
        let timeout = match (own_timeout, ctx.wait_timeout) {
            (Some(own), Some(run)) => Some(own.min(run)),
            (own, run) => own.or(run),
        };

        ctx.events.info(format!("Waiting for handshake {}", token));
        tracing::debug!("Trigger {} waiting on {} (timeout {:?})", ctx.block_id, token, timeout);

        let received = ctx
            .until_cancelled(ctx.services.protocol.wait_for_handshake(&token, timeout))
            .await?;

        let value = received.map_err(|e| match e {
            ServiceError::Timeout { ms } => BlockError::Timeout { ms },
            ServiceError::Cancelled => BlockError::Cancelled,
            other => BlockError::Service(other),
        })?;

        ctx.events.data("event", value.clone());
        Ok(BlockOutput::new().with_output("event", value))
    }
}
