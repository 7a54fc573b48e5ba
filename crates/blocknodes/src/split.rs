use async_trait::async_trait;
use blockcore::{Block, BlockContext, BlockError, BlockOutput, BlockTypeDefinition, ConnectionPoint};

/// Fans one value out to two outputs
pub struct SplitBlock;

#[async_trait]
impl Block for SplitBlock {
    fn block_type(&self) -> &str {
        "split"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("split", "Split")
            .with_description("Sends the input to both outputs")
            .with_category("flow")
            .with_input(ConnectionPoint::input("data", "Data"))
            .with_output(ConnectionPoint::output("first", "First"))
            .with_output(ConnectionPoint::output("second", "Second"))
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let data = ctx.require_input("data")?;

        Ok(BlockOutput::new()
            .with_output("first", data.clone())
            .with_output("second", data.clone()))
    }
}
