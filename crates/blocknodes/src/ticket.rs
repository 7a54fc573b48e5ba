use crate::to_value;
use async_trait::async_trait;
use blockcore::services::{TicketDelivery, TicketRequest};
use blockcore::{
    Block, BlockContext, BlockError, BlockOutput, BlockTypeDefinition, ConnectionPoint, ParamSpec,
    ParamType, ServiceError, Value,
};
use std::collections::HashMap;

/// Requests an ecash ticket from a mint
pub struct TicketRequestBlock;

#[async_trait]
impl Block for TicketRequestBlock {
    fn block_type(&self) -> &str {
        "ticket-request"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("ticket-request", "Ticket Request")
            .with_description("Requests a ticket from a mint")
            .with_category("tickets")
            .with_param(ParamSpec::new("mint_url", ParamType::String))
            .with_param(ParamSpec::new("amount", ParamType::Number).required())
            .with_param(
                ParamSpec::new("unit", ParamType::Choice)
                    .with_options(["sat", "usd", "eur"])
                    .with_default("sat"),
            )
            .with_input(ConnectionPoint::input("data", "Data"))
            .with_input(ConnectionPoint::input("mint", "Mint").optional())
            .with_output(
                ConnectionPoint::output("success", "Issued")
                    .with_field("ticket", ParamType::Object, "Issued ticket")
                    .with_field("token", ParamType::String, "Ticket token"),
            )
            .with_output(
                ConnectionPoint::output("failure", "Failed")
                    .with_field("error", ParamType::String, "Collaborator error"),
            )
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let data = ctx.require_input("data")?.clone();
        let amount = ctx.config_amount("amount")?;
        let unit = ctx.config_str("unit").unwrap_or_else(|| "sat".to_string());
        let mint_url = ctx.input_or_config("mint", "mint_url").ok_or_else(|| {
            BlockError::Configuration(
                "no mint: connect the mint input or set 'mint_url'".to_string(),
            )
        })?;

        let request = TicketRequest {
            mint_url: mint_url.clone(),
            amount,
            unit,
        };

        let mut result = HashMap::new();
        result.insert("data".to_string(), data);
        result.insert("mint_url".to_string(), Value::String(mint_url));

        match ctx
            .until_cancelled(ctx.services.protocol.request_ticket(request))
            .await?
        {
            Ok(ticket) => {
                ctx.events.info(format!("Ticket issued by {}", ticket.mint_url));
                result.insert("token".to_string(), Value::String(ticket.token.clone()));
                result.insert("ticket".to_string(), to_value(&ticket)?);
                Ok(BlockOutput::new().with_output("success", Value::Object(result)))
            }
            Err(ServiceError::Cancelled) => Err(BlockError::Cancelled),
            Err(e) => {
                tracing::warn!("Ticket request {} failed: {}", ctx.block_id, e);
                ctx.events.warn(format!("request_ticket failed: {}", e));
                result.insert("stage".to_string(), Value::from("request_ticket"));
                result.insert("error".to_string(), Value::String(e.to_string()));
                Ok(BlockOutput::new().with_output("failure", Value::Object(result)))
            }
        }
    }
}

/// Sends a ticket token to a recipient
pub struct TicketSendBlock;

impl TicketSendBlock {
    /// Accept a bare token string or an object carrying `token`
    fn token_of(ticket: &Value) -> Result<String, BlockError> {
        ticket
            .as_str()
            .map(str::to_string)
            .or_else(|| ticket.get("token").and_then(|t| t.as_str().map(str::to_string)))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BlockError::InvalidInputType {
                field: "ticket".to_string(),
                expected: "token string or object with 'token'".to_string(),
                actual: ticket.type_name().to_string(),
            })
    }
}

#[async_trait]
impl Block for TicketSendBlock {
    fn block_type(&self) -> &str {
        "ticket-send"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("ticket-send", "Ticket Send")
            .with_description("Sends a ticket to a recipient")
            .with_category("tickets")
            .with_param(ParamSpec::new("recipient", ParamType::String))
            .with_input(ConnectionPoint::input("ticket", "Ticket"))
            .with_input(ConnectionPoint::input("recipient", "Recipient").optional())
            .with_output(
                ConnectionPoint::output("sent", "Sent")
                    .with_field("recipient", ParamType::String, "Recipient key")
                    .with_field("receipt", ParamType::Object, "Delivery receipt"),
            )
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let token = Self::token_of(ctx.require_input("ticket")?)?;
        let recipient = ctx.input_or_config("recipient", "recipient").ok_or_else(|| {
            BlockError::Configuration(
                "no recipient: connect the recipient input or set 'recipient'".to_string(),
            )
        })?;

        let delivery = TicketDelivery {
            recipient: recipient.clone(),
            token: token.clone(),
        };

        let receipt = ctx
            .until_cancelled(ctx.services.protocol.send_ticket(delivery))
            .await?
            .map_err(|e| match e {
                ServiceError::Cancelled => BlockError::Cancelled,
                other => BlockError::Service(other),
            })?;

        ctx.events.info(format!("Ticket sent to {}", recipient));

        let mut result = HashMap::new();
        result.insert("recipient".to_string(), Value::String(recipient));
        result.insert("token".to_string(), Value::String(token));
        result.insert("receipt".to_string(), to_value(&receipt)?);

        Ok(BlockOutput::new().with_output("sent", Value::Object(result)))
    }
}
