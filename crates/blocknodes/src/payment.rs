use crate::to_value;
use async_trait::async_trait;
use blockcore::services::{InvoiceRequest, PaymentRequest};
use blockcore::{
    Block, BlockContext, BlockError, BlockOutput, BlockTypeDefinition, ConnectionPoint, ParamSpec,
    ParamType, ServiceError, Value,
};
use std::collections::HashMap;

/// Creates an invoice and asks the counterpart to pay it
pub struct PaymentRequestBlock;

#[async_trait]
impl Block for PaymentRequestBlock {
    fn block_type(&self) -> &str {
        "payment-request"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("payment-request", "Payment Request")
            .with_description("Requests a payment from a counterpart")
            .with_category("payments")
            .with_param(ParamSpec::new("amount", ParamType::Number).required())
            .with_param(
                ParamSpec::new("unit", ParamType::Choice)
                    .with_options(["sat", "msat"])
                    .with_default("sat"),
            )
            .with_param(
                ParamSpec::new("counterpart", ParamType::String)
                    .with_description("Public key to request from when the input is not connected"),
            )
            .with_param(ParamSpec::new("memo", ParamType::String))
            .with_input(ConnectionPoint::input("data", "Data"))
            .with_input(ConnectionPoint::input("counterpart", "Counterpart").optional())
            .with_output(
                ConnectionPoint::output("success", "Paid")
                    .with_field("invoice", ParamType::Object, "Invoice that was paid")
                    .with_field("receipt", ParamType::Object, "Settlement receipt"),
            )
            .with_output(
                ConnectionPoint::output("failure", "Failed")
                    .with_field("stage", ParamType::String, "create_invoice or request_payment")
                    .with_field("error", ParamType::String, "Collaborator error"),
            )
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let data = ctx.require_input("data")?.clone();
        let amount = ctx.config_amount("amount")?;
        let unit = ctx.config_str("unit").unwrap_or_else(|| "sat".to_string());
        let counterpart = ctx.input_or_config("counterpart", "counterpart").ok_or_else(|| {
            BlockError::Configuration(
                "no counterpart key: connect the counterpart input or set 'counterpart'".to_string(),
            )
        })?;
        let memo = ctx.config_str("memo");

        let protocol = &ctx.services.protocol;

        let invoice = match ctx
            .until_cancelled(protocol.create_invoice(InvoiceRequest { amount, unit, memo }))
            .await?
        {
            Ok(invoice) => invoice,
            Err(e) => return failure(&ctx, data, &counterpart, "create_invoice", e),
        };
        ctx.events.info(format!("Invoice {} created", invoice.id));

        let request = PaymentRequest {
            counterpart: counterpart.clone(),
            invoice: invoice.clone(),
        };
        let receipt = match ctx.until_cancelled(protocol.request_payment(request)).await? {
            Ok(receipt) => receipt,
            Err(e) => return failure(&ctx, data, &counterpart, "request_payment", e),
        };

        ctx.events.info(format!("Invoice {} paid by {}", invoice.id, counterpart));

        let mut result = HashMap::new();
        result.insert("data".to_string(), data);
        result.insert("counterpart".to_string(), Value::String(counterpart));
        result.insert("invoice".to_string(), to_value(&invoice)?);
        result.insert("receipt".to_string(), to_value(&receipt)?);

        Ok(BlockOutput::new().with_output("success", Value::Object(result)))
    }
}

fn failure(
    ctx: &BlockContext,
    data: Value,
    counterpart: &str,
    stage: &str,
    error: ServiceError,
) -> Result<BlockOutput, BlockError> {
    if error == ServiceError::Cancelled {
        return Err(BlockError::Cancelled);
    }

    tracing::warn!("Payment request {} failed at {}: {}", ctx.block_id, stage, error);
    ctx.events.warn(format!("{} failed: {}", stage, error));

    let mut result = HashMap::new();
    result.insert("data".to_string(), data);
    result.insert("counterpart".to_string(), Value::from(counterpart));
    result.insert("stage".to_string(), Value::from(stage));
    result.insert("error".to_string(), Value::String(error.to_string()));

    Ok(BlockOutput::new().with_output("failure", Value::Object(result)))
}
