// crates/blocknodes/tests/common/mod.rs

#![allow(dead_code)]

use async_trait::async_trait;
use blockcore::services::{
    Invoice, InvoiceRequest, PaymentReceipt, PaymentRequest, Ticket, TicketDelivery,
    TicketReceipt, TicketRequest,
};
use blockcore::{
    BlockContext, EventBus, ExecutionId, ExternalServices, HandshakeHub, ProtocolClient,
    ServiceError, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Protocol client that records calls and fails the operations it is told to
#[derive(Default)]
pub struct MockProtocol {
    pub hub: HandshakeHub,
    pub fail_invoice: Option<ServiceError>,
    pub fail_payment: Option<ServiceError>,
    pub fail_ticket: Option<ServiceError>,
    pub fail_send: Option<ServiceError>,
    pub calls: Mutex<Vec<String>>,
}

impl MockProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: &str) {
        self.calls.lock().await.push(call.to_string());
    }
}

#[async_trait]
impl ProtocolClient for MockProtocol {
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, ServiceError> {
        self.record("create_invoice").await;
        if let Some(e) = &self.fail_invoice {
            return Err(e.clone());
        }
        Ok(Invoice {
            id: "inv-1".to_string(),
            payment_request: format!("lnbc{}", request.amount),
            amount: request.amount,
            unit: request.unit,
        })
    }

    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt, ServiceError> {
        self.record("request_payment").await;
        if let Some(e) = &self.fail_payment {
            return Err(e.clone());
        }
        Ok(PaymentReceipt {
            invoice_id: request.invoice.id,
            counterpart: request.counterpart,
            settled_at: chrono::Utc::now(),
        })
    }

    async fn request_ticket(&self, request: TicketRequest) -> Result<Ticket, ServiceError> {
        self.record("request_ticket").await;
        if let Some(e) = &self.fail_ticket {
            return Err(e.clone());
        }
        Ok(Ticket {
            token: "cashuA-token".to_string(),
            mint_url: request.mint_url,
            amount: request.amount,
            unit: request.unit,
        })
    }

    async fn send_ticket(&self, delivery: TicketDelivery) -> Result<TicketReceipt, ServiceError> {
        self.record("send_ticket").await;
        if let Some(e) = &self.fail_send {
            return Err(e.clone());
        }
        Ok(TicketReceipt {
            recipient: delivery.recipient,
            delivered_at: chrono::Utc::now(),
        })
    }

    async fn wait_for_handshake(
        &self,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError> {
        self.record("wait_for_handshake").await;
        self.hub.wait(token, timeout).await
    }
}

/// Context for calling a block directly, outside any run
pub fn context(protocol: Arc<MockProtocol>) -> BlockContext {
    let bus = EventBus::new(64);
    let emitter = bus.create_emitter(ExecutionId::new_v4(), "block-under-test".to_string());
    BlockContext::new("block-under-test", ExternalServices::new(protocol), emitter)
}

pub fn json(value: serde_json::Value) -> Value {
    Value::from_json(value)
}
