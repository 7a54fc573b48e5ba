//! Offline protocol client driven by a JSON script

use async_trait::async_trait;
use blockcore::services::{
    Invoice, InvoiceRequest, PaymentReceipt, PaymentRequest, Ticket, TicketDelivery,
    TicketReceipt, TicketRequest,
};
use blockcore::{HandshakeHub, ProtocolClient, ServiceError, Value};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{sleep, Duration};

/// How one protocol operation behaves
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationScript {
    /// Reject every call with this message
    #[serde(default)]
    pub fail: Option<String>,
    #[serde(default)]
    pub latency_ms: u64,
}

/// Script file accepted by `blockflow run --services`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceScript {
    #[serde(default)]
    pub create_invoice: OperationScript,
    #[serde(default)]
    pub request_payment: OperationScript,
    #[serde(default)]
    pub request_ticket: OperationScript,
    #[serde(default)]
    pub send_ticket: OperationScript,
    /// Handshake payloads delivered before the run starts, keyed by token
    #[serde(default)]
    pub handshakes: HashMap<String, serde_json::Value>,
}

pub struct ScriptedClient {
    script: ServiceScript,
    hub: HandshakeHub,
    sequence: AtomicU64,
}

impl ScriptedClient {
    pub fn new(script: ServiceScript, hub: HandshakeHub) -> Self {
        Self {
            script,
            hub,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn hub(&self) -> &HandshakeHub {
        &self.hub
    }

    /// Deliver the handshakes listed in the script
    pub async fn deliver_scripted_handshakes(&self) {
        for (token, payload) in &self.script.handshakes {
            self.hub.deliver(token.clone(), Value::from_json(payload.clone())).await;
        }
    }

    async fn play(&self, name: &str, op: &OperationScript) -> Result<u64, ServiceError> {
        if op.latency_ms > 0 {
            sleep(Duration::from_millis(op.latency_ms)).await;
        }
        if let Some(message) = &op.fail {
            tracing::debug!("Scripted {} rejected: {}", name, message);
            return Err(ServiceError::Rejected(message.clone()));
        }
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ProtocolClient for ScriptedClient {
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, ServiceError> {
        let n = self.play("create_invoice", &self.script.create_invoice).await?;
        Ok(Invoice {
            id: format!("inv-{}", n),
            payment_request: format!("lnbc{}{}{}", request.amount, request.unit, n),
            amount: request.amount,
            unit: request.unit,
        })
    }

    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt, ServiceError> {
        self.play("request_payment", &self.script.request_payment).await?;
        Ok(PaymentReceipt {
            invoice_id: request.invoice.id,
            counterpart: request.counterpart,
            settled_at: Utc::now(),
        })
    }

    async fn request_ticket(&self, request: TicketRequest) -> Result<Ticket, ServiceError> {
        let n = self.play("request_ticket", &self.script.request_ticket).await?;
        Ok(Ticket {
            token: format!("cashuA{}", n),
            mint_url: request.mint_url,
            amount: request.amount,
            unit: request.unit,
        })
    }

    async fn send_ticket(&self, delivery: TicketDelivery) -> Result<TicketReceipt, ServiceError> {
        self.play("send_ticket", &self.script.send_ticket).await?;
        Ok(TicketReceipt {
            recipient: delivery.recipient,
            delivered_at: Utc::now(),
        })
    }

    async fn wait_for_handshake(
        &self,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError> {
        self.hub.wait(token, timeout).await
    }
}
