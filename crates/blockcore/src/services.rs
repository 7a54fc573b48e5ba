//! External collaborators consumed by side-effecting blocks
//!
//! The protocol client is opaque to the engine: blocks call it, the engine
//! only hands it through the execution context.

use crate::Value;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServiceError {
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Call cancelled")]
    Cancelled,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub amount: u64,
    pub unit: String,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub payment_request: String,
    pub amount: u64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Public key of the party asked to pay
    pub counterpart: String,
    pub invoice: Invoice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub invoice_id: String,
    pub counterpart: String,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRequest {
    pub mint_url: String,
    pub amount: u64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub token: String,
    pub mint_url: String,
    pub amount: u64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDelivery {
    pub recipient: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketReceipt {
    pub recipient: String,
    pub delivered_at: DateTime<Utc>,
}

/// Async protocol operations used by the built-in blocks
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice, ServiceError>;

    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentReceipt, ServiceError>;

    async fn request_ticket(&self, request: TicketRequest) -> Result<Ticket, ServiceError>;

    async fn send_ticket(&self, delivery: TicketDelivery) -> Result<TicketReceipt, ServiceError>;

    /// Wait for the handshake callback keyed by `token`. `None` waits forever.
    async fn wait_for_handshake(
        &self,
        token: &str,
        timeout: Option<Duration>,
    ) -> Result<Value, ServiceError>;
}

/// Bundle of collaborators handed to every block invocation
#[derive(Clone)]
pub struct ExternalServices {
    pub protocol: Arc<dyn ProtocolClient>,
}

impl ExternalServices {
    pub fn new(protocol: Arc<dyn ProtocolClient>) -> Self {
        Self { protocol }
    }
}

enum HandshakeSlot {
    Waiting(Vec<(u64, oneshot::Sender<Value>)>),
    Delivered(Value),
}

type Slots = Arc<Mutex<HashMap<String, HandshakeSlot>>>;

fn lock_slots(slots: &Slots) -> MutexGuard<'_, HashMap<String, HandshakeSlot>> {
    // Critical sections never panic mid-update, so a poisoned map is still consistent
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes a waiter from its slot once its `wait` call ends, however it ends
struct WaiterGuard {
    slots: Slots,
    token: String,
    id: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        let mut slots = lock_slots(&self.slots);
        if let Some(HandshakeSlot::Waiting(waiters)) = slots.get_mut(&self.token) {
            waiters.retain(|(id, _)| *id != self.id);
            if waiters.is_empty() {
                slots.remove(&self.token);
            }
        }
    }
}

/// In-memory registry of keyed handshake callbacks.
///
/// A delivery that arrives while nobody waits is kept until the first
/// waiter claims it.
#[derive(Clone, Default)]
pub struct HandshakeHub {
    slots: Slots,
    next_waiter: Arc<AtomicU64>,
}

impl HandshakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a callback value to every live waiter on `token`, or buffer it
    pub async fn deliver(&self, token: impl Into<String>, value: Value) {
        let token = token.into();
        let mut slots = lock_slots(&self.slots);

        let mut delivered = 0;
        if let Some(HandshakeSlot::Waiting(waiters)) = slots.remove(&token) {
            for (_, waiter) in waiters {
                if waiter.send(value.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        if delivered > 0 {
            tracing::debug!("Delivered handshake {} to {} waiter(s)", token, delivered);
        } else {
            tracing::debug!("Buffering handshake {} until a waiter arrives", token);
            slots.insert(token, HandshakeSlot::Delivered(value));
        }
    }

    /// Wait for the callback keyed by `token`
    pub async fn wait(&self, token: &str, timeout: Option<Duration>) -> Result<Value, ServiceError> {
        let id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = oneshot::channel();
        {
            let mut slots = lock_slots(&self.slots);
            match slots.remove(token) {
                Some(HandshakeSlot::Delivered(value)) => return Ok(value),
                Some(HandshakeSlot::Waiting(mut waiters)) => {
                    waiters.push((id, tx));
                    slots.insert(token.to_string(), HandshakeSlot::Waiting(waiters));
                }
                None => {
                    slots.insert(token.to_string(), HandshakeSlot::Waiting(vec![(id, tx)]));
                }
            }
        }
        let _guard = WaiterGuard {
            slots: Arc::clone(&self.slots),
            token: token.to_string(),
            id,
        };

        let result = match timeout {
            Some(duration) => match tokio::time::timeout(duration, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    return Err(ServiceError::Timeout {
                        ms: duration.as_millis() as u64,
                    })
                }
            },
            None => receiver.await,
        };

        result.map_err(|_| ServiceError::Unavailable(format!("handshake {} was dropped", token)))
    }

    /// Number of tokens with at least one waiter
    pub async fn pending_waits(&self) -> usize {
        lock_slots(&self.slots)
            .values()
            .filter(|slot| matches!(slot, HandshakeSlot::Waiting(_)))
            .count()
    }
}
