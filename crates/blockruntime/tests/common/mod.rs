// crates/blockruntime/tests/common/mod.rs

#![allow(dead_code)]

use async_trait::async_trait;
use blockcore::services::{
    Invoice, InvoiceRequest, PaymentReceipt, PaymentRequest, Ticket, TicketDelivery,
    TicketReceipt, TicketRequest,
};
use blockcore::{
    Block, BlockContext, BlockError, BlockOutput, BlockTypeDefinition, ConnectionPoint,
    ExternalServices, ParamSpec, ParamType, ProtocolClient, ServiceError, Value,
};
use blockruntime::BlockRegistry;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Protocol client for graphs that never call out
pub struct NoProtocol;

#[async_trait]
impl ProtocolClient for NoProtocol {
    async fn create_invoice(&self, _: InvoiceRequest) -> Result<Invoice, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }
    async fn request_payment(&self, _: PaymentRequest) -> Result<PaymentReceipt, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }
    async fn request_ticket(&self, _: TicketRequest) -> Result<Ticket, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }
    async fn send_ticket(&self, _: TicketDelivery) -> Result<TicketReceipt, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }
    async fn wait_for_handshake(&self, _: &str, _: Option<Duration>) -> Result<Value, ServiceError> {
        Err(ServiceError::Unavailable("offline".into()))
    }
}

pub fn services() -> ExternalServices {
    ExternalServices::new(Arc::new(NoProtocol))
}

/// Source with no inputs that counts its invocations
pub struct SourceBlock {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Block for SourceBlock {
    fn block_type(&self) -> &str {
        "source"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("source", "Source").with_output(ConnectionPoint::output("out", "Out"))
    }

    async fn run(&self, _ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(BlockOutput::new().with_output("out", "payload"))
    }
}

/// Forwards its required input
pub struct PassBlock {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Block for PassBlock {
    fn block_type(&self) -> &str {
        "pass"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("pass", "Pass")
            .with_input(ConnectionPoint::input("in", "In"))
            .with_output(ConnectionPoint::output("out", "Out"))
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let value = ctx.require_input("in")?.clone();
        Ok(BlockOutput::new().with_output("out", value))
    }
}

/// Two required inputs, one output
pub struct JoinBlock;

#[async_trait]
impl Block for JoinBlock {
    fn block_type(&self) -> &str {
        "join"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("join", "Join")
            .with_input(ConnectionPoint::input("left", "Left"))
            .with_input(ConnectionPoint::input("right", "Right"))
            .with_output(ConnectionPoint::output("out", "Out"))
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let left = ctx.require_input("left")?.to_text();
        let right = ctx.require_input("right")?.to_text();
        Ok(BlockOutput::new().with_output("out", format!("{}+{}", left, right)))
    }
}

/// Populates exactly one of `yes` / `no` according to its `take` config
pub struct BranchBlock;

#[async_trait]
impl Block for BranchBlock {
    fn block_type(&self) -> &str {
        "branch"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("branch", "Branch")
            .with_param(
                ParamSpec::new("take", ParamType::Choice)
                    .with_options(["yes", "no"])
                    .required(),
            )
            .with_input(ConnectionPoint::input("in", "In"))
            .with_output(ConnectionPoint::output("yes", "Yes"))
            .with_output(ConnectionPoint::output("no", "No"))
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let value = ctx.require_input("in")?.clone();
        let take = ctx.config_str("take").unwrap_or_else(|| "yes".to_string());
        Ok(BlockOutput::new().with_output(take, value))
    }
}

/// Always returns a behavior error
pub struct FailBlock;

#[async_trait]
impl Block for FailBlock {
    fn block_type(&self) -> &str {
        "fail"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("fail", "Fail").with_output(ConnectionPoint::output("out", "Out"))
    }

    async fn run(&self, _ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        Err(BlockError::ExecutionFailed("boom".to_string()))
    }
}

/// Sets its flag when dropped, proving the in-flight work went away
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Never finishes on its own; honours cancellation
pub struct StuckBlock {
    pub started: Arc<AtomicBool>,
    pub dropped: Arc<AtomicBool>,
}

#[async_trait]
impl Block for StuckBlock {
    fn block_type(&self) -> &str {
        "stuck"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("stuck", "Stuck").with_output(ConnectionPoint::output("out", "Out"))
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let _guard = DropFlag(Arc::clone(&self.dropped));
        self.started.store(true, Ordering::SeqCst);
        ctx.until_cancelled(std::future::pending::<()>()).await?;
        Ok(BlockOutput::new())
    }
}

/// Waits for an external event that never arrives and ignores cancellation
pub struct WaiterBlock {
    pub dropped: Arc<AtomicBool>,
}

#[async_trait]
impl Block for WaiterBlock {
    fn block_type(&self) -> &str {
        "waiter"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("waiter", "Waiter")
            .with_output(ConnectionPoint::output("event", "Event"))
            .waiting_for_event()
    }

    async fn run(&self, _ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let _guard = DropFlag(Arc::clone(&self.dropped));
        std::future::pending::<()>().await;
        Ok(BlockOutput::new())
    }
}

/// Records how many invocations overlap
pub struct ProbeBlock {
    pub current: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Block for ProbeBlock {
    fn block_type(&self) -> &str {
        "probe"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("probe", "Probe").with_output(ConnectionPoint::output("out", "Out"))
    }

    async fn run(&self, _ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(BlockOutput::new().with_output("out", true))
    }
}

/// Handles to the counters and flags behind a [`test_registry`]
#[derive(Default, Clone)]
pub struct Probes {
    pub source_calls: Arc<AtomicUsize>,
    pub pass_calls: Arc<AtomicUsize>,
    pub stuck_started: Arc<AtomicBool>,
    pub stuck_dropped: Arc<AtomicBool>,
    pub waiter_dropped: Arc<AtomicBool>,
    pub current: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

pub fn test_registry() -> (BlockRegistry, Probes) {
    let probes = Probes::default();
    let mut registry = BlockRegistry::new();
    registry.register(Arc::new(SourceBlock {
        calls: Arc::clone(&probes.source_calls),
    }));
    registry.register(Arc::new(PassBlock {
        calls: Arc::clone(&probes.pass_calls),
    }));
    registry.register(Arc::new(JoinBlock));
    registry.register(Arc::new(BranchBlock));
    registry.register(Arc::new(FailBlock));
    registry.register(Arc::new(StuckBlock {
        started: Arc::clone(&probes.stuck_started),
        dropped: Arc::clone(&probes.stuck_dropped),
    }));
    registry.register(Arc::new(WaiterBlock {
        dropped: Arc::clone(&probes.waiter_dropped),
    }));
    registry.register(Arc::new(ProbeBlock {
        current: Arc::clone(&probes.current),
        peak: Arc::clone(&probes.peak),
    }));
    (registry, probes)
}
