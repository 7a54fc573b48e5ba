use crate::registry::BlockRegistry;
use crate::validator::validate_workflow;
use blockcore::{
    BlockContext, BlockError, BlockId, BlockOutcome, BlockStatus, ConnectionId, EventBus,
    ExecutionEvent, ExecutionId, ExternalServices, Failure, FlowError, SinkPolicy, Workflow,
    WorkflowError, WorkflowId,
};
use chrono::Utc;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

type SharedOutcome = Shared<BoxFuture<'static, BlockOutcome>>;

/// Per-run overrides. Unset fields fall back to the workflow settings,
/// then to the executor defaults.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Cancel the whole run after this long
    pub timeout: Option<Duration>,
    /// Upper bound for blocks that wait on an external event
    pub trigger_timeout: Option<Duration>,
    pub sink_policy: Option<SinkPolicy>,
}

impl RunOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_trigger_timeout(mut self, timeout: Duration) -> Self {
        self.trigger_timeout = Some(timeout);
        self
    }

    pub fn with_sink_policy(mut self, policy: SinkPolicy) -> Self {
        self.sink_policy = Some(policy);
        self
    }
}

/// Executes workflows by resolving sink blocks backward through their
/// producers, running every block at most once per run
pub struct WorkflowExecutor {
    max_parallel: usize,
    default_trigger_timeout: Option<Duration>,
}

impl WorkflowExecutor {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            default_trigger_timeout: None,
        }
    }

    pub fn with_default_trigger_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_trigger_timeout = timeout;
        self
    }

    /// Validate and run a workflow, reporting the outcome of every sink.
    ///
    /// Structural problems are returned as `Err` before any block runs.
    /// Cancelling `cancel` settles every pending block as cancelled.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        registry: Arc<BlockRegistry>,
        services: ExternalServices,
        event_bus: &EventBus,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunReport, FlowError> {
        if let Err(e) = validate_workflow(workflow, &registry) {
            tracing::error!("Workflow {} failed validation: {}", workflow.id, e);
            return Err(FlowError::Workflow(e));
        }

        self.run_validated(workflow, registry, services, event_bus, options, cancel)
            .await
    }

    async fn run_validated(
        &self,
        workflow: &Workflow,
        registry: Arc<BlockRegistry>,
        services: ExternalServices,
        event_bus: &EventBus,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunReport, FlowError> {
        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();
        let settings = &workflow.settings;

        let timeout = options
            .timeout
            .or(settings.max_execution_time_ms.map(Duration::from_millis));
        let trigger_timeout = options
            .trigger_timeout
            .or(settings.trigger_timeout_ms.map(Duration::from_millis))
            .or(self.default_trigger_timeout);
        let sink_policy = options.sink_policy.unwrap_or(settings.sink_policy);

        let sinks = workflow.sinks();

        event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            workflow_id: workflow.id,
            sinks: sinks.clone(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Starting run {} of workflow {} ({} sinks)",
            execution_id,
            workflow.id,
            sinks.len()
        );

        // Internal cancellation (timeouts, first-sink-wins) must not leak to the caller's token
        let run_cancel = cancel.child_token();
        let statuses = workflow
            .blocks
            .iter()
            .map(|b| (b.id.clone(), BlockStatus::Pending))
            .collect();

        let run = Arc::new(Run {
            execution_id,
            workflow: Arc::new(workflow.clone()),
            registry,
            services,
            events: event_bus.clone(),
            cancel: run_cancel.clone(),
            trigger_timeout,
            permits: Arc::new(Semaphore::new(self.max_parallel)),
            cache: Mutex::new(HashMap::new()),
            waits: Mutex::new(HashMap::new()),
            statuses: Mutex::new(statuses),
            invocations: AtomicUsize::new(0),
        });

        let watchdog = timeout.map(|duration| {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                tracing::warn!(
                    "Run {} exceeded {}ms; cancelling",
                    execution_id,
                    duration.as_millis()
                );
                token.cancel();
            })
        });

        let outcomes = match sink_policy {
            SinkPolicy::All => run.resolve_all(&sinks).await,
            SinkPolicy::FirstCompleted => run.resolve_first(&sinks).await,
        };

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
        run.cache.lock().await.clear();

        let duration_ms = start_time.elapsed().as_millis() as u64;

        if let Some(structural) = outcomes.values().find_map(|o| o.structural_error()) {
            tracing::error!("Run {} aborted: {}", execution_id, structural);
            run_cancel.cancel();
            event_bus.emit(ExecutionEvent::RunCompleted {
                execution_id,
                success: false,
                duration_ms,
                timestamp: Utc::now(),
            });
            return Err(FlowError::Workflow(structural.clone()));
        }

        let report = RunReport {
            execution_id,
            workflow_id: workflow.id,
            sink_policy,
            sinks: outcomes,
            statuses: run.statuses.lock().await.clone(),
            invocations: run.invocations.load(Ordering::SeqCst),
            total_blocks: workflow.blocks.len(),
            cancelled: run_cancel.is_cancelled(),
            duration_ms,
        };

        let success = report.is_success();
        event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Run {} finished in {}ms: {} invocation(s), success={}",
            execution_id,
            duration_ms,
            report.invocations,
            success
        );

        Ok(report)
    }
}

/// State shared by every resolution within one run
struct Run {
    execution_id: ExecutionId,
    workflow: Arc<Workflow>,
    registry: Arc<BlockRegistry>,
    services: ExternalServices,
    events: EventBus,
    cancel: CancellationToken,
    trigger_timeout: Option<Duration>,
    permits: Arc<Semaphore>,
    /// One shared future per block id; the first caller inserts, later callers await it
    cache: Mutex<HashMap<BlockId, SharedOutcome>>,
    /// Consumer -> producers it has asked for; only touched while `cache` is held
    waits: Mutex<HashMap<BlockId, HashSet<BlockId>>>,
    statuses: Mutex<HashMap<BlockId, BlockStatus>>,
    invocations: AtomicUsize,
}

impl Run {
    async fn resolve_all(self: &Arc<Self>, sinks: &[BlockId]) -> HashMap<BlockId, BlockOutcome> {
        let resolutions = sinks.iter().map(|sink| {
            let outcome = self.resolve(sink.clone(), None);
            let sink = sink.clone();
            async move { (sink, outcome.await) }
        });

        join_all(resolutions).await.into_iter().collect()
    }

    /// Resolve sinks until one completes, then cancel the rest and collect how they settled
    async fn resolve_first(self: &Arc<Self>, sinks: &[BlockId]) -> HashMap<BlockId, BlockOutcome> {
        let mut pending: FuturesUnordered<_> = sinks
            .iter()
            .map(|sink| {
                let outcome = self.resolve(sink.clone(), None);
                let sink = sink.clone();
                async move { (sink, outcome.await) }
            })
            .collect();

        let mut outcomes = HashMap::new();
        let mut winner: Option<BlockId> = None;

        while let Some((sink, outcome)) = pending.next().await {
            if winner.is_none() && outcome.is_completed() {
                tracing::info!("Sink {} completed first; cancelling remaining sinks", sink);
                winner = Some(sink.clone());
                self.cancel.cancel();
            }
            outcomes.insert(sink, outcome);
        }

        outcomes
    }

    /// Resolve one block, sharing the in-flight or finished result with every other caller.
    ///
    /// Every request records a consumer -> producer edge before awaiting. An edge
    /// that closes a loop fails with a cycle instead of awaiting a future that
    /// (transitively) awaits the caller.
    fn resolve(self: &Arc<Self>, block_id: BlockId, consumer: Option<BlockId>) -> BoxFuture<'static, BlockOutcome> {
        let run = Arc::clone(self);

        async move {
            let shared = {
                let mut cache = run.cache.lock().await;

                if let Some(consumer) = consumer {
                    let mut waits = run.waits.lock().await;
                    waits.entry(consumer.clone()).or_default().insert(block_id.clone());
                    if let Some(mut path) = wait_path(&waits, &block_id, &consumer) {
                        path.push(block_id.clone());
                        let connections = run.cycle_connections(&path);
                        tracing::error!("Cycle detected while resolving block {}", block_id);
                        return BlockOutcome::Failed(Failure::Structural(
                            WorkflowError::CyclicDependency { connections },
                        ));
                    }
                }

                match cache.get(&block_id) {
                    Some(existing) => {
                        tracing::debug!("Block {} already resolving; awaiting shared result", block_id);
                        existing.clone()
                    }
                    None => {
                        let execution = Arc::clone(&run)
                            .execute_block(block_id.clone())
                            .boxed()
                            .shared();
                        cache.insert(block_id, execution.clone());
                        execution
                    }
                }
            };

            shared.await
        }
        .boxed()
    }

    async fn execute_block(self: Arc<Self>, block_id: BlockId) -> BlockOutcome {
        let (outcome, duration_ms) = self.evaluate(&block_id).await;
        self.settle(&block_id, &outcome, duration_ms).await;
        outcome
    }

    async fn evaluate(self: &Arc<Self>, block_id: &str) -> (BlockOutcome, u64) {
        if self.cancel.is_cancelled() {
            return (BlockOutcome::Cancelled, 0);
        }

        let Some(spec) = self.workflow.find_block(block_id) else {
            return (
                BlockOutcome::Failed(Failure::Structural(WorkflowError::BlockNotFound(
                    block_id.to_string(),
                ))),
                0,
            );
        };
        let (Some(block), Some(definition)) = (
            self.registry.lookup(&spec.block_type),
            self.registry.definition(&spec.block_type).cloned(),
        ) else {
            return (
                BlockOutcome::Failed(Failure::Structural(WorkflowError::UnknownBlockType {
                    block_id: spec.id.clone(),
                    block_type: spec.block_type.clone(),
                })),
                0,
            );
        };

        // Producers are independent of each other; resolve them concurrently
        let incoming: Vec<_> = self.workflow.incoming(block_id).cloned().collect();
        let wired: Vec<String> = incoming.iter().map(|c| c.to_socket.clone()).collect();
        let producers = join_all(incoming.into_iter().map(|conn| {
            let upstream = self.resolve(conn.from_block.clone(), Some(block_id.to_string()));
            async move { (conn, upstream.await) }
        }))
        .await;

        let mut inputs = HashMap::new();
        for (conn, upstream) in producers {
            match upstream {
                BlockOutcome::Completed(outputs) => match outputs.get(&conn.from_socket) {
                    Some(value) => {
                        inputs.insert(conn.to_socket.clone(), value.clone());
                    }
                    None => tracing::debug!(
                        "Branch {}.{} not taken; input {} of {} stays empty",
                        conn.from_block,
                        conn.from_socket,
                        conn.to_socket,
                        block_id
                    ),
                },
                BlockOutcome::Failed(Failure::Structural(e)) => {
                    return (BlockOutcome::Failed(Failure::Structural(e)), 0);
                }
                BlockOutcome::Cancelled => return (BlockOutcome::Cancelled, 0),
                BlockOutcome::Failed(Failure::Behavior(_)) | BlockOutcome::Skipped { .. } => {}
            }
        }

        let wired_gates = definition
            .gate_inputs()
            .filter(|socket| wired.iter().any(|w| w == socket));
        let missing: Vec<&str> = definition
            .required_inputs()
            .chain(wired_gates)
            .filter(|socket| !inputs.contains_key(*socket))
            .collect();
        if !missing.is_empty() {
            return (
                BlockOutcome::Skipped {
                    reason: format!("required input(s) not available: {}", missing.join(", ")),
                },
                0,
            );
        }

        let config = self
            .workflow
            .config_for(block_id)
            .map(|c| definition.apply_defaults(&c.values))
            .unwrap_or_else(|| definition.apply_defaults(&HashMap::new()));

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return (BlockOutcome::Cancelled, 0),
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        BlockOutcome::Failed(Failure::Behavior(BlockError::ExecutionFailed(
                            "executor is shutting down".to_string(),
                        ))),
                        0,
                    )
                }
            },
        };

        let wait_timeout = if definition.waits_for_event {
            self.trigger_timeout
        } else {
            None
        };

        let ctx = BlockContext {
            block_id: block_id.to_string(),
            inputs,
            config,
            services: self.services.clone(),
            events: self
                .events
                .create_emitter(self.execution_id, block_id.to_string()),
            cancellation: self.cancel.child_token(),
            wait_timeout,
        };
        let block_cancel = ctx.cancellation.clone();

        self.set_status(block_id, BlockStatus::Running).await;
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.events.emit(ExecutionEvent::BlockStarted {
            execution_id: self.execution_id,
            block_id: block_id.to_string(),
            block_type: spec.block_type.clone(),
            timestamp: Utc::now(),
        });
        tracing::debug!("Running block {} ({})", block_id, spec.block_type);

        let start = Instant::now();
        let mut task = tokio::spawn(async move { block.run(ctx).await });

        let joined = tokio::select! {
            joined = &mut task => Some(joined),
            _ = self.cancel.cancelled() => None,
            _ = sleep_or_forever(wait_timeout) => {
                tracing::warn!(
                    "Block {} waited longer than the trigger timeout; cancelling run",
                    block_id
                );
                self.cancel.cancel();
                None
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match joined {
            None => {
                // Make sure the behavior and any call it has in flight are gone before settling
                block_cancel.cancel();
                task.abort();
                let _ = task.await;
                BlockOutcome::Cancelled
            }
            Some(Ok(Ok(output))) => BlockOutcome::Completed(output.outputs),
            Some(Ok(Err(BlockError::Cancelled))) => BlockOutcome::Cancelled,
            Some(Ok(Err(BlockError::Timeout { ms }))) if definition.waits_for_event => {
                tracing::warn!(
                    "Block {} gave up waiting after {}ms; cancelling run",
                    block_id,
                    ms
                );
                self.cancel.cancel();
                BlockOutcome::Cancelled
            }
            Some(Ok(Err(e))) => BlockOutcome::Failed(Failure::Behavior(e)),
            Some(Err(join_error)) => BlockOutcome::Failed(Failure::Behavior(
                BlockError::ExecutionFailed(format!("Task join error: {}", join_error)),
            )),
        };

        (outcome, duration_ms)
    }

    async fn set_status(&self, block_id: &str, status: BlockStatus) {
        let mut statuses = self.statuses.lock().await;
        statuses.insert(block_id.to_string(), status);
    }

    /// Record the terminal state and emit the matching event
    async fn settle(&self, block_id: &str, outcome: &BlockOutcome, duration_ms: u64) {
        self.set_status(block_id, outcome.status()).await;

        let execution_id = self.execution_id;
        let block_id = block_id.to_string();
        let timestamp = Utc::now();

        match outcome {
            BlockOutcome::Completed(outputs) => {
                tracing::info!("Block {} completed in {}ms", block_id, duration_ms);
                self.events.emit(ExecutionEvent::BlockCompleted {
                    execution_id,
                    block_id,
                    outputs: outputs.clone(),
                    duration_ms,
                    timestamp,
                });
            }
            BlockOutcome::Failed(failure) => {
                tracing::error!("Block {} failed: {}", block_id, failure);
                self.events.emit(ExecutionEvent::BlockFailed {
                    execution_id,
                    block_id,
                    error: failure.to_string(),
                    timestamp,
                });
            }
            BlockOutcome::Skipped { reason } => {
                tracing::warn!("Block {} skipped: {}", block_id, reason);
                self.events.emit(ExecutionEvent::BlockSkipped {
                    execution_id,
                    block_id,
                    reason: reason.clone(),
                    timestamp,
                });
            }
            BlockOutcome::Cancelled => {
                tracing::warn!("Block {} cancelled", block_id);
                self.events.emit(ExecutionEvent::BlockCancelled {
                    execution_id,
                    block_id,
                    timestamp,
                });
            }
        }
    }

    /// Connections along a closed loop of blocks, each entry consuming from the next
    fn cycle_connections(&self, path: &[BlockId]) -> Vec<ConnectionId> {
        path.windows(2)
            .filter_map(|pair| {
                self.workflow
                    .connections
                    .iter()
                    .find(|c| c.to_block == pair[0] && c.from_block == pair[1])
                    .map(|c| c.id.clone())
            })
            .collect()
    }
}

/// Chain of requests leading from `from` to `to`, if one exists
fn wait_path(
    waits: &HashMap<BlockId, HashSet<BlockId>>,
    from: &BlockId,
    to: &BlockId,
) -> Option<Vec<BlockId>> {
    let mut parents: HashMap<&BlockId, &BlockId> = HashMap::new();
    let mut visited: HashSet<&BlockId> = HashSet::from([from]);
    let mut frontier = vec![from];

    while let Some(current) = frontier.pop() {
        if current == to {
            let mut path = vec![current.clone()];
            let mut cursor = current;
            while let Some(parent) = parents.get(cursor) {
                path.push((*parent).clone());
                cursor = *parent;
            }
            path.reverse();
            return Some(path);
        }
        for next in waits.get(current).into_iter().flatten() {
            if visited.insert(next) {
                parents.insert(next, current);
                frontier.push(next);
            }
        }
    }
    None
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

/// Result of one workflow run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub sink_policy: SinkPolicy,
    /// Final outcome of every sink block
    pub sinks: HashMap<BlockId, BlockOutcome>,
    /// Final state of every block in the workflow
    pub statuses: HashMap<BlockId, BlockStatus>,
    /// Number of behavior invocations in this run
    pub invocations: usize,
    pub total_blocks: usize,
    /// Whether the run's cancellation token fired
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn sink(&self, block_id: &str) -> Option<&BlockOutcome> {
        self.sinks.get(block_id)
    }

    pub fn status(&self, block_id: &str) -> Option<BlockStatus> {
        self.statuses.get(block_id).copied()
    }

    pub fn completed_sinks(&self) -> impl Iterator<Item = (&BlockId, &BlockOutcome)> {
        self.sinks.iter().filter(|(_, o)| o.is_completed())
    }

    /// All sinks settled without failure or cancellation; under
    /// `FirstCompleted`, at least one sink completed
    pub fn is_success(&self) -> bool {
        match self.sink_policy {
            SinkPolicy::All => self
                .sinks
                .values()
                .all(|o| !o.is_failed() && !o.is_cancelled()),
            SinkPolicy::FirstCompleted => self.sinks.values().any(BlockOutcome::is_completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blockcore::services::{
        Invoice, InvoiceRequest, PaymentReceipt, PaymentRequest, Ticket, TicketDelivery,
        TicketReceipt, TicketRequest,
    };
    use blockcore::{
        Block, BlockOutput, BlockSpec, BlockTypeDefinition, ConnectionPoint, ProtocolClient,
        ServiceError, Value,
    };

    struct PassBlock;

    #[async_trait]
    impl Block for PassBlock {
        fn block_type(&self) -> &str {
            "pass"
        }

        fn definition(&self) -> BlockTypeDefinition {
            BlockTypeDefinition::new("pass", "Pass")
                .with_input(ConnectionPoint::input("in", "In").optional())
                .with_output(ConnectionPoint::output("out", "Out"))
        }

        async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
            let value = ctx.inputs.get("in").cloned().unwrap_or(Value::Null);
            Ok(BlockOutput::new().with_output("out", value))
        }
    }

    struct NoProtocol;

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

    // Validation normally rejects cycles; this exercises the resolution-time guard on its own
    #[tokio::test]
    async fn test_cycle_guard_during_resolution() {
        let mut registry = BlockRegistry::new();
        registry.register(Arc::new(PassBlock));

        let mut workflow = Workflow::new("loop");
        let a = workflow.add_block(BlockSpec::new("pass").with_id("a"));
        let b = workflow.add_block(BlockSpec::new("pass").with_id("b"));
        let sink = workflow.add_block(BlockSpec::new("pass").with_id("sink"));
        workflow.connect(&a, "out", &b, "in");
        let back = workflow.connect(&b, "out", &a, "in");
        workflow.connect(&b, "out", &sink, "in");

        let executor = WorkflowExecutor::new(4);
        let result = executor
            .run_validated(
                &workflow,
                Arc::new(registry),
                ExternalServices::new(Arc::new(NoProtocol)),
                &EventBus::new(16),
                RunOptions::default(),
                CancellationToken::new(),
            )
            .await;

        match result {
            Err(FlowError::Workflow(WorkflowError::CyclicDependency { connections })) => {
                assert!(connections.contains(&back), "cycle should name the back edge");
            }
            other => panic!("expected cyclic dependency, got {:?}", other.map(|r| r.sinks)),
        }
    }

    #[tokio::test]
    async fn test_cycle_entered_from_both_sides_is_reported() {
        let mut registry = BlockRegistry::new();
        registry.register(Arc::new(PassBlock));

        let mut workflow = Workflow::new("two-sided loop");
        let x = workflow.add_block(BlockSpec::new("pass").with_id("x"));
        let y = workflow.add_block(BlockSpec::new("pass").with_id("y"));
        let left = workflow.add_block(BlockSpec::new("pass").with_id("left"));
        let right = workflow.add_block(BlockSpec::new("pass").with_id("right"));
        let x_to_y = workflow.connect(&x, "out", &y, "in");
        let y_to_x = workflow.connect(&y, "out", &x, "in");
        workflow.connect(&x, "out", &left, "in");
        workflow.connect(&y, "out", &right, "in");

        let executor = WorkflowExecutor::new(4);
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            executor.run_validated(
                &workflow,
                Arc::new(registry),
                ExternalServices::new(Arc::new(NoProtocol)),
                &EventBus::new(16),
                RunOptions::default(),
                CancellationToken::new(),
            ),
        )
        .await
        .expect("a loop entered from both sides must not hang the run");

        match result {
            Err(FlowError::Workflow(WorkflowError::CyclicDependency { connections })) => {
                assert_eq!(connections.len(), 2);
                assert!(connections.contains(&x_to_y));
                assert!(connections.contains(&y_to_x));
            }
            other => panic!("expected cyclic dependency, got {:?}", other.map(|r| r.sinks)),
        }
    }

    #[test]
    fn test_wait_path_follows_requests() {
        let mut waits: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
        waits.entry("a".into()).or_default().insert("b".into());
        waits.entry("b".into()).or_default().insert("c".into());

        assert_eq!(
            wait_path(&waits, &"a".to_string(), &"c".to_string()),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(wait_path(&waits, &"c".to_string(), &"a".to_string()), None);
    }
}
