use crate::store::{InMemoryStore, WorkflowStore};
use crate::validator::validate_workflow;
use crate::{registry::BlockRegistry, RunOptions, RunReport, WorkflowExecutor};
use blockcore::{EventBus, ExecutionEvent, ExternalServices, FlowError, Workflow, WorkflowError, WorkflowId};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Main runtime for executing workflows
pub struct BlockRuntime {
    registry: Arc<BlockRegistry>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
    services: ExternalServices,
    store: Arc<dyn WorkflowStore>,
}

impl BlockRuntime {
    /// Create a runtime around a populated registry and the external services
    pub fn new(registry: Arc<BlockRegistry>, services: ExternalServices, config: RuntimeConfig) -> Self {
        let executor = WorkflowExecutor::new(config.max_parallel_blocks).with_default_trigger_timeout(
            config.default_trigger_timeout_ms.map(Duration::from_millis),
        );
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            registry,
            executor: Arc::new(executor),
            event_bus,
            services,
            store: Arc::new(InMemoryStore::new()),
        }
    }

    /// Replace the default in-memory store
    pub fn with_store(mut self, store: Arc<dyn WorkflowStore>) -> Self {
        self.store = store;
        self
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn services(&self) -> &ExternalServices {
        &self.services
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    /// Check a workflow without running it
    pub fn validate(&self, workflow: &Workflow) -> Result<(), WorkflowError> {
        validate_workflow(workflow, &self.registry)
    }

    /// Validate and persist a workflow
    pub async fn register_workflow(&self, workflow: Workflow) -> Result<WorkflowId, FlowError> {
        self.validate(&workflow)?;
        self.store.save(&workflow).await?;
        tracing::info!("Registered workflow {} ({})", workflow.id, workflow.name);
        Ok(workflow.id)
    }

    /// Execute a stored workflow by ID
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
        options: RunOptions,
    ) -> Result<RunReport, FlowError> {
        let workflow = self.store.load(workflow_id).await?;
        if !workflow.active {
            return Err(FlowError::Execution(format!(
                "Workflow {} is not active",
                workflow_id
            )));
        }
        self.execute(&workflow, options).await
    }

    /// Execute a workflow directly (without registration)
    pub async fn execute(&self, workflow: &Workflow, options: RunOptions) -> Result<RunReport, FlowError> {
        self.execute_with_cancel(workflow, options, CancellationToken::new())
            .await
    }

    /// Execute with a caller-owned cancellation token
    pub async fn execute_with_cancel(
        &self,
        workflow: &Workflow,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunReport, FlowError> {
        self.executor
            .execute(
                workflow,
                Arc::clone(&self.registry),
                self.services.clone(),
                &self.event_bus,
                options,
                cancel,
            )
            .await
    }

    /// Start a run in the background and return a handle for cancelling or awaiting it
    pub fn start(&self, workflow: Workflow, options: RunOptions) -> RunHandle {
        let cancel = CancellationToken::new();
        let executor = Arc::clone(&self.executor);
        let registry = Arc::clone(&self.registry);
        let services = self.services.clone();
        let event_bus = Arc::clone(&self.event_bus);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            executor
                .execute(&workflow, registry, services, &event_bus, options, token)
                .await
        });

        RunHandle { cancel, task }
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

/// Handle for a run started with [`BlockRuntime::start`]
pub struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<RunReport, FlowError>>,
}

impl RunHandle {
    /// Signal the run to stop; pending blocks settle as cancelled
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to settle
    pub async fn wait(self) -> Result<RunReport, FlowError> {
        self.task
            .await
            .map_err(|e| FlowError::Execution(format!("Run task join error: {}", e)))?
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on behavior invocations running at once
    pub max_parallel_blocks: usize,
    pub event_buffer_size: usize,
    /// Trigger timeout used when neither the run nor the workflow sets one
    pub default_trigger_timeout_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_blocks: 10,
            event_buffer_size: 1000,
            default_trigger_timeout_ms: None,
        }
    }
}
