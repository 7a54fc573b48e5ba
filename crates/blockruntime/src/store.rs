use async_trait::async_trait;
use blockcore::{FlowError, Workflow, WorkflowError, WorkflowId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Persistence collaborator: loads and saves whole workflow aggregates
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load(&self, id: WorkflowId) -> Result<Workflow, FlowError>;

    /// Insert or replace the aggregate stored under `workflow.id`
    async fn save(&self, workflow: &Workflow) -> Result<(), FlowError>;

    async fn list(&self) -> Result<Vec<WorkflowId>, FlowError>;

    async fn delete(&self, id: WorkflowId) -> Result<bool, FlowError>;
}

/// Store that keeps workflows in memory for the life of the process
#[derive(Default)]
pub struct InMemoryStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn load(&self, id: WorkflowId) -> Result<Workflow, FlowError> {
        let workflows = self.workflows.read().await;
        workflows
            .get(&id)
            .cloned()
            .ok_or_else(|| FlowError::Workflow(WorkflowError::NotFound(id.to_string())))
    }

    async fn save(&self, workflow: &Workflow) -> Result<(), FlowError> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowId>, FlowError> {
        let workflows = self.workflows.read().await;
        Ok(workflows.keys().copied().collect())
    }

    async fn delete(&self, id: WorkflowId) -> Result<bool, FlowError> {
        let mut workflows = self.workflows.write().await;
        Ok(workflows.remove(&id).is_some())
    }
}
