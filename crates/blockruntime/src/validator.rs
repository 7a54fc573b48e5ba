//! Structural validation of a workflow against the registry

use crate::registry::BlockRegistry;
use blockcore::{BlockId, ConnectionId, Workflow, WorkflowError};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Check a workflow before it is allowed to run.
///
/// Fails on the first problem found, naming the offending block or connection(s).
pub fn validate_workflow(workflow: &Workflow, registry: &BlockRegistry) -> Result<(), WorkflowError> {
    check_blocks(workflow, registry)?;
    check_connections(workflow, registry)?;
    check_single_producer(workflow)?;
    check_acyclic(workflow)?;
    check_configs(workflow, registry)?;

    tracing::debug!(
        "Workflow {} is valid ({} blocks, {} connections)",
        workflow.id,
        workflow.blocks.len(),
        workflow.connections.len()
    );
    Ok(())
}

fn check_blocks(workflow: &Workflow, registry: &BlockRegistry) -> Result<(), WorkflowError> {
    let mut seen = HashSet::new();
    for block in &workflow.blocks {
        if !seen.insert(block.id.as_str()) {
            return Err(WorkflowError::DuplicateBlock(block.id.clone()));
        }
        if !registry.contains(&block.block_type) {
            return Err(WorkflowError::UnknownBlockType {
                block_id: block.id.clone(),
                block_type: block.block_type.clone(),
            });
        }
    }
    Ok(())
}

fn check_connections(workflow: &Workflow, registry: &BlockRegistry) -> Result<(), WorkflowError> {
    for conn in &workflow.connections {
        let invalid = |reason: String| WorkflowError::InvalidConnection {
            connection_id: conn.id.clone(),
            reason,
        };

        let source = workflow
            .find_block(&conn.from_block)
            .ok_or_else(|| invalid(format!("source block {} does not exist", conn.from_block)))?;
        let target = workflow
            .find_block(&conn.to_block)
            .ok_or_else(|| invalid(format!("destination block {} does not exist", conn.to_block)))?;

        let source_def = registry
            .definition(&source.block_type)
            .ok_or_else(|| invalid(format!("unknown block type {}", source.block_type)))?;
        let target_def = registry
            .definition(&target.block_type)
            .ok_or_else(|| invalid(format!("unknown block type {}", target.block_type)))?;

        if source_def.output(&conn.from_socket).is_none() {
            return Err(invalid(format!(
                "'{}' is not an output of {} ({})",
                conn.from_socket, source.id, source.block_type
            )));
        }
        if target_def.input(&conn.to_socket).is_none() {
            return Err(invalid(format!(
                "'{}' is not an input of {} ({})",
                conn.to_socket, target.id, target.block_type
            )));
        }
    }
    Ok(())
}

fn check_single_producer(workflow: &Workflow) -> Result<(), WorkflowError> {
    let mut producers: HashMap<(&str, &str), Vec<ConnectionId>> = HashMap::new();
    for conn in &workflow.connections {
        producers
            .entry((conn.to_block.as_str(), conn.to_socket.as_str()))
            .or_default()
            .push(conn.id.clone());
    }

    let mut conflicts: Vec<_> = producers
        .into_iter()
        .filter(|(_, connections)| connections.len() > 1)
        .collect();
    conflicts.sort_by(|a, b| a.0.cmp(&b.0));

    match conflicts.into_iter().next() {
        Some(((block_id, socket), connections)) => Err(WorkflowError::MultipleProducers {
            block_id: block_id.to_string(),
            socket: socket.to_string(),
            connections,
        }),
        None => Ok(()),
    }
}

/// Build the dependency graph; edge weights are connection ids
pub fn build_graph(workflow: &Workflow) -> Result<DiGraph<BlockId, ConnectionId>, WorkflowError> {
    let mut graph = DiGraph::new();
    let mut block_to_index: HashMap<&str, NodeIndex> = HashMap::new();

    for block in &workflow.blocks {
        let idx = graph.add_node(block.id.clone());
        block_to_index.insert(block.id.as_str(), idx);
    }

    for conn in &workflow.connections {
        let from_idx = block_to_index
            .get(conn.from_block.as_str())
            .ok_or_else(|| WorkflowError::BlockNotFound(conn.from_block.clone()))?;
        let to_idx = block_to_index
            .get(conn.to_block.as_str())
            .ok_or_else(|| WorkflowError::BlockNotFound(conn.to_block.clone()))?;

        graph.add_edge(*from_idx, *to_idx, conn.id.clone());
    }

    Ok(graph)
}

fn check_acyclic(workflow: &Workflow) -> Result<(), WorkflowError> {
    let graph = build_graph(workflow)?;
    if toposort(&graph, None).is_ok() {
        return Ok(());
    }

    // Name the connections inside the first strongly connected component that loops
    for component in tarjan_scc(&graph) {
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        let mut connections: Vec<ConnectionId> = graph
            .edge_indices()
            .filter_map(|edge| {
                let (from, to) = graph.edge_endpoints(edge)?;
                (members.contains(&from) && members.contains(&to)).then(|| graph[edge].clone())
            })
            .collect();

        if !connections.is_empty() {
            connections.sort();
            return Err(WorkflowError::CyclicDependency { connections });
        }
    }

    Err(WorkflowError::CyclicDependency {
        connections: Vec::new(),
    })
}

fn check_configs(workflow: &Workflow, registry: &BlockRegistry) -> Result<(), WorkflowError> {
    let mut configured = HashSet::new();
    for config in &workflow.configs {
        let block = workflow
            .find_block(&config.block_id)
            .ok_or_else(|| WorkflowError::DanglingConfig {
                config_id: config.id.clone(),
                block_id: config.block_id.clone(),
            })?;

        if !configured.insert(config.block_id.as_str()) {
            return Err(WorkflowError::InvalidConfig {
                block_id: config.block_id.clone(),
                reason: "more than one config for this block".to_string(),
            });
        }

        if let Some(behavior) = registry.lookup(&block.block_type) {
            behavior
                .validate_config(&config.values)
                .map_err(|e| WorkflowError::InvalidConfig {
                    block_id: block.id.clone(),
                    reason: e.to_string(),
                })?;
        }
    }

    // Blocks without a config still need their required parameters
    for block in &workflow.blocks {
        if configured.contains(block.id.as_str()) {
            continue;
        }
        if let Some(behavior) = registry.lookup(&block.block_type) {
            behavior
                .validate_config(&HashMap::new())
                .map_err(|e| WorkflowError::InvalidConfig {
                    block_id: block.id.clone(),
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}
