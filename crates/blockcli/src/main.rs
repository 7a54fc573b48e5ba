// crates/blockcli/src/main.rs

mod scripted;

use anyhow::{anyhow, Context, Result};
use blockcore::{
    BlockEvent, BlockOutcome, BlockSpec, ExecutionEvent, ExternalServices, HandshakeHub,
    SinkPolicy, Value, Workflow,
};
use blockruntime::{BlockRuntime, RunOptions, RuntimeConfig};
use clap::{Parser, Subcommand};
use scripted::{ScriptedClient, ServiceScript};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blockflow")]
#[command(about = "Block workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Handshake to deliver before the run, as TOKEN=JSON
        #[arg(short, long = "event")]
        events: Vec<String>,

        /// Script describing how the offline protocol client answers
        #[arg(short, long)]
        services: Option<PathBuf>,

        /// Cancel the run after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Stop at the first sink that completes
        #[arg(long)]
        first_sink: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available block types
    Blocks,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            events,
            services,
            timeout_ms,
            first_sink,
            verbose,
        } => {
            init_logging(verbose);

            let mut options = RunOptions::default();
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }
            if first_sink {
                options = options.with_sink_policy(SinkPolicy::FirstCompleted);
            }

            run_workflow(file, events, services, options).await?;
        }

        Commands::Validate { file } => {
            init_logging(false);
            validate_workflow(file)?;
        }

        Commands::Blocks => {
            list_blocks();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn load_workflow(file: &PathBuf) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)
        .with_context(|| format!("parsing {}", file.display()))?;
    Ok(workflow)
}

/// Parse `TOKEN=JSON`; a payload that is not valid JSON is taken as a string
fn parse_event(raw: &str) -> Result<(String, Value)> {
    let (token, payload) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("event must look like TOKEN=JSON, got '{}'", raw))?;
    let value = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(json) => Value::from_json(json),
        Err(_) => Value::String(payload.to_string()),
    };
    Ok((token.trim().to_string(), value))
}

async fn run_workflow(
    file: PathBuf,
    events: Vec<String>,
    services: Option<PathBuf>,
    options: RunOptions,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Blocks: {}", workflow.blocks.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let script: ServiceScript = match services {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ServiceScript::default(),
    };

    let client = ScriptedClient::new(script, HandshakeHub::new());
    client.deliver_scripted_handshakes().await;
    for raw in &events {
        let (token, value) = parse_event(raw)?;
        client.hub().deliver(token, value).await;
    }

    let registry = Arc::new(blocknodes::builtin_registry());
    let runtime = BlockRuntime::new(
        registry,
        ExternalServices::new(Arc::new(client)),
        RuntimeConfig::default(),
    );

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::RunStarted { sinks, .. } => {
                    println!("▶️  Run started ({} sinks)", sinks.len());
                }
                ExecutionEvent::BlockStarted {
                    block_id,
                    block_type,
                    ..
                } => {
                    println!("  ⚡ Starting block: {} ({})", block_id, block_type);
                }
                ExecutionEvent::BlockCompleted {
                    block_id,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Block {} completed in {}ms", block_id, duration_ms);
                }
                ExecutionEvent::BlockFailed { block_id, error, .. } => {
                    println!("  ❌ Block {} failed: {}", block_id, error);
                }
                ExecutionEvent::BlockSkipped {
                    block_id, reason, ..
                } => {
                    println!("  ⏭️  Block {} skipped: {}", block_id, reason);
                }
                ExecutionEvent::BlockCancelled { block_id, .. } => {
                    println!("  🛑 Block {} cancelled", block_id);
                }
                ExecutionEvent::BlockEvent {
                    block_id, event, ..
                } => match event {
                    BlockEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", block_id, message);
                    }
                    BlockEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", block_id, message);
                    }
                    BlockEvent::Data { .. } => {}
                },
                ExecutionEvent::RunCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Run completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Run finished with problems after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let result = runtime.execute(&workflow, options).await;

    // Wait for events to finish printing
    tokio::time::sleep(Duration::from_millis(100)).await;
    event_task.abort();

    let report = result?;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", report.execution_id);
    println!(
        "   Invocations: {} across {} blocks",
        report.invocations, report.total_blocks
    );

    println!();
    println!("📤 Sinks:");
    let mut sinks: Vec<_> = report.sinks.iter().collect();
    sinks.sort_by(|a, b| a.0.cmp(b.0));
    for (block_id, outcome) in sinks {
        match outcome {
            BlockOutcome::Completed(outputs) => {
                println!("   {}: completed", block_id);
                let mut outputs: Vec<_> = outputs.iter().collect();
                outputs.sort_by(|a, b| a.0.cmp(b.0));
                for (socket, value) in outputs {
                    println!("     {}: {}", socket, value.to_json());
                }
            }
            BlockOutcome::Failed(failure) => println!("   {}: failed ({})", block_id, failure),
            BlockOutcome::Skipped { reason } => println!("   {}: skipped ({})", block_id, reason),
            BlockOutcome::Cancelled => println!("   {}: cancelled", block_id),
        }
    }

    if !report.is_success() {
        return Err(anyhow!("run {} did not succeed", report.execution_id));
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let registry = blocknodes::builtin_registry();

    blockruntime::validate_workflow(&workflow, &registry)
        .map_err(|e| anyhow!("❌ Workflow is invalid: {}", e))?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Blocks: {}", workflow.blocks.len());
    println!("   Connections: {}", workflow.connections.len());
    println!("   Sinks: {}", workflow.sinks().join(", "));

    Ok(())
}

fn list_blocks() {
    println!("📦 Available Block Types:");
    println!();

    let registry = blocknodes::builtin_registry();

    for definition in registry.list() {
        println!("  • {} ({})", definition.id, definition.category);
        println!("    {}", definition.description);

        let sockets = |points: &[blockcore::ConnectionPoint]| {
            points
                .iter()
                .map(|p| if p.required { format!("{}*", p.id) } else { p.id.clone() })
                .collect::<Vec<_>>()
                .join(", ")
        };
        if !definition.inputs.is_empty() {
            println!("    inputs:  {}", sockets(&definition.inputs));
        }
        if !definition.outputs.is_empty() {
            println!("    outputs: {}", sockets(&definition.outputs));
        }
        for param in &definition.params {
            let mut line = format!("    - {}: {}", param.name, param.param_type.as_str());
            if param.required {
                line.push_str(" (required)");
            }
            if !param.options.is_empty() {
                line.push_str(&format!(" [{}]", param.options.join("|")));
            }
            if let Some(default) = &param.default {
                line.push_str(&format!(" = {}", default.to_text()));
            }
            println!("{}", line);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("Order status router");
    workflow.description =
        Some("Waits for an order handshake and routes on its status".to_string());

    let trigger = workflow.add_block(
        BlockSpec::new("trigger")
            .with_name("Order handshake")
            .with_position(100.0, 100.0),
    );
    let check = workflow.add_block(
        BlockSpec::new("conditional")
            .with_name("Status is ok?")
            .with_position(300.0, 100.0),
    );
    let accepted = workflow.add_block(
        BlockSpec::new("constant")
            .with_name("Accepted")
            .with_position(500.0, 50.0),
    );
    let rejected = workflow.add_block(
        BlockSpec::new("constant")
            .with_name("Rejected")
            .with_position(500.0, 150.0),
    );

    workflow.configure(&trigger, "token", "order");
    workflow.configure(&check, "field", "status");
    workflow.configure(&check, "operator", "equals");
    workflow.configure(&check, "value", "ok");
    workflow.configure(&accepted, "value", "A");
    workflow.configure(&rejected, "value", "B");

    workflow.connect(&trigger, "event", &check, "data");
    workflow.connect(&check, "true", &accepted, "trigger");
    workflow.connect(&check, "false", &rejected, "trigger");

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  blockflow run --file {} --event 'order={{\"status\": \"ok\"}}'",
        output.display()
    );

    Ok(())
}
