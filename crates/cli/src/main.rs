//! `saga-engine` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — validate a workflow definition JSON file.
//! - `demo`     — run the built-in order-fulfilment saga against mock actions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actions::mock::MockAction;
use actions::{Params, WorkflowContext};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::{
    BroadcastEventBus, EngineConfig, ExecutionStatus, RetryPolicy, WorkflowDefinition,
    WorkflowEngine, WorkflowStep,
};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "saga-engine",
    about = "In-process saga workflow engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Run reserve → charge → ship with mock actions and print the execution.
    Demo {
        /// Make this step fail every attempt (reserve, charge or ship).
        #[arg(long)]
        fail_at: Option<String>,
        /// Customer picks the order up; the ship step is skipped.
        #[arg(long)]
        pickup: bool,
        /// Attempts per step.
        #[arg(long, default_value_t = 1)]
        attempts: u32,
        #[arg(long, env = "SAGA_STEP_TIMEOUT_MS", default_value_t = 30_000)]
        step_timeout_ms: u64,
        #[arg(long, env = "SAGA_RETRY_DELAY_MS", default_value_t = 1_000)]
        retry_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "engine=info,cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => validate(&path),
        Command::Demo {
            fail_at,
            pickup,
            attempts,
            step_timeout_ms,
            retry_delay_ms,
        } => {
            let config = EngineConfig::default()
                .with_step_timeout(Duration::from_millis(step_timeout_ms))
                .with_retry_delay(Duration::from_millis(retry_delay_ms));
            demo(config, fail_at.as_deref(), pickup, attempts).await
        }
    }
}

fn validate(path: &std::path::Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;

    let definition: WorkflowDefinition =
        serde_json::from_str(&content).context("invalid workflow JSON")?;

    match engine::validate_definition(&definition) {
        Ok(order) => {
            println!("✅ Workflow '{}' is valid. Execution order: {order:?}", definition.id);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Validation failed: {e}");
            std::process::exit(1);
        }
    }
}

fn order_definition(attempts: u32) -> WorkflowDefinition {
    let mut release = Params::new();
    release.insert("reason".into(), json!("order rolled back"));

    WorkflowDefinition::new(
        "order-fulfilment",
        "Order fulfilment",
        vec![
            WorkflowStep::new("reserve", "inventory.reserve")
                .named("Reserve stock")
                .with_param("sku", json!("A-100"))
                .compensate_with("inventory.release", release),
            WorkflowStep::new("charge", "payment.charge")
                .named("Charge card")
                .with_param("amount", json!(4999))
                .compensate_with("payment.refund", Params::new()),
            WorkflowStep::new("ship", "shipping.create")
                .named("Create shipment")
                .when(|ctx| !ctx.data.get("pickup").and_then(Value::as_bool).unwrap_or(false)),
        ],
    )
    .with_retry_policy(RetryPolicy {
        max_attempts: Some(attempts),
        ..Default::default()
    })
}

async fn demo(config: EngineConfig, fail_at: Option<&str>, pickup: bool, attempts: u32) -> Result<()> {
    let bus = BroadcastEventBus::default();
    let mut events = bus.subscribe();
    let subscriber = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("event {} {}", event.event_type, event.payload);
        }
    });

    let engine = WorkflowEngine::new(config).with_event_bus(Arc::new(bus));

    let action = |step: &str, value: Value| match fail_at {
        Some(f) if f == step => MockAction::failing(format!("{step} unavailable")),
        _ => MockAction::returning(value),
    };
    engine.register_action("inventory.reserve", action("reserve", json!({ "reservationId": "r-1" })));
    engine.register_action("payment.charge", action("charge", json!({ "chargeId": "c-1" })));
    engine.register_action("shipping.create", action("ship", json!({ "tracking": "T-1" })));
    engine.register_action("inventory.release", MockAction::returning(json!({ "released": true })));
    engine.register_action("payment.refund", MockAction::returning(json!({ "refunded": true })));

    let definition = order_definition(attempts);
    engine.validate_workflow(&definition)?;
    engine.register_workflow(definition);

    let context = WorkflowContext::new("order-fulfilment", "demo-1").with_data("pickup", json!(pickup));
    let execution = engine.execute_workflow("order-fulfilment", context).await?;

    println!("{}", serde_json::to_string_pretty(&execution)?);

    // The engine owns the only sender; dropping it closes the channel once
    // the subscriber has drained every event, including the terminal one.
    drop(engine);
    subscriber.await.context("event subscriber task failed")?;

    if execution.status != ExecutionStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}
