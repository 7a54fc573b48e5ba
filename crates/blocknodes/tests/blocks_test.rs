// crates/blocknodes/tests/blocks_test.rs

mod common;

use blockcore::{Block, BlockError, ServiceError, Value};
use blocknodes::{
    builtin_registry, ConditionalBlock, ConstantBlock, PaymentRequestBlock, SplitBlock,
    TicketRequestBlock, TicketSendBlock, TriggerBlock,
};
use common::{context, json, MockProtocol};
use serde_json::json as j;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_builtin_palette() {
    let registry = builtin_registry();
    assert_eq!(
        registry.list_block_types(),
        vec![
            "conditional",
            "constant",
            "payment-request",
            "split",
            "ticket-request",
            "ticket-send",
            "trigger",
        ]
    );
    let trigger = registry.definition("trigger").unwrap();
    assert!(trigger.waits_for_event);
    assert!(!registry.definition("split").unwrap().waits_for_event);
}

#[tokio::test]
async fn test_trigger_emits_handshake_value() {
    let protocol = Arc::new(MockProtocol::new());
    protocol.hub.deliver("order", json(j!({"status": "ok"}))).await;

    let ctx = context(protocol.clone()).with_config("token", "order");
    let output = TriggerBlock.run(ctx).await.unwrap();

    assert_eq!(
        output.get("event").and_then(|v| v.get_path("status")),
        Some(Value::from("ok"))
    );
}

#[tokio::test]
async fn test_trigger_times_out() {
    let protocol = Arc::new(MockProtocol::new());
    let ctx = context(protocol.clone())
        .with_config("token", "never")
        .with_config("timeout_ms", 20i64);

    let result = TriggerBlock.run(ctx).await;

    assert_eq!(result.unwrap_err(), BlockError::Timeout { ms: 20 });
    assert_eq!(protocol.hub.pending_waits().await, 0);
}

#[tokio::test]
async fn test_trigger_uses_tighter_run_bound() {
    let protocol = Arc::new(MockProtocol::new());
    let mut ctx = context(protocol)
        .with_config("token", "never")
        .with_config("timeout_ms", 10_000i64);
    ctx.wait_timeout = Some(Duration::from_millis(15));

    assert_eq!(
        TriggerBlock.run(ctx).await.unwrap_err(),
        BlockError::Timeout { ms: 15 }
    );
}

#[tokio::test]
async fn test_trigger_stops_on_cancel() {
    let protocol = Arc::new(MockProtocol::new());
    let ctx = context(protocol.clone()).with_config("token", "never");
    let token = ctx.cancellation.clone();

    let task = tokio::spawn(async move { TriggerBlock.run(ctx).await });
    while protocol.hub.pending_waits().await == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    assert_eq!(result.unwrap_err(), BlockError::Cancelled);
    assert_eq!(protocol.hub.pending_waits().await, 0, "wait dropped with the block");
}

#[test]
fn test_trigger_requires_token() {
    assert!(TriggerBlock.validate_config(&HashMap::new()).is_err());
}

#[tokio::test]
async fn test_constant_coerces_configured_type() {
    let protocol = Arc::new(MockProtocol::new());

    let cases = [
        ("number", Value::from("42"), Value::Number(42.0)),
        ("boolean", Value::from("True"), Value::Bool(true)),
        ("string", Value::Number(7.0), Value::from("7")),
    ];
    for (value_type, raw, expected) in cases {
        let ctx = context(protocol.clone())
            .with_config("value", raw)
            .with_config("value_type", value_type);
        let output = ConstantBlock.run(ctx).await.unwrap();
        assert_eq!(output.get("value"), Some(&expected), "{}", value_type);
    }

    let ctx = context(protocol)
        .with_config("value", r#"{"a": [1, 2]}"#)
        .with_config("value_type", "object");
    let output = ConstantBlock.run(ctx).await.unwrap();
    assert_eq!(
        output.get("value").and_then(|v| v.get_path("a.1")),
        Some(Value::Number(2.0))
    );
}

#[test]
fn test_constant_rejects_bad_coercion_at_load() {
    let mut config = HashMap::new();
    config.insert("value".to_string(), Value::from("forty"));
    config.insert("value_type".to_string(), Value::from("number"));

    assert!(matches!(
        ConstantBlock.validate_config(&config),
        Err(BlockError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_split_duplicates_input() {
    let ctx = context(Arc::new(MockProtocol::new())).with_input("data", "x");
    let output = SplitBlock.run(ctx).await.unwrap();

    assert_eq!(output.get("first"), Some(&Value::from("x")));
    assert_eq!(output.get("second"), Some(&Value::from("x")));
}

#[tokio::test]
async fn test_conditional_populates_exactly_one_branch() {
    let protocol = Arc::new(MockProtocol::new());
    let data = json(j!({"payment": {"status": "ok", "amount": 120}}));

    let cases = [
        ("payment.status", "equals", "ok", true),
        ("payment.status", "not_equals", "ok", false),
        ("payment.amount", "greater_than", "100", true),
        ("payment.amount", "less_than", "100", false),
        ("payment.status", "contains", "o", true),
        ("payment.missing", "exists", "", false),
        ("payment.missing", "not_exists", "", true),
    ];

    for (field, operator, value, met) in cases {
        let ctx = context(protocol.clone())
            .with_input("data", data.clone())
            .with_config("field", field)
            .with_config("operator", operator)
            .with_config("value", value);
        let output = ConditionalBlock.run(ctx).await.unwrap();

        assert_eq!(output.outputs.len(), 1, "{} {}", field, operator);
        let socket = if met { "true" } else { "false" };
        let branch = output.get(socket).unwrap_or_else(|| panic!("{} {}", field, operator));
        assert_eq!(branch.get("condition_met"), Some(Value::Bool(met)));
        assert_eq!(branch.get("data"), Some(data.clone()));
    }
}

#[tokio::test]
async fn test_payment_success() {
    let protocol = Arc::new(MockProtocol::new());
    let ctx = context(protocol.clone())
        .with_input("data", "order-1")
        .with_input("counterpart", "npub-alice")
        .with_config("amount", 21i64)
        .with_config("unit", "sat");

    let output = PaymentRequestBlock.run(ctx).await.unwrap();

    let success = output.get("success").unwrap();
    assert!(output.get("failure").is_none());
    assert_eq!(success.get_path("invoice.amount"), Some(Value::Number(21.0)));
    assert_eq!(success.get_path("receipt.counterpart"), Some(Value::from("npub-alice")));
    assert_eq!(protocol.calls().await, vec!["create_invoice", "request_payment"]);
}

#[tokio::test]
async fn test_payment_failure_routes_to_failure_output() {
    let protocol = Arc::new(MockProtocol {
        fail_payment: Some(ServiceError::Rejected("declined".into())),
        ..MockProtocol::default()
    });
    let ctx = context(protocol)
        .with_input("data", "order-1")
        .with_config("amount", 21i64)
        .with_config("counterpart", "npub-bob");

    let output = PaymentRequestBlock.run(ctx).await.unwrap();

    let failure = output.get("failure").unwrap();
    assert!(output.get("success").is_none());
    assert_eq!(failure.get("stage"), Some(Value::from("request_payment")));
    assert!(failure.get("error").unwrap().to_text().contains("declined"));
}

#[tokio::test]
async fn test_payment_without_counterpart_is_hard_failure() {
    let protocol = Arc::new(MockProtocol::new());
    let ctx = context(protocol.clone())
        .with_input("data", "order-1")
        .with_config("amount", 21i64);

    assert!(matches!(
        PaymentRequestBlock.run(ctx).await,
        Err(BlockError::Configuration(_))
    ));
    assert!(protocol.calls().await.is_empty());
}

#[tokio::test]
async fn test_ticket_request_branches() {
    let ok = Arc::new(MockProtocol::new());
    let ctx = context(ok)
        .with_input("data", "x")
        .with_config("mint_url", "https://mint.example")
        .with_config("amount", 5i64);
    let output = TicketRequestBlock.run(ctx).await.unwrap();
    assert_eq!(
        output.get("success").and_then(|v| v.get("token")),
        Some(Value::from("cashuA-token"))
    );

    let down = Arc::new(MockProtocol {
        fail_ticket: Some(ServiceError::Unavailable("mint offline".into())),
        ..MockProtocol::default()
    });
    let ctx = context(down)
        .with_input("data", "x")
        .with_input("mint", "https://other.example")
        .with_config("amount", 5i64);
    let output = TicketRequestBlock.run(ctx).await.unwrap();
    assert!(output.get("failure").is_some());
    assert!(output.get("success").is_none());
}

#[tokio::test]
async fn test_ticket_send_accepts_object_or_string() {
    let protocol = Arc::new(MockProtocol::new());

    let ctx = context(protocol.clone())
        .with_input("ticket", json(j!({"token": "cashuA-1"})))
        .with_config("recipient", "npub-carol");
    let output = TicketSendBlock.run(ctx).await.unwrap();
    assert_eq!(
        output.get("sent").and_then(|v| v.get("token")),
        Some(Value::from("cashuA-1"))
    );

    let ctx = context(protocol.clone())
        .with_input("ticket", "cashuA-2")
        .with_input("recipient", "npub-dave");
    let output = TicketSendBlock.run(ctx).await.unwrap();
    assert_eq!(
        output.get("sent").and_then(|v| v.get("recipient")),
        Some(Value::from("npub-dave"))
    );

    let ctx = context(protocol)
        .with_input("ticket", 3i64)
        .with_config("recipient", "npub-carol");
    assert!(matches!(
        TicketSendBlock.run(ctx).await,
        Err(BlockError::InvalidInputType { .. })
    ));
}

#[tokio::test]
async fn test_ticket_send_failure_is_behavior_error() {
    let protocol = Arc::new(MockProtocol {
        fail_send: Some(ServiceError::Rejected("unknown recipient".into())),
        ..MockProtocol::default()
    });
    let ctx = context(protocol)
        .with_input("ticket", "cashuA-1")
        .with_config("recipient", "npub-x");

    assert!(matches!(
        TicketSendBlock.run(ctx).await,
        Err(BlockError::Service(ServiceError::Rejected(_)))
    ));
}
