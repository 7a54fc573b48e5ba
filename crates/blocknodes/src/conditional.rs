use async_trait::async_trait;
use blockcore::{
    Block, BlockContext, BlockError, BlockOutput, BlockTypeDefinition, ConnectionPoint, ParamSpec,
    ParamType, Value,
};
use serde_json::Value as Json;
use std::collections::HashMap;

pub const OPERATORS: [&str; 8] = [
    "equals",
    "not_equals",
    "greater_than",
    "less_than",
    "contains",
    "not_contains",
    "exists",
    "not_exists",
];

/// Routes its input to `true` or `false` depending on a field comparison
pub struct ConditionalBlock;

#[async_trait]
impl Block for ConditionalBlock {
    fn block_type(&self) -> &str {
        "conditional"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("conditional", "Conditional")
            .with_description("Compares a field of the input and takes one of two branches")
            .with_category("flow")
            .with_param(
                ParamSpec::new("field", ParamType::String)
                    .required()
                    .with_description("Dot path into the input, e.g. payment.status"),
            )
            .with_param(
                ParamSpec::new("operator", ParamType::Choice)
                    .with_options(OPERATORS)
                    .with_default("equals"),
            )
            .with_param(ParamSpec::new("value", ParamType::String))
            .with_input(ConnectionPoint::input("data", "Data"))
            .with_output(
                ConnectionPoint::output("true", "True")
                    .with_field("data", ParamType::Object, "The unchanged input")
                    .with_field("condition_met", ParamType::Boolean, "Always true"),
            )
            .with_output(
                ConnectionPoint::output("false", "False")
                    .with_field("data", ParamType::Object, "The unchanged input")
                    .with_field("condition_met", ParamType::Boolean, "Always false"),
            )
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let data = ctx.require_input("data")?;
        let field = ctx
            .config_str("field")
            .ok_or_else(|| BlockError::Configuration("Missing config: field".to_string()))?;
        let operator = ctx.config_str("operator").unwrap_or_else(|| "equals".to_string());
        let expected = ctx.get_config_or("value", Value::Null);

        let actual = data.get_path(&field);
        let met = evaluate(&operator, actual.as_ref(), &expected)?;

        tracing::debug!(
            "Conditional {}: {} {} {} -> {}",
            ctx.block_id,
            field,
            operator,
            expected.to_text(),
            met
        );

        let mut result = HashMap::new();
        result.insert("data".to_string(), data.clone());
        result.insert("condition_met".to_string(), Value::Bool(met));

        let socket = if met { "true" } else { "false" };
        Ok(BlockOutput::new().with_output(socket, Value::Object(result)))
    }
}

/// Apply `operator` to the resolved field value; `None` means the path did not resolve
pub fn evaluate(operator: &str, actual: Option<&Value>, expected: &Value) -> Result<bool, BlockError> {
    let actual = actual.map(Value::to_json).unwrap_or(Json::Null);
    let expected = expected.to_json();

    let met = match operator {
        "equals" => equal(&actual, &expected),
        "not_equals" => !equal(&actual, &expected),
        "greater_than" => compare(&actual, &expected).is_some_and(|o| o.is_gt()),
        "less_than" => compare(&actual, &expected).is_some_and(|o| o.is_lt()),
        "contains" => contains(&actual, &expected),
        "not_contains" => !contains(&actual, &expected),
        "exists" => !actual.is_null(),
        "not_exists" => actual.is_null(),
        other => {
            return Err(BlockError::Configuration(format!(
                "unknown operator '{}'",
                other
            )))
        }
    };
    Ok(met)
}

/// Equality that tolerates numbers and booleans entered as text
pub fn equal(value: &Json, target: &Json) -> bool {
    if value == target {
        return true;
    }

    match (value, target) {
        (Json::Number(a), Json::Number(b)) => a.as_f64() == b.as_f64(),
        (Json::String(s), Json::Number(n)) | (Json::Number(n), Json::String(s)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (Json::Bool(b), Json::String(s)) | (Json::String(s), Json::Bool(b)) => {
            match s.trim().to_lowercase().as_str() {
                "true" => *b,
                "false" => !*b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Numeric ordering; `None` when either side is not a number
fn compare(value: &Json, target: &Json) -> Option<std::cmp::Ordering> {
    as_number(value)?.partial_cmp(&as_number(target)?)
}

fn as_number(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn contains(value: &Json, target: &Json) -> bool {
    match (value, target) {
        (Json::String(s), Json::String(t)) => s.contains(t.as_str()),
        (Json::String(s), Json::Number(n)) => s.contains(&n.to_string()),
        (Json::Array(items), target) => items.iter().any(|item| equal(item, target)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_cross_type() {
        assert!(equal(&json!("42"), &json!(42)));
        assert!(equal(&json!(42.0), &json!("42")));
        assert!(equal(&json!(true), &json!("TRUE")));
        assert!(!equal(&json!("ok"), &json!("OK")));
    }

    #[test]
    fn test_ordering_is_numeric_only() {
        let ten = Value::from(10i64);
        assert!(evaluate("greater_than", Some(&ten), &Value::from("9")).unwrap());
        assert!(!evaluate("less_than", Some(&Value::from("abc")), &Value::from("9")).unwrap());
        assert!(!evaluate("greater_than", None, &Value::from("0")).unwrap());
    }

    #[test]
    fn test_contains_string_and_array() {
        assert!(contains(&json!("hello world"), &json!("world")));
        assert!(contains(&json!([1, 2, 3]), &json!("2")));
        assert!(!contains(&json!({"a": 1}), &json!("a")));
    }

    #[test]
    fn test_exists_treats_null_as_missing() {
        let null = Value::Null;
        assert!(!evaluate("exists", Some(&null), &Value::Null).unwrap());
        assert!(evaluate("not_exists", None, &Value::Null).unwrap());
        assert!(evaluate("exists", Some(&Value::from("x")), &Value::Null).unwrap());
    }

    #[test]
    fn test_unknown_operator() {
        assert!(matches!(
            evaluate("matches", None, &Value::Null),
            Err(BlockError::Configuration(_))
        ));
    }
}
