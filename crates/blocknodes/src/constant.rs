use async_trait::async_trait;
use blockcore::{
    Block, BlockContext, BlockError, BlockOutput, BlockTypeDefinition, ConnectionPoint, ParamSpec,
    ParamType, Value,
};
use std::collections::HashMap;

/// Emits a fixed, typed value
pub struct ConstantBlock;

impl ConstantBlock {
    /// Coerce the configured value into the declared type
    pub fn coerce(value: &Value, value_type: &str) -> Result<Value, BlockError> {
        let mismatch = || {
            BlockError::Configuration(format!(
                "cannot use {} '{}' as {}",
                value.type_name(),
                value.to_text(),
                value_type
            ))
        };

        match value_type {
            "string" => Ok(Value::String(value.to_text())),
            "number" => value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
                .map(Value::Number)
                .ok_or_else(mismatch),
            "boolean" => match value.as_bool() {
                Some(b) => Ok(Value::Bool(b)),
                None => match value.as_str().map(|s| s.trim().to_lowercase()).as_deref() {
                    Some("true") => Ok(Value::Bool(true)),
                    Some("false") => Ok(Value::Bool(false)),
                    _ => Err(mismatch()),
                },
            },
            "object" => match value {
                Value::Object(_) | Value::Array(_) => Ok(value.clone()),
                Value::Json(json) if json.is_object() || json.is_array() => {
                    Ok(Value::from_json(json.clone()))
                }
                _ => {
                    let text = value.as_str().ok_or_else(mismatch)?;
                    match serde_json::from_str::<serde_json::Value>(text) {
                        Ok(json) if json.is_object() || json.is_array() => Ok(Value::from_json(json)),
                        _ => Err(mismatch()),
                    }
                }
            },
            other => Err(BlockError::Configuration(format!(
                "unknown value type '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl Block for ConstantBlock {
    fn block_type(&self) -> &str {
        "constant"
    }

    fn definition(&self) -> BlockTypeDefinition {
        BlockTypeDefinition::new("constant", "Constant")
            .with_description("Emits a fixed value")
            .with_category("data")
            .with_param(ParamSpec::new("value", ParamType::Object).required())
            .with_param(
                ParamSpec::new("value_type", ParamType::Choice)
                    .with_options(["string", "number", "boolean", "object"])
                    .with_default("string"),
            )
            .with_input(ConnectionPoint::input("trigger", "Trigger").gate())
            .with_output(ConnectionPoint::output("value", "Value"))
    }

    async fn run(&self, ctx: BlockContext) -> Result<BlockOutput, BlockError> {
        let value = ctx.require_config("value")?;
        let value_type = ctx.config_str("value_type").unwrap_or_else(|| "string".to_string());

        let coerced = Self::coerce(value, &value_type)?;
        Ok(BlockOutput::new().with_output("value", coerced))
    }

    // Coercion is checked when the workflow is loaded, not first at run time
    fn validate_config(&self, config: &HashMap<String, Value>) -> Result<(), BlockError> {
        self.definition()
            .validate_values(config)
            .map_err(BlockError::Configuration)?;

        if let Some(value) = config.get("value").filter(|v| !v.is_null()) {
            let value_type = config
                .get("value_type")
                .filter(|v| !v.is_null())
                .map(Value::to_text)
                .unwrap_or_else(|| "string".to_string());
            Self::coerce(value, &value_type)?;
        }
        Ok(())
    }
}
