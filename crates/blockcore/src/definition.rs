use crate::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Primitive types usable in parameter schemas and socket field docs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Choice,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Choice => "choice",
        }
    }
}

/// One configurable parameter of a block type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    /// Allowed values for `Choice` parameters
    pub options: Vec<String>,
    pub description: String,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: None,
            options: Vec::new(),
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check a configured value against this parameter's type
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match self.param_type {
            // Scalars entered in the editor arrive as text; accept anything that renders
            ParamType::String => !matches!(value, Value::Array(_) | Value::Object(_)),
            ParamType::Number => {
                value.as_f64().is_some()
                    || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
            }
            ParamType::Boolean => {
                value.as_bool().is_some()
                    || value
                        .as_str()
                        .is_some_and(|s| matches!(s.to_lowercase().as_str(), "true" | "false"))
            }
            ParamType::Object => true,
            ParamType::Choice => {
                return match value.as_str() {
                    Some(s) if self.options.iter().any(|o| o == s) => Ok(()),
                    _ => Err(format!(
                        "'{}' must be one of [{}], got {}",
                        self.name,
                        self.options.join(", "),
                        value.to_text()
                    )),
                };
            }
        };

        if ok {
            Ok(())
        } else {
            Err(format!(
                "'{}' expects {}, got {}",
                self.name,
                self.param_type.as_str(),
                value.type_name()
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketDirection {
    Input,
    Output,
}

/// Documented field of the value flowing through a socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataField {
    pub name: String,
    pub field_type: ParamType,
    pub description: String,
}

/// Socket declared by a block type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoint {
    pub id: String,
    pub direction: SocketDirection,
    pub label: String,
    /// Inputs only: the block is skipped when a required input is absent
    pub required: bool,
    /// Inputs only: control socket whose value is ignored; required once connected
    #[serde(default)]
    pub gate: bool,
    pub fields: Vec<DataField>,
}

impl ConnectionPoint {
    pub fn input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: SocketDirection::Input,
            label: label.into(),
            required: true,
            gate: false,
            fields: Vec::new(),
        }
    }

    pub fn output(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: SocketDirection::Output,
            label: label.into(),
            required: false,
            gate: false,
            fields: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Turn an input into a gate: unwired it is ignored, wired it must receive a value
    pub fn gate(mut self) -> Self {
        self.required = false;
        self.gate = true;
        self
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        field_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(DataField {
            name: name.into(),
            field_type,
            description: description.into(),
        });
        self
    }
}

/// Metadata describing a block type: palette info, parameters and sockets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockTypeDefinition {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub params: Vec<ParamSpec>,
    pub inputs: Vec<ConnectionPoint>,
    pub outputs: Vec<ConnectionPoint>,
    /// Set for blocks that wait on an external event with no natural bound
    pub waits_for_event: bool,
}

impl BlockTypeDefinition {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
            category: "general".to_string(),
            params: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            waits_for_event: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_input(mut self, socket: ConnectionPoint) -> Self {
        self.inputs.push(socket);
        self
    }

    pub fn with_output(mut self, socket: ConnectionPoint) -> Self {
        self.outputs.push(socket);
        self
    }

    pub fn waiting_for_event(mut self) -> Self {
        self.waits_for_event = true;
        self
    }

    pub fn input(&self, id: &str) -> Option<&ConnectionPoint> {
        self.inputs.iter().find(|s| s.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&ConnectionPoint> {
        self.outputs.iter().find(|s| s.id == id)
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Ids of the input sockets that must be present for the block to run
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().filter(|s| s.required).map(|s| s.id.as_str())
    }

    /// Ids of gate inputs; these must be present only when something is wired to them
    pub fn gate_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().filter(|s| s.gate).map(|s| s.id.as_str())
    }

    /// Check config values against the parameter schema
    pub fn validate_values(&self, values: &HashMap<String, Value>) -> Result<(), String> {
        for param in &self.params {
            match values.get(&param.name) {
                Some(value) if !value.is_null() => param.check(value)?,
                _ if param.required && param.default.is_none() => {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
                _ => {}
            }
        }

        if let Some(unknown) = values.keys().find(|k| self.param(k).is_none()) {
            return Err(format!("unknown parameter '{}'", unknown));
        }

        Ok(())
    }

    /// Fill in declared defaults for absent parameters
    pub fn apply_defaults(&self, values: &HashMap<String, Value>) -> HashMap<String, Value> {
        let mut merged = values.clone();
        for param in &self.params {
            if let Some(default) = &param.default {
                merged
                    .entry(param.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        merged
    }
}
