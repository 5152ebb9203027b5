//! Node definition registry.
//!
//! Turns the function catalog into typed [`NodeType`]s: every setting gets a
//! closed [`SettingSpec`] with its default resolved up front, every port a
//! [`DataType`]. Lookups are by type id.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use super::error::GraphError;
use super::widgets::SettingValue;
use crate::models::{Catalog, FunctionDescriptor, IoDescriptor};

/// Name of the data carried by a port. Two ports connect only when these are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataType(String);

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SettingKind {
    Int,
    Decimal,
    Str,
    Boolean,
    Slide,
    Range,
    Choice,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingKind::Int => "int",
            SettingKind::Decimal => "decimal",
            SettingKind::Str => "string",
            SettingKind::Boolean => "boolean",
            SettingKind::Slide => "slide",
            SettingKind::Range => "range",
            SettingKind::Choice => "choice",
        };
        f.write_str(name)
    }
}

/// Schema of one setting, with its default already resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingSpec {
    Int { default: i64 },
    Decimal { default: f64 },
    Str { default: String },
    Boolean { default: bool },
    Slide { min: f64, max: f64, default: f64 },
    Range {
        min: f64,
        max: f64,
        default_min: f64,
        default_max: f64,
    },
    Choice { options: Vec<String>, default: String },
}

impl SettingSpec {
    /// Builds a spec from a catalog setting entry.
    ///
    /// Defaults when the descriptor has none: 0, 0.0, "", false, the midpoint
    /// for slides, the full `[min, max]` for ranges, the first option for choices.
    pub fn from_descriptor(
        type_id: &str,
        key: &str,
        descriptor: &IoDescriptor,
    ) -> Result<Self, GraphError> {
        let invalid = |reason: &str| GraphError::InvalidDescriptor {
            type_id: type_id.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };
        let default = descriptor.param("default").filter(|v| !v.is_null());

        let spec = match descriptor.kind.as_str() {
            "int" => SettingSpec::Int {
                default: default
                    .map(|v| value_as_f64(v).ok_or_else(|| invalid("default is not a number")))
                    .transpose()?
                    .map(|v| truncate_to_i64(v).ok_or_else(|| invalid("default is out of range")))
                    .transpose()?
                    .unwrap_or(0),
            },
            "dec" | "decimal" | "float" => SettingSpec::Decimal {
                default: default
                    .map(|v| value_as_f64(v).ok_or_else(|| invalid("default is not a number")))
                    .transpose()?
                    .unwrap_or(0.0),
            },
            "str" | "string" => SettingSpec::Str {
                default: default.and_then(value_as_label).unwrap_or_default(),
            },
            "boolean" | "bool" | "bol" => SettingSpec::Boolean {
                default: default
                    .map(|v| value_as_bool(v).ok_or_else(|| invalid("default is not a boolean")))
                    .transpose()?
                    .unwrap_or(false),
            },
            "slide" => {
                let (min, max) = bounds(descriptor).ok_or_else(|| invalid("needs numeric min <= max"))?;
                let default = default
                    .and_then(value_as_f64)
                    .unwrap_or((min + max) / 2.0)
                    .clamp(min, max);
                SettingSpec::Slide { min, max, default }
            }
            "range" => {
                let (min, max) = bounds(descriptor).ok_or_else(|| invalid("needs numeric min <= max"))?;
                let low = descriptor.param_f64("defaultMin").unwrap_or(min);
                let high = descriptor.param_f64("defaultMax").unwrap_or(max);
                let (default_min, default_max) = clamp_range(min, max, low, high);
                SettingSpec::Range {
                    min,
                    max,
                    default_min,
                    default_max,
                }
            }
            "box" | "tup" | "enum" | "choice" => {
                let options: Vec<String> = descriptor
                    .param("options")
                    .or_else(|| descriptor.param("items"))
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(value_as_label).collect())
                    .unwrap_or_default();
                let first = options.first().cloned().ok_or_else(|| invalid("no options"))?;
                let default = match default.and_then(value_as_label) {
                    Some(label) if options.contains(&label) => label,
                    Some(_) => return Err(invalid("default is not one of the options")),
                    None => first,
                };
                SettingSpec::Choice { options, default }
            }
            other => return Err(invalid(&format!("unsupported setting kind '{}'", other))),
        };

        Ok(spec)
    }

    pub fn kind(&self) -> SettingKind {
        match self {
            SettingSpec::Int { .. } => SettingKind::Int,
            SettingSpec::Decimal { .. } => SettingKind::Decimal,
            SettingSpec::Str { .. } => SettingKind::Str,
            SettingSpec::Boolean { .. } => SettingKind::Boolean,
            SettingSpec::Slide { .. } => SettingKind::Slide,
            SettingSpec::Range { .. } => SettingKind::Range,
            SettingSpec::Choice { .. } => SettingKind::Choice,
        }
    }

    pub fn default_value(&self) -> SettingValue {
        match self {
            SettingSpec::Int { default } => SettingValue::Int(*default),
            SettingSpec::Decimal { default } => SettingValue::Decimal(*default),
            SettingSpec::Str { default } => SettingValue::Str(default.clone()),
            SettingSpec::Boolean { default } => SettingValue::Boolean(*default),
            SettingSpec::Slide { default, .. } => SettingValue::Slide(*default),
            SettingSpec::Range {
                default_min,
                default_max,
                ..
            } => SettingValue::Range {
                min: *default_min,
                max: *default_max,
            },
            SettingSpec::Choice { default, .. } => SettingValue::Choice(default.clone()),
        }
    }

    /// Checks a typed value against this spec. Slide and range values are
    /// clamped into bounds; a value of another kind is a `TypeMismatch`.
    pub fn accept(&self, value: SettingValue) -> Result<SettingValue, GraphError> {
        match (self, value) {
            (SettingSpec::Int { .. }, SettingValue::Int(v)) => Ok(SettingValue::Int(v)),
            (SettingSpec::Decimal { .. }, SettingValue::Decimal(v)) => Ok(SettingValue::Decimal(v)),
            (SettingSpec::Str { .. }, SettingValue::Str(v)) => Ok(SettingValue::Str(v)),
            (SettingSpec::Boolean { .. }, SettingValue::Boolean(v)) => Ok(SettingValue::Boolean(v)),
            (SettingSpec::Slide { min, max, .. }, SettingValue::Slide(v)) => {
                Ok(SettingValue::Slide(v.clamp(*min, *max)))
            }
            (SettingSpec::Range { min, max, .. }, SettingValue::Range { min: low, max: high }) => {
                let (low, high) = clamp_range(*min, *max, low, high);
                Ok(SettingValue::Range { min: low, max: high })
            }
            (SettingSpec::Choice { options, .. }, SettingValue::Choice(label)) => {
                if options.contains(&label) {
                    Ok(SettingValue::Choice(label))
                } else {
                    Err(GraphError::type_mismatch(
                        format!("one of {:?}", options),
                        format!("'{}'", label),
                    ))
                }
            }
            (spec, value) => Err(GraphError::type_mismatch(spec.kind(), value.kind())),
        }
    }

    /// Reads a raw JSON value as stored in a tree entry.
    pub fn coerce(&self, raw: &Value) -> Result<SettingValue, GraphError> {
        let mismatch = || GraphError::type_mismatch(self.kind(), raw);
        let value = match self {
            SettingSpec::Int { .. } => {
                SettingValue::Int(value_as_f64(raw).and_then(truncate_to_i64).ok_or_else(mismatch)?)
            }
            SettingSpec::Decimal { .. } => {
                SettingValue::Decimal(value_as_f64(raw).ok_or_else(mismatch)?)
            }
            SettingSpec::Str { .. } => {
                SettingValue::Str(raw.as_str().ok_or_else(mismatch)?.to_string())
            }
            SettingSpec::Boolean { .. } => SettingValue::Boolean(value_as_bool(raw).ok_or_else(mismatch)?),
            SettingSpec::Slide { .. } => SettingValue::Slide(value_as_f64(raw).ok_or_else(mismatch)?),
            SettingSpec::Range { .. } => {
                let (low, high) = match raw {
                    Value::Object(map) => (
                        map.get("min").and_then(value_as_f64),
                        map.get("max").and_then(value_as_f64),
                    ),
                    Value::Array(items) if items.len() == 2 => {
                        (value_as_f64(&items[0]), value_as_f64(&items[1]))
                    }
                    _ => (None, None),
                };
                SettingValue::Range {
                    min: low.ok_or_else(mismatch)?,
                    max: high.ok_or_else(mismatch)?,
                }
            }
            SettingSpec::Choice { .. } => match raw {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    SettingValue::Choice(value_as_label(raw).ok_or_else(mismatch)?)
                }
                _ => return Err(mismatch()),
            },
        };
        self.accept(value)
    }
}

fn bounds(descriptor: &IoDescriptor) -> Option<(f64, f64)> {
    let min = descriptor.param_f64("min")?;
    let max = descriptor.param_f64("max")?;
    (min <= max).then_some((min, max))
}

/// Clamps both ends into `[min, max]` and orders them.
fn clamp_range(min: f64, max: f64, low: f64, high: f64) -> (f64, f64) {
    let low = low.clamp(min, max);
    let high = high.clamp(min, max);
    if low <= high {
        (low, high)
    } else {
        (high, low)
    }
}

/// Drops the fraction; `None` when the result does not fit an `i64`.
pub(crate) fn truncate_to_i64(value: f64) -> Option<i64> {
    let value = value.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    (value >= i64::MIN as f64 && value < i64::MAX as f64).then_some(value as i64)
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

fn value_as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A catalog-defined node template.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeType {
    pub type_id: String,
    pub display_name: String,
    pub settings: Vec<(String, SettingSpec)>,
    pub inputs: Vec<(String, DataType)>,
    pub outputs: Vec<(String, DataType)>,
}

impl NodeType {
    pub fn from_descriptor(descriptor: &FunctionDescriptor) -> Result<Self, GraphError> {
        let type_id = descriptor.type_id.as_str();
        let settings = descriptor
            .settings
            .iter()
            .map(|(key, setting)| {
                Ok::<_, GraphError>((key.clone(), SettingSpec::from_descriptor(type_id, key, setting)?))
            })
            .collect::<Result<Vec<_>, GraphError>>()?;
        let ports = |entries: &[(String, IoDescriptor)]| {
            entries
                .iter()
                .map(|(key, io)| (key.clone(), DataType::new(io.kind.clone())))
                .collect::<Vec<_>>()
        };

        Ok(Self {
            type_id: type_id.to_string(),
            display_name: descriptor.name.clone(),
            settings,
            inputs: ports(&descriptor.inputs),
            outputs: ports(&descriptor.outputs),
        })
    }

    pub fn setting_spec(&self, key: &str) -> Option<&SettingSpec> {
        self.settings.iter().find(|(k, _)| k == key).map(|(_, spec)| spec)
    }

    pub fn port_type(&self, key: &str, direction: PortDirection) -> Option<&DataType> {
        let ports = match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        };
        ports.iter().find(|(k, _)| k == key).map(|(_, data_type)| data_type)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    types: Vec<NodeType>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Builds one node type per catalog function. A malformed descriptor
    /// fails the whole load; a repeated type id keeps the first definition.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, GraphError> {
        let mut registry = Registry::default();
        for descriptor in catalog.functions() {
            let node_type = NodeType::from_descriptor(descriptor)?;
            registry.insert(node_type);
        }
        log::info!("[registry] loaded {} node types", registry.types.len());
        Ok(registry)
    }

    pub fn from_types(types: impl IntoIterator<Item = NodeType>) -> Self {
        let mut registry = Registry::default();
        for node_type in types {
            registry.insert(node_type);
        }
        registry
    }

    fn insert(&mut self, node_type: NodeType) {
        if self.index.contains_key(&node_type.type_id) {
            log::warn!(
                "[registry] duplicate node type '{}' ignored",
                node_type.type_id
            );
            return;
        }
        self.index.insert(node_type.type_id.clone(), self.types.len());
        self.types.push(node_type);
    }

    pub fn get(&self, type_id: &str) -> Result<&NodeType, GraphError> {
        self.index
            .get(type_id)
            .map(|&i| &self.types[i])
            .ok_or_else(|| GraphError::UnknownType(type_id.to_string()))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.index.contains_key(type_id)
    }

    /// Node types in catalog order.
    pub fn node_types(&self) -> &[NodeType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn resolve_setting_spec(&self, type_id: &str, setting: &str) -> Result<&SettingSpec, GraphError> {
        self.get(type_id)?
            .setting_spec(setting)
            .ok_or_else(|| GraphError::UnknownSetting {
                type_id: type_id.to_string(),
                setting: setting.to_string(),
            })
    }

    pub fn resolve_port_type(
        &self,
        type_id: &str,
        port: &str,
        direction: PortDirection,
    ) -> Result<&DataType, GraphError> {
        self.get(type_id)?
            .port_type(port, direction)
            .ok_or_else(|| GraphError::UnknownPort {
                type_id: type_id.to_string(),
                port: port.to_string(),
                direction,
            })
    }
}
