//! Typed setting widgets.
//!
//! A widget owns the current value of one node setting and turns raw user
//! interaction into a value change plus a persistence hint: text and number
//! fields commit after a quiet period, sliders on pointer release,
//! checkboxes and choices immediately.

use serde_json::{json, Value};
use std::fmt;

use super::error::GraphError;
use super::node::NodeId;
use super::registry::{truncate_to_i64, SettingKind, SettingSpec};

/// Concrete value of a setting.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingValue {
    Int(i64),
    Decimal(f64),
    Str(String),
    Boolean(bool),
    Slide(f64),
    Range { min: f64, max: f64 },
    Choice(String),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Int(_) => SettingKind::Int,
            SettingValue::Decimal(_) => SettingKind::Decimal,
            SettingValue::Str(_) => SettingKind::Str,
            SettingValue::Boolean(_) => SettingKind::Boolean,
            SettingValue::Slide(_) => SettingKind::Slide,
            SettingValue::Range { .. } => SettingKind::Range,
            SettingValue::Choice(_) => SettingKind::Choice,
        }
    }

    /// The form stored in a tree entry's `settings` map.
    pub fn to_json(&self) -> Value {
        match self {
            SettingValue::Int(v) => json!(v),
            SettingValue::Decimal(v) | SettingValue::Slide(v) => json!(v),
            SettingValue::Str(v) | SettingValue::Choice(v) => json!(v),
            SettingValue::Boolean(v) => json!(v),
            SettingValue::Range { min, max } => json!({ "min": min, "max": max }),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Composite address of one widget: the owning node plus the setting key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingAddress {
    pub node_id: NodeId,
    pub setting: String,
}

impl SettingAddress {
    pub fn new(node_id: NodeId, setting: impl Into<String>) -> Self {
        Self {
            node_id,
            setting: setting.into(),
        }
    }
}

impl fmt::Display for SettingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_id, self.setting)
    }
}

/// Raw interaction delivered to a widget.
#[derive(Clone, Debug, PartialEq)]
pub enum WidgetInput {
    /// Keystroke in a text or number field; carries the full field text.
    Text(String),
    /// Focus left the field or Enter was pressed.
    Blur,
    Toggle(bool),
    Select(String),
    /// Slider thumb moved while the pointer is held.
    SlideTo(f64),
    /// Range thumbs moved while the pointer is held.
    RangeTo { min: f64, max: f64 },
    /// Pointer released after a slider/range drag.
    Release,
}

/// When the edit should reach the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistMode {
    /// Value changed mid-gesture; the commit comes later.
    None,
    /// Coalesce with other edits; persist after the quiet period.
    Debounced,
    Immediate,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditOutcome {
    pub value: SettingValue,
    pub changed: bool,
    pub persist: PersistMode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SettingWidget {
    spec: SettingSpec,
    value: SettingValue,
}

impl SettingWidget {
    pub fn new(spec: SettingSpec) -> Self {
        let value = spec.default_value();
        Self { spec, value }
    }

    pub fn spec(&self) -> &SettingSpec {
        &self.spec
    }

    pub fn kind(&self) -> SettingKind {
        self.spec.kind()
    }

    pub fn current_value(&self) -> &SettingValue {
        &self.value
    }

    /// Programmatic set. Out-of-bounds slide/range values are clamped.
    pub fn set_value(&mut self, value: SettingValue) -> Result<(), GraphError> {
        self.value = self.spec.accept(value)?;
        Ok(())
    }

    /// Applies one user interaction. The value is updated before this returns,
    /// so a read between a change and its commit sees the new value.
    pub fn apply(&mut self, input: WidgetInput) -> Result<EditOutcome, GraphError> {
        let kind = self.kind();
        let (next, persist) = match (&self.spec, input) {
            (SettingSpec::Int { .. }, WidgetInput::Text(text)) => {
                let value = truncate_to_i64(parse_number(&text, kind)?)
                    .ok_or_else(|| GraphError::type_mismatch(kind, format!("'{}'", text)))?;
                (SettingValue::Int(value), PersistMode::Debounced)
            }
            (SettingSpec::Decimal { .. }, WidgetInput::Text(text)) => {
                (SettingValue::Decimal(parse_number(&text, kind)?), PersistMode::Debounced)
            }
            (SettingSpec::Str { .. }, WidgetInput::Text(text)) => {
                (SettingValue::Str(text), PersistMode::Debounced)
            }
            (
                SettingSpec::Int { .. } | SettingSpec::Decimal { .. } | SettingSpec::Str { .. },
                WidgetInput::Blur,
            ) => (self.value.clone(), PersistMode::Immediate),
            (SettingSpec::Boolean { .. }, WidgetInput::Toggle(on)) => {
                (SettingValue::Boolean(on), PersistMode::Immediate)
            }
            (SettingSpec::Choice { .. }, WidgetInput::Select(label)) => {
                (SettingValue::Choice(label), PersistMode::Immediate)
            }
            (SettingSpec::Slide { .. }, WidgetInput::SlideTo(v)) => (SettingValue::Slide(v), PersistMode::None),
            (SettingSpec::Range { .. }, WidgetInput::RangeTo { min, max }) => {
                (SettingValue::Range { min, max }, PersistMode::None)
            }
            (SettingSpec::Slide { .. } | SettingSpec::Range { .. }, WidgetInput::Release) => {
                (self.value.clone(), PersistMode::Immediate)
            }
            (_, input) => return Err(GraphError::type_mismatch(kind, format!("{:?}", input))),
        };

        let next = self.spec.accept(next)?;
        let changed = next != self.value;
        self.value = next;

        Ok(EditOutcome {
            value: self.value.clone(),
            changed,
            persist,
        })
    }
}

fn parse_number(text: &str, kind: SettingKind) -> Result<f64, GraphError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GraphError::type_mismatch(kind, format!("'{}'", text)))
}
