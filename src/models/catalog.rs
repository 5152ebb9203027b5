use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use ts_rs::TS;

/// One setting, input or output slot of a function descriptor.
///
/// `kind` is the catalog's type tag: a setting kind (`int`, `dec`, `slide`, ...)
/// for settings, a data type name (`mat`, `num`, ...) for ports.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "catalog.ts")]
pub struct IoDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[ts(type = "Record<string, unknown>")]
    pub params: Map<String, Value>,
}

impl IoDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }
}

/// Catalog entry describing one function node type.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "catalog.ts")]
pub struct FunctionDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default, with = "ordered_entries")]
    #[ts(type = "Record<string, IoDescriptor>")]
    pub settings: Vec<(String, IoDescriptor)>,
    #[serde(default, with = "ordered_entries")]
    #[ts(type = "Record<string, IoDescriptor>")]
    pub inputs: Vec<(String, IoDescriptor)>,
    #[serde(default, with = "ordered_entries")]
    #[ts(type = "Record<string, IoDescriptor>")]
    pub outputs: Vec<(String, IoDescriptor)>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: type_id.into(),
            settings: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn setting(mut self, key: &str, descriptor: IoDescriptor) -> Self {
        self.settings.push((key.to_string(), descriptor));
        self
    }

    pub fn input(mut self, key: &str, data_type: &str) -> Self {
        self.inputs.push((key.to_string(), IoDescriptor::new(data_type)));
        self
    }

    pub fn output(mut self, key: &str, data_type: &str) -> Self {
        self.outputs.push((key.to_string(), IoDescriptor::new(data_type)));
        self
    }
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "catalog.ts")]
pub struct ModuleDescriptor {
    pub package: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub funcs: Vec<FunctionDescriptor>,
}

/// The function catalog served by the pipeline backend.
///
/// Older backends serve a flat `funcs` list, newer ones group functions by
/// module. Both shapes are accepted.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[ts(export, export_to = "catalog.ts")]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub funcs: Vec<FunctionDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleDescriptor>,
}

impl Catalog {
    pub fn from_funcs(funcs: Vec<FunctionDescriptor>) -> Self {
        Self {
            funcs,
            modules: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// All function descriptors: flat list first, then each module in order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.funcs
            .iter()
            .chain(self.modules.iter().flat_map(|module| module.funcs.iter()))
    }
}

/// (De)serializes a JSON object as a `Vec` of entries so document order survives.
mod ordered_entries {
    use super::*;

    pub fn serialize<S>(entries: &[(String, IoDescriptor)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, IoDescriptor)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Vec<(String, IoDescriptor)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of descriptors")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, IoDescriptor>()? {
                    entries.push((key, value));
                }
                Ok(entries)
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }
        }

        deserializer.deserialize_any(EntriesVisitor)
    }
}
