use crate::core::error::BehaviorError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Input values a component observes at the moment it evaluates.
///
/// Each entry is either the latest value delivered on that port or, before
/// anything arrived, the port's default initial value. Ports with neither are
/// absent. Values of different ports are not a consistent snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedInputs {
    values: BTreeMap<String, Value>,
}

impl ObservedInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, port: impl Into<String>, value: Value) {
        self.values.insert(port.into(), value);
    }

    pub fn get(&self, port: &str) -> Option<&Value> {
        self.values.get(port)
    }

    pub fn contains(&self, port: &str) -> bool {
        self.values.contains_key(port)
    }

    pub fn require(&self, port: &str) -> Result<&Value, BehaviorError> {
        self.get(port)
            .ok_or_else(|| BehaviorError::MissingInput(port.to_string()))
    }

    /// Read a port as a numeric vector; a bare number is a one element vector
    pub fn numbers(&self, port: &str) -> Result<Vec<f64>, BehaviorError> {
        as_numbers(self.require(port)?)
            .ok_or_else(|| BehaviorError::failed(format!("input '{}' is not numeric", port)))
    }

    /// Concatenate several numeric ports in the given order
    pub fn concat(&self, ports: &[&str]) -> Result<Vec<f64>, BehaviorError> {
        let mut out = Vec::new();
        for port in ports {
            out.extend(self.numbers(port)?);
        }
        Ok(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl FromIterator<(String, Value)> for ObservedInputs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Interpret a value as a list of numbers
pub fn as_numbers(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Number(n) => n.as_f64().map(|x| vec![x]),
        Value::Array(items) => items.iter().map(Value::as_f64).collect(),
        _ => None,
    }
}
