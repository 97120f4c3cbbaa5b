use crate::core::messages::Codec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// When a component is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Every scheduler tick
    Continuous,
    /// Whenever the clock crosses a multiple of `1 / sampling_frequency`
    Discrete { sampling_frequency: f64 },
}

impl ComponentKind {
    pub fn discrete(sampling_frequency: f64) -> Self {
        ComponentKind::Discrete { sampling_frequency }
    }

    /// Sampling period, `None` for continuous components
    pub fn period(&self) -> Option<f64> {
        match self {
            ComponentKind::Continuous => None,
            ComponentKind::Discrete { sampling_frequency } => Some(1.0 / sampling_frequency),
        }
    }
}

/// Static declaration of a component type: ports, timing and cold-start
/// values. Built before the graph starts and never changed afterwards.
#[derive(Clone)]
pub struct ComponentSpec {
    pub name: String,
    pub kind: ComponentKind,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// Values an input reads until its first message arrives
    pub default_initial_values: BTreeMap<String, Value>,
    pub initial_state: Value,
    pub parameters: Value,
    pub debug: bool,
    pub codec: Option<Arc<dyn Codec>>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            default_initial_values: BTreeMap::new(),
            initial_state: json!([]),
            parameters: json!({}),
            debug: false,
            codec: None,
        }
    }

    pub fn continuous(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Continuous)
    }

    pub fn discrete(name: impl Into<String>, sampling_frequency: f64) -> Self {
        Self::new(name, ComponentKind::discrete(sampling_frequency))
    }

    pub fn input(mut self, port: impl Into<String>) -> Self {
        self.inputs.push(port.into());
        self
    }

    /// Input with a cold-start value; such an input may stay unconnected
    pub fn input_with_default(mut self, port: impl Into<String>, default: Value) -> Self {
        let port = port.into();
        self.default_initial_values.insert(port.clone(), default);
        self.inputs.push(port);
        self
    }

    pub fn output(mut self, port: impl Into<String>) -> Self {
        self.outputs.push(port.into());
        self
    }

    pub fn initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p == port)
    }

    pub fn has_output(&self, port: &str) -> bool {
        self.outputs.iter().any(|p| p == port)
    }

    pub fn default_for(&self, port: &str) -> Option<&Value> {
        self.default_initial_values.get(port)
    }
}

impl std::fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("codec", &self.codec.as_ref().map(|c| c.name()))
            .finish_non_exhaustive()
    }
}
