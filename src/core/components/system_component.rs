use crate::core::components::inputs::ObservedInputs;
use crate::core::components::node::PubSubNode;
use crate::core::components::spec::ComponentSpec;
use crate::core::components::traits::{Behavior, Component};
use crate::core::error::{BehaviorError, SimError, SimResult};
use crate::core::messages::Codec;
use crate::core::net::SocketOptions;
use crate::core::types::{ComponentId, InputPortDescriptor, OutputPortDescriptor};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Resolved socket layout of one component
#[derive(Clone, Default)]
pub struct Wiring {
    /// Connected inputs in declaration order: (input port, connect descriptor)
    pub inputs: Vec<(String, InputPortDescriptor)>,
    /// One bind descriptor per declared output, in declaration order
    pub outputs: Vec<OutputPortDescriptor>,
    /// Codec of the producer behind each entry of `inputs`
    pub input_codecs: Vec<Arc<dyn Codec>>,
}

impl std::fmt::Debug for Wiring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wiring")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field(
                "input_codecs",
                &self.input_codecs.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Per-input bookkeeping
#[derive(Debug, Clone)]
struct InputSlot {
    port: String,
    /// Index of the node socket feeding this input; `None` for inputs that
    /// only ever see their default value
    socket: Option<usize>,
    /// Mailbox generation already folded into the observed inputs
    seen_generation: u64,
}

/// A component of a system graph: declaration, domain behavior and node.
pub struct SystemComponent {
    id: ComponentId,
    spec: ComponentSpec,
    behavior: Box<dyn Behavior>,
    node: PubSubNode,
    wiring: Wiring,
    slots: Vec<InputSlot>,
    observed: ObservedInputs,
    state: Value,
    outputs: BTreeMap<String, Value>,
    time: f64,
    evaluations: u64,
}

impl SystemComponent {
    pub fn new(
        id: ComponentId,
        spec: ComponentSpec,
        behavior: Box<dyn Behavior>,
        wiring: Wiring,
        options: SocketOptions,
    ) -> Self {
        let mut node = PubSubNode::new(id.id(), wiring.inputs.len(), spec.outputs.len())
            .with_options(options);
        if let Some(codec) = &spec.codec {
            node = node.with_codec(codec.clone());
        }
        for (idx, codec) in wiring.input_codecs.iter().enumerate() {
            node = node.with_input_codec(idx, Arc::clone(codec));
        }
        node.set_debug_node(spec.debug);

        let slots = spec
            .inputs
            .iter()
            .map(|port| InputSlot {
                port: port.clone(),
                socket: wiring.inputs.iter().position(|(p, _)| p == port),
                seen_generation: 0,
            })
            .collect();

        let state = spec.initial_state.clone();
        let mut component = Self {
            id,
            spec,
            behavior,
            node,
            wiring,
            slots,
            observed: ObservedInputs::new(),
            state,
            outputs: BTreeMap::new(),
            time: 0.0,
            evaluations: 0,
        };
        component.load_defaults();
        component
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn spec(&self) -> &ComponentSpec {
        &self.spec
    }

    pub fn wiring(&self) -> &Wiring {
        &self.wiring
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn observed_inputs(&self) -> &ObservedInputs {
        &self.observed
    }

    pub fn observed_input(&self, port: &str) -> Option<&Value> {
        self.observed.get(port)
    }

    /// Output values computed by the last evaluation
    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.node.set_debug_node(debug);
    }

    fn load_defaults(&mut self) {
        self.observed.clear();
        for (port, value) in &self.spec.default_initial_values {
            self.observed.insert(port.clone(), value.clone());
        }
    }

    /// `init_net` and bind every output socket
    pub fn bind_outputs(&mut self) -> SimResult<()> {
        let in_ports = self.wiring.inputs.iter().map(|(_, d)| d.clone()).collect();
        self.node.init_net(in_ports, self.wiring.outputs.clone())?;
        self.node.bind_output()
    }

    /// Subscribe the connected inputs; outputs must be bound first
    pub fn connect_inputs(&mut self) -> SimResult<()> {
        self.node.connect_input()
    }

    /// Fold newly delivered values into the observed inputs
    pub fn read_inputs(&mut self) -> SimResult<()> {
        for slot in &mut self.slots {
            let Some(socket) = slot.socket else { continue };
            let (value, generation) = self.node.latest_with_generation(socket)?;
            if generation > slot.seen_generation {
                if let Some(value) = value {
                    self.observed.insert(slot.port.clone(), value);
                }
                slot.seen_generation = generation;
            }
        }
        Ok(())
    }

    fn input_socket(&self, port: &str) -> Option<usize> {
        self.slots.iter().find(|s| s.port == port).and_then(|s| s.socket)
    }

    /// Values delivered on `port` so far; 0 for unconnected inputs
    pub fn input_generation(&self, port: &str) -> SimResult<u64> {
        match self.input_socket(port) {
            Some(socket) => Ok(self.node.latest_with_generation(socket)?.1),
            None => Ok(0),
        }
    }

    /// Wait up to `timeout` until `port` delivers past generation `mark`.
    /// Returns false on timeout or for unconnected inputs.
    pub fn await_input_after(&self, port: &str, mark: u64, timeout: Duration) -> SimResult<bool> {
        match self.input_socket(port) {
            Some(socket) => self.node.wait_for_update(socket, mark, timeout),
            None => Ok(false),
        }
    }

    /// Compute outputs from the current state, then advance the state
    fn evaluate(&mut self, time: f64) -> Result<(), BehaviorError> {
        let mut outputs = BTreeMap::new();
        for port in &self.spec.outputs {
            let value = self.behavior.output(port, time, &self.state, &self.observed)?;
            outputs.insert(port.clone(), value);
        }
        let next_state = self.behavior.update_state(time, &self.state, &self.observed)?;

        self.outputs = outputs;
        self.state = next_state;
        self.time = time;
        self.evaluations += 1;
        Ok(())
    }

    fn wrap(&self, time: f64, source: BehaviorError) -> SimError {
        SimError::Behavior {
            component: self.id.to_string(),
            time,
            source,
        }
    }

    /// One scheduled evaluation: read inputs, compute, publish
    pub fn tick(&mut self, time: f64) -> SimResult<()> {
        self.read_inputs()?;
        self.evaluate(time).map_err(|e| self.wrap(time, e))?;
        if self.node.debug_node() {
            debug!("Component '{}' evaluated at t={:.6}", self.id, time);
        }
        self.send_output(false)
    }
}

impl Component for SystemComponent {
    fn node(&self) -> &PubSubNode {
        &self.node
    }

    fn node_mut(&mut self) -> &mut PubSubNode {
        &mut self.node
    }

    /// Back to the initial state and cold-start inputs. Values that already
    /// sit in the mailboxes are not replayed.
    fn reset(&mut self) -> SimResult<()> {
        self.state = self.spec.initial_state.clone();
        self.outputs.clear();
        self.time = 0.0;
        self.evaluations = 0;
        self.load_defaults();
        for slot in &mut self.slots {
            if let Some(socket) = slot.socket {
                if let Ok((_, generation)) = self.node.latest_with_generation(socket) {
                    slot.seen_generation = generation;
                }
            }
        }
        let parameters = self.spec.parameters.clone();
        self.behavior
            .init(&parameters)
            .map_err(|e| self.wrap(self.time, e))
    }

    fn send_output(&mut self, overwrite_buffer: bool) -> SimResult<()> {
        if overwrite_buffer {
            let time = self.time;
            self.read_inputs()?;
            self.evaluate(time).map_err(|e| self.wrap(time, e))?;
        }
        for (idx, port) in self.spec.outputs.iter().enumerate() {
            if let Some(value) = self.outputs.get(port) {
                self.node.send_message(idx, value, port)?;
            }
        }
        Ok(())
    }
}
