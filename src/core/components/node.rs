use crate::core::error::{SimError, SimResult};
use crate::core::messages::{Codec, Envelope, JsonCodec};
use crate::core::net::{NetContext, SocketOptions};
use crate::core::types::{InputPortDescriptor, OutputPortDescriptor};
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle state of a [`PubSubNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No messaging context
    Unbound,
    /// `init_net` called, sockets not (fully) created yet
    Initialized,
    /// Outputs bound and inputs connected
    Bound,
}

/// Publish/subscribe endpoint set of one component.
///
/// A node has a fixed number of input and output sockets. Sockets only exist
/// between `init_net` and `unbind`; inputs keep the latest value per port and
/// outputs publish fire-and-forget.
pub struct PubSubNode {
    name: String,
    num_inputs: usize,
    num_outputs: usize,
    codec: Arc<dyn Codec>,
    /// Peer codec per input; `None` falls back to `codec`
    input_codecs: Vec<Option<Arc<dyn Codec>>>,
    options: SocketOptions,
    debug: bool,
    in_ports: Option<Vec<InputPortDescriptor>>,
    out_ports: Option<Vec<OutputPortDescriptor>>,
    bound_ports: Vec<u16>,
    inputs_connected: bool,
    context: Option<NetContext>,
    n_publish: Vec<u64>,
}

impl PubSubNode {
    pub fn new(name: impl Into<String>, num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            name: name.into(),
            num_inputs,
            num_outputs,
            codec: Arc::new(JsonCodec),
            input_codecs: vec![None; num_inputs],
            options: SocketOptions::default(),
            debug: false,
            in_ports: None,
            out_ports: None,
            bound_ports: Vec::new(),
            inputs_connected: false,
            context: None,
            n_publish: vec![0; num_outputs],
        }
    }

    /// Replace the payload codec of the outputs, and of every input that
    /// has no codec of its own
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Decode input `input_idx` with the codec its publisher encodes with
    pub fn with_input_codec(mut self, input_idx: usize, codec: Arc<dyn Codec>) -> Self {
        if let Some(slot) = self.input_codecs.get_mut(input_idx) {
            *slot = Some(codec);
        }
        self
    }

    pub fn with_options(mut self, options: SocketOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_input_socks(&self) -> usize {
        self.num_inputs
    }

    pub fn num_output_socks(&self) -> usize {
        self.num_outputs
    }

    pub fn debug_node(&self) -> bool {
        self.debug
    }

    pub fn set_debug_node(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn state(&self) -> NodeState {
        match &self.context {
            None => NodeState::Unbound,
            Some(_) if self.bound_ports.len() == self.num_outputs && self.inputs_connected => {
                NodeState::Bound
            }
            Some(_) => NodeState::Initialized,
        }
    }

    /// Encode a payload with this node's codec
    pub fn serialize(&self, payload: &Value) -> SimResult<Vec<u8>> {
        self.codec.serialize(payload)
    }

    pub fn deserialize(&self, bytes: &[u8]) -> SimResult<Value> {
        self.codec.deserialize(bytes)
    }

    /// Validate port counts and create a fresh messaging context.
    ///
    /// Any previous context is torn down first. Nothing is created when the
    /// counts do not match the node's arity.
    pub fn init_net(
        &mut self,
        in_ports: Vec<InputPortDescriptor>,
        out_ports: Vec<OutputPortDescriptor>,
    ) -> SimResult<()> {
        if in_ports.len() != self.num_inputs || out_ports.len() != self.num_outputs {
            return Err(SimError::PortCountMismatch {
                component: self.name.clone(),
                expected_inputs: self.num_inputs,
                expected_outputs: self.num_outputs,
                inputs: in_ports.len(),
                outputs: out_ports.len(),
            });
        }

        if self.context.is_some() {
            self.unbind();
        }

        self.context = Some(NetContext::new(self.name.clone(), self.options.clone()));
        self.in_ports = Some(in_ports);
        self.out_ports = Some(out_ports);
        self.n_publish = vec![0; self.num_outputs];
        Ok(())
    }

    /// Bind one publisher per output port, in port order
    pub fn bind_output(&mut self) -> SimResult<()> {
        let (Some(context), Some(out_ports)) = (self.context.as_mut(), self.out_ports.as_ref()) else {
            return Err(SimError::NotInitialized(self.name.clone()));
        };
        if !context.outputs().is_empty() {
            return Err(SimError::AlreadyBound {
                component: self.name.clone(),
                side: "output",
            });
        }

        for descriptor in out_ports {
            let port = context.bind_publisher(descriptor.port)?;
            debug!("Component '{}' bound output on *:{}", self.name, port);
            self.bound_ports.push(port);
        }
        Ok(())
    }

    /// Subscribe every input to its peer, then wait for the subscriptions to
    /// be acknowledged.
    ///
    /// A publisher that is not up yet is not an error: the listener keeps
    /// retrying and the input reads nothing until the publisher exists.
    pub fn connect_input(&mut self) -> SimResult<()> {
        let (Some(context), Some(in_ports)) = (self.context.as_mut(), self.in_ports.as_ref()) else {
            return Err(SimError::NotInitialized(self.name.clone()));
        };
        if self.inputs_connected {
            return Err(SimError::AlreadyBound {
                component: self.name.clone(),
                side: "input",
            });
        }

        for (idx, descriptor) in in_ports.iter().enumerate() {
            let codec = self
                .input_codecs
                .get(idx)
                .cloned()
                .flatten()
                .unwrap_or_else(|| Arc::clone(&self.codec));
            if self.debug {
                debug!(
                    "Component '{}' connecting {} with topic '{}'",
                    self.name,
                    descriptor.address(),
                    descriptor.topic
                );
            }
            context.connect_subscriber(descriptor.clone(), codec, self.debug)?;
        }
        self.inputs_connected = true;

        let deadline = Instant::now() + context.options().settle_timeout;
        let pending: Vec<usize> = context
            .inputs()
            .iter()
            .enumerate()
            .filter(|(_, socket)| !socket.mailbox().wait_ready(deadline))
            .map(|(idx, _)| idx)
            .collect();
        if !pending.is_empty() {
            debug!(
                "Component '{}' inputs {:?} not acknowledged yet, continuing",
                self.name, pending
            );
        }
        Ok(())
    }

    /// `init_net`, `bind_output` and `connect_input` in one call
    pub fn bind(
        &mut self,
        in_ports: Vec<InputPortDescriptor>,
        out_ports: Vec<OutputPortDescriptor>,
    ) -> SimResult<()> {
        self.init_net(in_ports, out_ports)?;
        self.bind_output()?;
        self.connect_input()
    }

    /// Ports the outputs actually listen on, in output order
    pub fn bound_ports(&self) -> &[u16] {
        &self.bound_ports
    }

    /// Publish `payload` on output `output_idx`.
    ///
    /// Only a fully bound node publishes. A non-empty topic produces a
    /// `[topic, payload]` message that subscribers can filter on; an empty
    /// topic produces a bare `[payload]`.
    pub fn send_message(&mut self, output_idx: usize, payload: &Value, topic: &str) -> SimResult<()> {
        if self.state() != NodeState::Bound {
            return Err(SimError::NotBound {
                component: self.name.clone(),
                side: "output",
            });
        }
        let Some(context) = self.context.as_ref() else {
            return Err(SimError::NotInitialized(self.name.clone()));
        };
        let socket = context.outputs().get(output_idx).ok_or_else(|| SimError::PortIndex {
            component: self.name.clone(),
            side: "output",
            index: output_idx,
        })?;

        if self.debug {
            debug!(
                "Component '{}' Socket {} Sending {} Topic '{}'",
                self.name, output_idx, self.n_publish[output_idx], topic
            );
        }
        let parts = Envelope::new(topic, payload.clone()).to_parts(self.codec.as_ref())?;
        socket.send(topic, &parts)?;
        self.n_publish[output_idx] += 1;
        Ok(())
    }

    fn input_mailbox(&self, input_idx: usize) -> SimResult<&crate::core::net::Mailbox> {
        let context = self
            .context
            .as_ref()
            .filter(|_| self.inputs_connected)
            .ok_or_else(|| SimError::NotBound {
                component: self.name.clone(),
                side: "input",
            })?;
        context
            .inputs()
            .get(input_idx)
            .map(|socket| socket.mailbox().as_ref())
            .ok_or_else(|| SimError::PortIndex {
                component: self.name.clone(),
                side: "input",
                index: input_idx,
            })
    }

    /// Most recent value delivered on input `input_idx`
    pub fn latest(&self, input_idx: usize) -> SimResult<Option<Value>> {
        Ok(self.input_mailbox(input_idx)?.latest())
    }

    /// Latest value plus the number of values delivered so far
    pub fn latest_with_generation(&self, input_idx: usize) -> SimResult<(Option<Value>, u64)> {
        Ok(self.input_mailbox(input_idx)?.latest_with_generation())
    }

    /// Wait until input `input_idx` has delivered more than `after` values
    pub fn wait_for_update(&self, input_idx: usize, after: u64, timeout: Duration) -> SimResult<bool> {
        Ok(self.input_mailbox(input_idx)?.wait_for_update(after, timeout))
    }

    /// Messages published on each output since `init_net`
    pub fn n_publish(&self) -> &[u64] {
        &self.n_publish
    }

    /// Messages received on each input since `init_net`
    pub fn n_subscribe(&self) -> Vec<u64> {
        match &self.context {
            Some(context) => context
                .inputs()
                .iter()
                .map(|socket| socket.mailbox().generation())
                .collect(),
            None => vec![0; self.num_inputs],
        }
    }

    /// Tear down every socket and the context.
    ///
    /// Safe to call at any point, including repeatedly or before anything was
    /// bound.
    pub fn unbind(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.terminate();
            debug!("Component '{}' unbound", self.name);
        }
        self.in_ports = None;
        self.out_ports = None;
        self.bound_ports.clear();
        self.inputs_connected = false;
    }
}

impl Drop for PubSubNode {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl std::fmt::Debug for PubSubNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubNode")
            .field("name", &self.name)
            .field("num_inputs", &self.num_inputs)
            .field("num_outputs", &self.num_outputs)
            .field("codec", &self.codec.name())
            .field("state", &self.state())
            .finish()
    }
}
