use serde::{Deserialize, Serialize};

/// Identifier of a component inside a system graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub(crate) String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Create an output port handle
    pub fn output(&self, port: &str) -> OutputPort {
        OutputPort {
            component_id: self.clone(),
            port_name: port.to_string(),
        }
    }

    /// Create an input port handle
    pub fn input(&self, port: &str) -> InputPort {
        InputPort {
            component_id: self.clone(),
            port_name: port.to_string(),
        }
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Handle for an output port
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputPort {
    pub(crate) component_id: ComponentId,
    pub(crate) port_name: String,
}

impl OutputPort {
    pub fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl std::fmt::Display for OutputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.component_id, self.port_name)
    }
}

/// Handle for an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputPort {
    pub(crate) component_id: ComponentId,
    pub(crate) port_name: String,
}

impl InputPort {
    pub fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl std::fmt::Display for InputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.component_id, self.port_name)
    }
}

/// Side of a component a port lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    /// Input port - subscribes to another component's output
    Input,
    /// Output port - publishes to any number of subscribers
    Output,
}

impl PortType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortType::Input => "input",
            PortType::Output => "output",
        }
    }
}

/// Bind descriptor for an output socket.
///
/// Outputs always bind on every local interface; port 0 asks the OS for an
/// ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputPortDescriptor {
    pub port: u16,
}

impl OutputPortDescriptor {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Connect descriptor for an input socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputPortDescriptor {
    pub host: String,
    pub port: u16,
    /// Only messages published under exactly this topic are delivered.
    /// An empty topic subscribes to everything.
    pub topic: String,
}

impl InputPortDescriptor {
    pub fn new(host: impl Into<String>, port: u16, topic: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            topic: topic.into(),
        }
    }

    /// Peer on the loopback interface
    pub fn local(port: u16, topic: impl Into<String>) -> Self {
        Self::new("127.0.0.1", port, topic)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
