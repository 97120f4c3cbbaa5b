use thiserror::Error;

/// Result alias used across the simulation core.
pub type SimResult<T> = Result<T, SimError>;

/// Error raised by a component's domain computation.
///
/// The core never inspects these; they are carried back to the graph driver
/// inside [`SimError::Behavior`].
#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("no flow defined for output port '{0}'")]
    MissingFlow(String),
    #[error("missing input '{0}'")]
    MissingInput(String),
    #[error("{0}")]
    Failed(String),
}

impl BehaviorError {
    pub fn failed(msg: impl Into<String>) -> Self {
        BehaviorError::Failed(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    // Precondition violations
    #[error("component '{0}' has no network context, call init_net first")]
    NotInitialized(String),
    #[error("component '{component}' has no bound {side} sockets")]
    NotBound {
        component: String,
        side: &'static str,
    },
    #[error(
        "component '{component}' expects {expected_inputs} inputs and {expected_outputs} outputs, \
         got {inputs} and {outputs}"
    )]
    PortCountMismatch {
        component: String,
        expected_inputs: usize,
        expected_outputs: usize,
        inputs: usize,
        outputs: usize,
    },
    #[error("component '{component}' already has bound {side} sockets, call init_net to rebind")]
    AlreadyBound {
        component: String,
        side: &'static str,
    },
    #[error("component '{component}' has no {side} port with index {index}")]
    PortIndex {
        component: String,
        side: &'static str,
        index: usize,
    },

    // Configuration errors
    #[error("component '{0}' is not declared")]
    UnknownComponent(String),
    #[error("component '{component}' has no {side} port '{port}'")]
    UnknownPort {
        component: String,
        side: &'static str,
        port: String,
    },
    #[error("component '{0}' is declared twice")]
    DuplicateComponent(String),
    #[error("input '{port}' on component '{component}' is already connected")]
    DuplicateConnection { component: String, port: String },
    #[error("input '{port}' on component '{component}' has no connection and no default value")]
    UnconnectedInput { component: String, port: String },
    #[error("invalid priority: {0}")]
    InvalidPriority(String),
    #[error("component '{component}' has invalid sampling frequency {frequency}")]
    InvalidSamplingFrequency { component: String, frequency: f64 },
    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),
    #[error("cannot allocate {needed} ports starting at {base}")]
    PortRange { base: u16, needed: usize },
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    // Transport
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("malformed frame: {0}")]
    Frame(String),
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // Domain computation
    #[error("component '{component}' failed at t={time}: {source}")]
    Behavior {
        component: String,
        time: f64,
        #[source]
        source: BehaviorError,
    },
}
