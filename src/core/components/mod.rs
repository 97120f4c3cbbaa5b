pub mod flows;
pub mod inputs;
pub mod node;
pub mod spec;
pub mod system_component;
pub mod traits;

// Re-export commonly used types
pub use flows::{FlowContext, FlowTable};
pub use inputs::ObservedInputs;
pub use node::{NodeState, PubSubNode};
pub use spec::{ComponentKind, ComponentSpec};
pub use system_component::{SystemComponent, Wiring};
pub use traits::{Behavior, Component};
