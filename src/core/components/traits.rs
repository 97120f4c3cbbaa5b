use crate::core::components::inputs::ObservedInputs;
use crate::core::components::node::PubSubNode;
use crate::core::error::{BehaviorError, SimResult};
use serde_json::Value;

/// Domain computation of a component.
///
/// The simulation core treats implementations as opaque: it hands over the
/// observed inputs and current state and publishes whatever comes back.
/// Model code (plant dynamics, controllers, autopilots) lives behind this
/// trait.
pub trait Behavior: Send {
    /// Called whenever the component is reset, before its first evaluation
    fn init(&mut self, _parameters: &Value) -> Result<(), BehaviorError> {
        Ok(())
    }

    /// Value to publish on output `port`
    fn output(
        &mut self,
        port: &str,
        time: f64,
        state: &Value,
        inputs: &ObservedInputs,
    ) -> Result<Value, BehaviorError>;

    /// Next state. Stateless components keep the default.
    fn update_state(
        &mut self,
        _time: f64,
        state: &Value,
        _inputs: &ObservedInputs,
    ) -> Result<Value, BehaviorError> {
        Ok(state.clone())
    }
}

/// A schedulable unit that owns a pub/sub node.
///
/// Every concrete component must say how it returns to its initial state and
/// how it computes and publishes one tick of outputs.
pub trait Component {
    fn node(&self) -> &PubSubNode;

    fn node_mut(&mut self) -> &mut PubSubNode;

    /// Restore the component to its initial state
    fn reset(&mut self) -> SimResult<()>;

    /// Publish the output buffer; recompute it first when `overwrite_buffer`
    fn send_output(&mut self, overwrite_buffer: bool) -> SimResult<()>;

    fn name(&self) -> &str {
        self.node().name()
    }

    fn unbind(&mut self) {
        self.node_mut().unbind();
    }
}
