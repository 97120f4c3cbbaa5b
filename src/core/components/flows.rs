use crate::core::components::inputs::ObservedInputs;
use crate::core::components::traits::Behavior;
use crate::core::error::BehaviorError;
use serde_json::Value;
use std::collections::HashMap;

/// Arguments handed to a flow function
pub struct FlowContext<'a> {
    pub parameters: &'a Value,
    pub time: f64,
    pub state: &'a Value,
    pub inputs: &'a ObservedInputs,
}

type FlowFn = Box<dyn FnMut(&FlowContext<'_>) -> Result<Value, BehaviorError> + Send>;
type InitFn = Box<dyn FnMut(&Value) -> Result<(), BehaviorError> + Send>;

/// Behavior assembled from closures, one per output port.
///
/// ```
/// use pubsim::core::components::FlowTable;
/// use serde_json::json;
///
/// let flows = FlowTable::new()
///     .flow("outputs", |ctx| Ok(json!([ctx.time])))
///     .state_update(|ctx| Ok(ctx.state.clone()));
/// ```
#[derive(Default)]
pub struct FlowTable {
    parameters: Value,
    flows: HashMap<String, FlowFn>,
    state_update: Option<FlowFn>,
    on_init: Option<InitFn>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow<F>(mut self, port: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&FlowContext<'_>) -> Result<Value, BehaviorError> + Send + 'static,
    {
        self.flows.insert(port.into(), Box::new(f));
        self
    }

    pub fn state_update<F>(mut self, f: F) -> Self
    where
        F: FnMut(&FlowContext<'_>) -> Result<Value, BehaviorError> + Send + 'static,
    {
        self.state_update = Some(Box::new(f));
        self
    }

    pub fn on_init<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Value) -> Result<(), BehaviorError> + Send + 'static,
    {
        self.on_init = Some(Box::new(f));
        self
    }
}

impl Behavior for FlowTable {
    fn init(&mut self, parameters: &Value) -> Result<(), BehaviorError> {
        self.parameters = parameters.clone();
        match self.on_init.as_mut() {
            Some(f) => f(parameters),
            None => Ok(()),
        }
    }

    fn output(
        &mut self,
        port: &str,
        time: f64,
        state: &Value,
        inputs: &ObservedInputs,
    ) -> Result<Value, BehaviorError> {
        let flow = self
            .flows
            .get_mut(port)
            .ok_or_else(|| BehaviorError::MissingFlow(port.to_string()))?;
        flow(&FlowContext {
            parameters: &self.parameters,
            time,
            state,
            inputs,
        })
    }

    fn update_state(
        &mut self,
        time: f64,
        state: &Value,
        inputs: &ObservedInputs,
    ) -> Result<Value, BehaviorError> {
        match self.state_update.as_mut() {
            Some(f) => f(&FlowContext {
                parameters: &self.parameters,
                time,
                state,
                inputs,
            }),
            None => Ok(state.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flow_dispatch_by_port() {
        let mut flows = FlowTable::new()
            .flow("a", |_| Ok(json!(1)))
            .flow("b", |ctx| Ok(json!(ctx.parameters["gain"].as_f64().unwrap_or(0.0) * ctx.time)));
        flows.init(&json!({"gain": 2.0})).unwrap();

        let inputs = ObservedInputs::new();
        assert_eq!(flows.output("a", 0.5, &json!([]), &inputs).unwrap(), json!(1));
        assert_eq!(flows.output("b", 0.5, &json!([]), &inputs).unwrap(), json!(1.0));
        assert!(matches!(
            flows.output("c", 0.5, &json!([]), &inputs),
            Err(BehaviorError::MissingFlow(_))
        ));
    }

    #[test]
    fn test_default_state_update_keeps_state() {
        let mut flows = FlowTable::new();
        let state = json!([1, 2]);
        assert_eq!(
            flows.update_state(0.0, &state, &ObservedInputs::new()).unwrap(),
            state
        );
    }
}
