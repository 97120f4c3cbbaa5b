use crate::core::components::spec::{ComponentKind, ComponentSpec};
use crate::core::components::system_component::{SystemComponent, Wiring};
use crate::core::components::traits::{Behavior, Component};
use crate::core::connections::{ConnectionMap, ConnectionValidator, PortAllocator, PortPlan};
use crate::core::error::{SimError, SimResult};
use crate::core::execution::config::GraphConfig;
use crate::core::execution::execution_order::{ExecutionOrder, ExecutionOrderBuilder};
use crate::core::execution::system_engine::{build_pool, for_each_component, SystemEngine};
use crate::core::messages::{Codec, JsonCodec};
use crate::core::types::{ComponentId, InputPortDescriptor, OutputPort, OutputPortDescriptor};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Declared {
    spec: ComponentSpec,
    behavior: Box<dyn Behavior>,
}

/// Imperative API for declaring a system graph.
///
/// Nothing touches the network until [`SystemGraph::bind`]; `build` only
/// validates and resolves ports.
///
/// ```no_run
/// use pubsim::core::builder::SystemBuilder;
/// use pubsim::core::components::{ComponentSpec, FlowTable};
/// use serde_json::json;
///
/// let mut builder = SystemBuilder::new();
/// builder.add_component(
///     "source",
///     ComponentSpec::continuous("source").output("value"),
///     FlowTable::new().flow("value", |ctx| Ok(json!(ctx.time))),
/// )?;
/// builder.add_component(
///     "sink",
///     ComponentSpec::continuous("sink").input("value").output("echo"),
///     FlowTable::new().flow("echo", |ctx| Ok(ctx.inputs.require("value")?.clone())),
/// )?;
/// builder.connect("sink", "value", "source", "value")?;
///
/// let mut engine = builder.build()?.bind()?;
/// engine.run(10)?;
/// # Ok::<(), pubsim::core::error::SimError>(())
/// ```
pub struct SystemBuilder {
    components: BTreeMap<ComponentId, Declared>,
    connections: ConnectionMap,
    priority: Vec<ComponentId>,
    config: GraphConfig,
}

impl SystemBuilder {
    pub fn new() -> Self {
        Self {
            components: BTreeMap::new(),
            connections: ConnectionMap::new(),
            priority: Vec::new(),
            config: GraphConfig::default(),
        }
    }

    pub fn add_component<B>(
        &mut self,
        id: impl Into<ComponentId>,
        spec: ComponentSpec,
        behavior: B,
    ) -> SimResult<ComponentId>
    where
        B: Behavior + 'static,
    {
        self.add_boxed(id, spec, Box::new(behavior))
    }

    pub fn add_boxed(
        &mut self,
        id: impl Into<ComponentId>,
        spec: ComponentSpec,
        behavior: Box<dyn Behavior>,
    ) -> SimResult<ComponentId> {
        let id = id.into();
        if self.components.contains_key(&id) {
            return Err(SimError::DuplicateComponent(id.to_string()));
        }
        self.components.insert(id.clone(), Declared { spec, behavior });
        Ok(id)
    }

    /// Feed `consumer.input` from `producer.output`. An input can only be
    /// fed once; ports are checked in `build`.
    pub fn connect(
        &mut self,
        consumer: impl Into<ComponentId>,
        input: &str,
        producer: impl Into<ComponentId>,
        output: &str,
    ) -> SimResult<()> {
        let consumer = consumer.into();
        let producer = producer.into();
        self.connections
            .add(consumer.input(input), producer.output(output))
    }

    /// Connect from `(consumer, input, producer, output)` tuples
    pub fn connections<'a, I>(&mut self, entries: I) -> SimResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str, &'a str, &'a str)>,
    {
        for (consumer, input, producer, output) in entries {
            self.connect(consumer, input, producer, output)?;
        }
        Ok(())
    }

    /// Components evaluated first in every tick, in this order
    pub fn priority<I, T>(&mut self, ids: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ComponentId>,
    {
        self.priority = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(&mut self, config: GraphConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Validate the declaration and resolve ports and evaluation order
    pub fn build(self) -> SimResult<SystemGraph> {
        let time_step = self.config.time_step;
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(SimError::InvalidTimeStep(time_step));
        }

        for (id, declared) in &self.components {
            if let ComponentKind::Discrete { sampling_frequency } = declared.spec.kind {
                if !(sampling_frequency.is_finite() && sampling_frequency > 0.0) {
                    return Err(SimError::InvalidSamplingFrequency {
                        component: id.to_string(),
                        frequency: sampling_frequency,
                    });
                }
            }
        }

        let specs: BTreeMap<ComponentId, ComponentSpec> = self
            .components
            .iter()
            .map(|(id, d)| (id.clone(), d.spec.clone()))
            .collect();

        ConnectionValidator::validate(&specs, &self.connections)?;
        let port_plan = PortAllocator::new(self.config.base_port).allocate(&specs)?;

        let ids: Vec<ComponentId> = specs.keys().cloned().collect();
        let order = ExecutionOrderBuilder::build(
            &ids,
            &self.connections.dependency_edges(),
            &self.priority,
        )?;

        let stats = self.connections.stats();
        info!(
            "System graph built: {} components, {} connections, {} ports from {}",
            ids.len(),
            stats.connections,
            port_plan.len(),
            self.config.base_port
        );

        Ok(SystemGraph {
            components: self.components,
            connections: self.connections,
            port_plan,
            order,
            config: self.config,
        })
    }
}

impl Default for SystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A validated system graph with resolved ports, not yet on the network
pub struct SystemGraph {
    components: BTreeMap<ComponentId, Declared>,
    connections: ConnectionMap,
    port_plan: PortPlan,
    order: ExecutionOrder,
    config: GraphConfig,
}

impl SystemGraph {
    pub fn port_plan(&self) -> &PortPlan {
        &self.port_plan
    }

    pub fn evaluation_order(&self) -> &[ComponentId] {
        &self.order.sequence
    }

    pub fn feedback_edges(&self) -> impl Iterator<Item = &(ComponentId, ComponentId)> {
        self.order.feedback_edges.iter()
    }

    pub fn connections(&self) -> &ConnectionMap {
        &self.connections
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn spec(&self, id: &ComponentId) -> Option<&ComponentSpec> {
        self.components.get(id).map(|d| &d.spec)
    }

    /// Socket layout of `id` under the port plan
    pub fn wiring(&self, id: &ComponentId) -> SimResult<Wiring> {
        let declared = self
            .components
            .get(id)
            .ok_or_else(|| SimError::UnknownComponent(id.to_string()))?;

        let mut wiring = Wiring::default();
        for port in &declared.spec.inputs {
            let Some(producer) = self.connections.producer_of(&id.input(port)) else {
                continue;
            };
            let bound = self.planned_port(producer)?;
            wiring.inputs.push((
                port.clone(),
                InputPortDescriptor::new(self.config.host.clone(), bound, producer.port_name()),
            ));
            wiring.input_codecs.push(self.codec_of(producer.component_id()));
        }
        for port in &declared.spec.outputs {
            wiring
                .outputs
                .push(OutputPortDescriptor::new(self.planned_port(&id.output(port))?));
        }
        Ok(wiring)
    }

    /// Codec the sockets of `id` encode with
    fn codec_of(&self, id: &ComponentId) -> Arc<dyn Codec> {
        self.components
            .get(id)
            .and_then(|d| d.spec.codec.clone())
            .unwrap_or_else(|| Arc::new(JsonCodec))
    }

    fn planned_port(&self, output: &OutputPort) -> SimResult<u16> {
        self.port_plan
            .get(output)
            .copied()
            .ok_or_else(|| SimError::UnknownPort {
                component: output.component_id().to_string(),
                side: "output",
                port: output.port_name().to_string(),
            })
    }

    /// Bring the graph up: bind every output of every component, then
    /// connect every input. On failure everything bound so far is released.
    pub fn bind(self) -> SimResult<SystemEngine> {
        let pool = build_pool(&self.config)?;

        let mut wirings = BTreeMap::new();
        for id in self.components.keys() {
            wirings.insert(id.clone(), self.wiring(id)?);
        }

        let SystemGraph {
            components: declared,
            connections,
            order,
            config,
            ..
        } = self;

        let mut components: BTreeMap<ComponentId, SystemComponent> = declared
            .into_iter()
            .map(|(id, d)| {
                let wiring = wirings.remove(&id).unwrap_or_default();
                let mut component =
                    SystemComponent::new(id.clone(), d.spec, d.behavior, wiring, config.socket.clone());
                if config.debug {
                    component.set_debug(true);
                }
                (id, component)
            })
            .collect();

        let brought_up = bring_up(&mut components, &config, pool.as_ref());

        if let Err(e) = brought_up {
            warn!("Bringing up the system failed, unbinding: {}", e);
            for component in components.values_mut() {
                component.unbind();
            }
            return Err(e);
        }

        debug!("All components bound, evaluation order {:?}", order.sequence);
        Ok(SystemEngine::new(components, connections, order, config, pool))
    }
}

fn bring_up(
    components: &mut BTreeMap<ComponentId, SystemComponent>,
    config: &GraphConfig,
    pool: Option<&rayon::ThreadPool>,
) -> SimResult<()> {
    // Every publisher must exist before the first subscriber connects
    for component in components.values_mut() {
        component.bind_outputs()?;
    }
    for_each_component(components, config.concurrency_mode, pool, |c| c.connect_inputs())?;
    for component in components.values_mut() {
        component.reset()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::flows::FlowTable;
    use serde_json::json;

    fn plant_and_controller() -> SystemBuilder {
        let mut builder = SystemBuilder::new();
        builder
            .add_component(
                "plant",
                ComponentSpec::continuous("plant")
                    .input_with_default("u", json!([0.0]))
                    .output("states"),
                FlowTable::new().flow("states", |ctx| Ok(ctx.state.clone())),
            )
            .unwrap();
        builder
            .add_component(
                "llc",
                ComponentSpec::discrete("llc", 50.0).input("states").output("u"),
                FlowTable::new().flow("u", |_| Ok(json!([0.0]))),
            )
            .unwrap();
        builder.connect("llc", "states", "plant", "states").unwrap();
        builder.connect("plant", "u", "llc", "u").unwrap();
        builder
    }

    #[test]
    fn test_build_resolves_ports_and_order() {
        let mut builder = plant_and_controller();
        builder.config(GraphConfig::new().with_base_port(7300));
        let graph = builder.build().unwrap();

        let llc = ComponentId::new("llc");
        let plant = ComponentId::new("plant");
        assert_eq!(graph.port_plan()[&llc.output("u")], 7300);
        assert_eq!(graph.port_plan()[&plant.output("states")], 7301);

        let wiring = graph.wiring(&llc).unwrap();
        assert_eq!(
            wiring.inputs,
            vec![("states".to_string(), InputPortDescriptor::new("127.0.0.1", 7301, "states"))]
        );
        assert_eq!(wiring.outputs, vec![OutputPortDescriptor::new(7300)]);
        let codecs: Vec<_> = wiring.input_codecs.iter().map(|c| c.name()).collect();
        assert_eq!(codecs, vec!["json"]);

        assert_eq!(graph.evaluation_order(), &[llc.clone(), plant.clone()]);
        assert_eq!(graph.feedback_edges().count(), 1);
    }

    #[test]
    fn test_wiring_uses_producer_codec() {
        struct Raw;
        impl Codec for Raw {
            fn serialize(&self, payload: &serde_json::Value) -> SimResult<Vec<u8>> {
                JsonCodec.serialize(payload)
            }
            fn deserialize(&self, bytes: &[u8]) -> SimResult<serde_json::Value> {
                JsonCodec.deserialize(bytes)
            }
            fn name(&self) -> &'static str {
                "raw"
            }
        }

        let mut builder = SystemBuilder::new();
        builder
            .add_component(
                "source",
                ComponentSpec::continuous("source").output("value").codec(Arc::new(Raw)),
                FlowTable::new(),
            )
            .unwrap();
        builder
            .add_component(
                "sink",
                ComponentSpec::continuous("sink").input("value"),
                FlowTable::new(),
            )
            .unwrap();
        builder.connect("sink", "value", "source", "value").unwrap();
        let graph = builder.build().unwrap();

        let wiring = graph.wiring(&ComponentId::new("sink")).unwrap();
        assert_eq!(wiring.input_codecs.len(), 1);
        assert_eq!(wiring.input_codecs[0].name(), "raw");
    }

    #[test]
    fn test_duplicate_component_and_connection() {
        let mut builder = plant_and_controller();
        assert!(matches!(
            builder.add_component("plant", ComponentSpec::continuous("plant"), FlowTable::new()),
            Err(SimError::DuplicateComponent(_))
        ));
        assert!(matches!(
            builder.connect("llc", "states", "plant", "states"),
            Err(SimError::DuplicateConnection { .. })
        ));
    }

    #[test]
    fn test_invalid_sampling_frequency() {
        let mut builder = SystemBuilder::new();
        builder
            .add_component("d", ComponentSpec::discrete("d", 0.0).output("o"), FlowTable::new())
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(SimError::InvalidSamplingFrequency { .. })
        ));
    }

    #[test]
    fn test_invalid_time_step() {
        let mut builder = plant_and_controller();
        builder.config(GraphConfig::new().with_time_step(0.0));
        assert!(matches!(builder.build(), Err(SimError::InvalidTimeStep(_))));
    }

    #[test]
    fn test_unknown_priority() {
        let mut builder = plant_and_controller();
        builder.priority(["autopilot"]);
        assert!(matches!(builder.build(), Err(SimError::InvalidPriority(_))));
    }

    #[test]
    fn test_bind_failure_releases_ports() {
        use std::net::TcpListener;

        // Occupy the port the plant output would get
        let blocker = TcpListener::bind(("0.0.0.0", 7321)).unwrap();
        let mut builder = plant_and_controller();
        builder.config(GraphConfig::new().with_base_port(7320));
        let err = builder.build().unwrap().bind().unwrap_err();
        assert!(matches!(err, SimError::Bind { port: 7321, .. }));
        drop(blocker);

        // The llc port was released again
        let rebind = TcpListener::bind(("0.0.0.0", 7320));
        assert!(rebind.is_ok());
    }
}
