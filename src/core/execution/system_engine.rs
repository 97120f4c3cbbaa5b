use crate::core::components::system_component::SystemComponent;
use crate::core::components::traits::Component;
use crate::core::connections::ConnectionMap;
use crate::core::error::{SimError, SimResult};
use crate::core::execution::clock::{Sampler, TickClock};
use crate::core::execution::config::{ConcurrencyMode, DeliveryMode, GraphConfig};
use crate::core::execution::execution_order::ExecutionOrder;
use crate::core::execution::trace::{Trace, TraceEntry};
use crate::core::types::{ComponentId, InputPort};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;

/// Generation each consumer input had right before its producer ran in the
/// current tick
type FreshMarks = BTreeMap<InputPort, u64>;

/// Thread pool for the Rayon mode; `None` falls back to the global pool
pub(crate) fn build_pool(config: &GraphConfig) -> SimResult<Option<rayon::ThreadPool>> {
    match (config.concurrency_mode, config.thread_pool_size) {
        (ConcurrencyMode::Rayon, Some(size)) => Ok(Some(
            rayon::ThreadPoolBuilder::new().num_threads(size).build()?,
        )),
        _ => Ok(None),
    }
}

/// Run `f` over every component, in parallel in Rayon mode
pub(crate) fn for_each_component<F>(
    components: &mut BTreeMap<ComponentId, SystemComponent>,
    mode: ConcurrencyMode,
    pool: Option<&rayon::ThreadPool>,
    f: F,
) -> SimResult<()>
where
    F: Fn(&mut SystemComponent) -> SimResult<()> + Sync + Send,
{
    match mode {
        ConcurrencyMode::Sequential => components.values_mut().try_for_each(f),
        ConcurrencyMode::Rayon => {
            let mut run = || components.par_iter_mut().try_for_each(|(_, c)| f(c));
            match pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        }
    }
}

/// Drives a bound system graph tick by tick.
///
/// Within a tick every due component reads its latest inputs, evaluates and
/// publishes, in evaluation order. Values travel over the sockets, so a
/// consumer sees a producer's output of the same tick only if it arrived in
/// time (see [`DeliveryMode`]).
pub struct SystemEngine {
    components: BTreeMap<ComponentId, SystemComponent>,
    samplers: BTreeMap<ComponentId, Sampler>,
    connections: ConnectionMap,
    order: ExecutionOrder,
    config: GraphConfig,
    pool: Option<rayon::ThreadPool>,
    clock: TickClock,
    trace: Trace,
    shut_down: bool,
}

impl SystemEngine {
    pub(crate) fn new(
        components: BTreeMap<ComponentId, SystemComponent>,
        connections: ConnectionMap,
        order: ExecutionOrder,
        config: GraphConfig,
        pool: Option<rayon::ThreadPool>,
    ) -> Self {
        let samplers = components
            .iter()
            .map(|(id, c)| (id.clone(), Sampler::new(&c.spec().kind)))
            .collect();
        let clock = TickClock::new(config.time_step);
        Self {
            components,
            samplers,
            connections,
            order,
            config,
            pool,
            clock,
            trace: Trace::new(),
            shut_down: false,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn tick_count(&self) -> u64 {
        self.clock.tick()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn evaluation_order(&self) -> &[ComponentId] {
        &self.order.sequence
    }

    pub fn component(&self, id: &ComponentId) -> Option<&SystemComponent> {
        self.components.get(id)
    }

    pub fn component_mut(&mut self, id: &ComponentId) -> Option<&mut SystemComponent> {
        self.components.get_mut(id)
    }

    pub fn components(&self) -> impl Iterator<Item = (&ComponentId, &SystemComponent)> {
        self.components.iter()
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Value component `id` currently sees on input `port`
    pub fn observed_input(&self, id: &ComponentId, port: &str) -> Option<&Value> {
        self.components.get(id)?.observed_input(port)
    }

    /// Outputs computed by the last evaluation of `id`
    pub fn outputs(&self, id: &ComponentId) -> Option<&BTreeMap<String, Value>> {
        self.components.get(id).map(|c| c.outputs())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn ensure_running(&self) -> SimResult<()> {
        if self.shut_down {
            return Err(SimError::NotInitialized("system engine".to_string()));
        }
        Ok(())
    }

    /// Before `producer` runs, remember what its consumers have received
    fn mark_downstream(&self, producer: &ComponentId, marks: &mut FreshMarks) -> SimResult<()> {
        if !matches!(self.config.delivery_mode, DeliveryMode::AwaitFresh { .. }) {
            return Ok(());
        }
        for (input, output) in self.connections.iter() {
            let consumer = input.component_id();
            if output.component_id() != producer || consumer == producer {
                continue;
            }
            if let Some(component) = self.components.get(consumer) {
                marks.insert(input.clone(), component.input_generation(input.port_name())?);
            }
        }
        Ok(())
    }

    /// Before `id` reads its inputs, wait for values its upstream components
    /// published earlier in this tick
    fn await_upstream(&self, id: &ComponentId, marks: &FreshMarks) -> SimResult<()> {
        let DeliveryMode::AwaitFresh { timeout } = self.config.delivery_mode else {
            return Ok(());
        };
        let Some(component) = self.components.get(id) else {
            return Ok(());
        };
        for (input, output) in self.connections.inputs_of(id) {
            let Some(&mark) = marks.get(input) else {
                continue;
            };
            if !component.await_input_after(input.port_name(), mark, timeout)? {
                debug!(
                    "No fresh value on {} from {} within {:?}, using last known",
                    input, output, timeout
                );
            }
        }
        Ok(())
    }

    /// Evaluate every due component once and advance the clock.
    /// Returns the time of the tick that ran.
    pub fn step(&mut self) -> SimResult<f64> {
        self.ensure_running()?;
        let time = self.clock.time();
        let mut marks = FreshMarks::new();

        for idx in 0..self.order.sequence.len() {
            let id = self.order.sequence[idx].clone();
            let due = self
                .samplers
                .get_mut(&id)
                .map_or(false, |sampler| sampler.is_due(time));
            if !due {
                continue;
            }

            self.await_upstream(&id, &marks)?;
            self.mark_downstream(&id, &mut marks)?;

            let Some(component) = self.components.get_mut(&id) else {
                continue;
            };
            component.tick(time)?;

            if self.config.record_trace {
                let entry = TraceEntry {
                    time,
                    outputs: component.outputs().clone(),
                    state: component.state().clone(),
                };
                self.trace.record(&id, entry);
            }
        }

        self.clock.advance();
        Ok(time)
    }

    /// Run `steps` ticks
    pub fn run(&mut self, steps: u64) -> SimResult<f64> {
        let mut last = self.time();
        for _ in 0..steps {
            last = self.step()?;
        }
        Ok(last)
    }

    /// Run ticks while the clock is at or before `t_end`
    pub fn run_until(&mut self, t_end: f64) -> SimResult<u64> {
        let step = self.clock.time_step();
        let mut ticks = 0;
        while self.time() <= t_end + step * 1e-6 {
            self.step()?;
            ticks += 1;
        }
        Ok(ticks)
    }

    /// Rewind the clock and restore every component to its initial state.
    /// Sockets stay bound.
    pub fn reset(&mut self) -> SimResult<()> {
        self.ensure_running()?;
        for component in self.components.values_mut() {
            component.reset()?;
        }
        for sampler in self.samplers.values_mut() {
            sampler.reset();
        }
        self.clock.rewind();
        self.trace.clear();
        info!("System reset");
        Ok(())
    }

    /// Unbind every component. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        let result = for_each_component(
            &mut self.components,
            self.config.concurrency_mode,
            self.pool.as_ref(),
            |component| {
                component.unbind();
                Ok(())
            },
        );
        if let Err(e) = result {
            warn!("Error during shutdown: {}", e);
        }
        self.shut_down = true;
        info!("System shut down at t={:.6}", self.time());
    }
}

impl Drop for SystemEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SystemEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemEngine")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("order", &self.order.sequence)
            .field("time", &self.time())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
