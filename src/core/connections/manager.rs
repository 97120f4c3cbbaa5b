use crate::core::error::{SimError, SimResult};
use crate::core::types::{ComponentId, InputPort, OutputPort};
use std::collections::{BTreeMap, BTreeSet};

/// Connection map of a system graph: consumer input -> producer output.
///
/// Keyed by the consumer side, so an input can never have two drivers. An
/// output may feed any number of inputs.
#[derive(Debug, Clone, Default)]
pub struct ConnectionMap {
    entries: BTreeMap<InputPort, OutputPort>,
}

impl ConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; fails if `consumer` is already driven
    pub fn add(&mut self, consumer: InputPort, producer: OutputPort) -> SimResult<()> {
        if self.entries.contains_key(&consumer) {
            return Err(SimError::DuplicateConnection {
                component: consumer.component_id().to_string(),
                port: consumer.port_name().to_string(),
            });
        }
        self.entries.insert(consumer, producer);
        Ok(())
    }

    pub fn producer_of(&self, consumer: &InputPort) -> Option<&OutputPort> {
        self.entries.get(consumer)
    }

    pub fn is_connected(&self, consumer: &InputPort) -> bool {
        self.entries.contains_key(consumer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InputPort, &OutputPort)> {
        self.entries.iter()
    }

    /// Connections feeding `component`, in input-port name order
    pub fn inputs_of<'a>(
        &'a self,
        component: &'a ComponentId,
    ) -> impl Iterator<Item = (&'a InputPort, &'a OutputPort)> + 'a {
        self.entries
            .iter()
            .filter(move |(input, _)| input.component_id() == component)
    }

    /// Distinct producer -> consumer component edges
    pub fn dependency_edges(&self) -> BTreeSet<(ComponentId, ComponentId)> {
        self.entries
            .iter()
            .map(|(input, output)| (output.component_id().clone(), input.component_id().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        let producers: BTreeSet<&OutputPort> = self.entries.values().collect();
        let consumers: BTreeSet<&ComponentId> =
            self.entries.keys().map(|input| input.component_id()).collect();
        ConnectionStats {
            connections: self.entries.len(),
            producer_ports: producers.len(),
            consumer_components: consumers.len(),
        }
    }
}

/// Connection statistics for debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    pub connections: usize,
    pub producer_ports: usize,
    pub consumer_components: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_mapped_input_is_rejected() {
        let plant = ComponentId::new("plant");
        let llc = ComponentId::new("llc");
        let autopilot = ComponentId::new("autopilot");

        let mut map = ConnectionMap::new();
        map.add(llc.input("inputs_coutputs"), autopilot.output("outputs"))
            .unwrap();
        let err = map
            .add(llc.input("inputs_coutputs"), plant.output("outputs"))
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateConnection { .. }));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_fan_out_and_edges() {
        let plant = ComponentId::new("plant");
        let llc = ComponentId::new("llc");
        let monitor = ComponentId::new("monitor");

        let mut map = ConnectionMap::new();
        map.add(llc.input("inputs_pstates"), plant.output("states")).unwrap();
        map.add(llc.input("inputs_poutputs"), plant.output("outputs")).unwrap();
        map.add(monitor.input("inputs_pstates"), plant.output("states")).unwrap();
        map.add(plant.input("inputs"), llc.output("outputs")).unwrap();

        let edges = map.dependency_edges();
        assert_eq!(edges.len(), 3);
        assert!(edges.contains(&(plant.clone(), llc.clone())));
        assert!(edges.contains(&(llc.clone(), plant.clone())));
        assert!(edges.contains(&(plant.clone(), monitor.clone())));

        assert_eq!(map.inputs_of(&llc).count(), 2);
        assert_eq!(
            map.stats(),
            ConnectionStats {
                connections: 4,
                producer_ports: 3,
                consumer_components: 3,
            }
        );
    }
}
