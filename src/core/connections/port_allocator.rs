use crate::core::components::spec::ComponentSpec;
use crate::core::error::{SimError, SimResult};
use crate::core::types::{ComponentId, OutputPort};
use std::collections::BTreeMap;

/// Bind port of every output in a graph
pub type PortPlan = BTreeMap<OutputPort, u16>;

/// Deterministic sequential port allocation.
///
/// Components are visited in id order and outputs in declaration order, so the
/// same declaration always produces the same plan.
#[derive(Debug, Clone, Copy)]
pub struct PortAllocator {
    base_port: u16,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self { base_port }
    }

    pub fn allocate(&self, components: &BTreeMap<ComponentId, ComponentSpec>) -> SimResult<PortPlan> {
        let needed: usize = components.values().map(|spec| spec.outputs.len()).sum();
        let last = self.base_port as usize + needed;
        if self.base_port == 0 || (needed > 0 && last - 1 > u16::MAX as usize) {
            return Err(SimError::PortRange {
                base: self.base_port,
                needed,
            });
        }

        let mut plan = PortPlan::new();
        let mut next = self.base_port;
        for (id, spec) in components {
            for port in &spec.outputs {
                plan.insert(id.output(port), next);
                next = next.wrapping_add(1);
            }
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> BTreeMap<ComponentId, ComponentSpec> {
        let mut components = BTreeMap::new();
        components.insert(
            ComponentId::new("plant"),
            ComponentSpec::continuous("plant").output("states").output("outputs"),
        );
        components.insert(
            ComponentId::new("llc"),
            ComponentSpec::discrete("llc", 100.0).output("outputs"),
        );
        components
    }

    #[test]
    fn test_sequential_in_id_then_declaration_order() {
        let plan = PortAllocator::new(5000).allocate(&components()).unwrap();
        let llc = ComponentId::new("llc");
        let plant = ComponentId::new("plant");
        assert_eq!(plan[&llc.output("outputs")], 5000);
        assert_eq!(plan[&plant.output("states")], 5001);
        assert_eq!(plan[&plant.output("outputs")], 5002);
    }

    #[test]
    fn test_range_overflow_is_rejected() {
        assert!(matches!(
            PortAllocator::new(u16::MAX - 1).allocate(&components()),
            Err(SimError::PortRange { needed: 3, .. })
        ));
        assert!(PortAllocator::new(u16::MAX - 2).allocate(&components()).is_ok());
        assert!(PortAllocator::new(0).allocate(&components()).is_err());
    }
}
