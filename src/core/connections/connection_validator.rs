use crate::core::components::spec::ComponentSpec;
use crate::core::connections::manager::ConnectionMap;
use crate::core::connections::port_validator::PortValidator;
use crate::core::error::{SimError, SimResult};
use crate::core::types::ComponentId;
use std::collections::BTreeMap;

/// Whole-graph connection checks, run before any socket exists
pub struct ConnectionValidator;

impl ConnectionValidator {
    /// Validate a connection map against the declared components:
    /// both ends must exist, and every input must be driven or have a default.
    pub fn validate(
        components: &BTreeMap<ComponentId, ComponentSpec>,
        connections: &ConnectionMap,
    ) -> SimResult<()> {
        for (id, spec) in components {
            PortValidator::validate_declaration(id, spec)?;
        }

        for (input, output) in connections.iter() {
            let producer = components
                .get(output.component_id())
                .ok_or_else(|| SimError::UnknownComponent(output.component_id().to_string()))?;
            PortValidator::validate_source_port(output.component_id(), producer, output.port_name())?;

            let consumer = components
                .get(input.component_id())
                .ok_or_else(|| SimError::UnknownComponent(input.component_id().to_string()))?;
            PortValidator::validate_target_port(input.component_id(), consumer, input.port_name())?;
        }

        for (id, spec) in components {
            for port in &spec.inputs {
                if !connections.is_connected(&id.input(port)) && spec.default_for(port).is_none() {
                    return Err(SimError::UnconnectedInput {
                        component: id.to_string(),
                        port: port.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn components() -> BTreeMap<ComponentId, ComponentSpec> {
        let mut components = BTreeMap::new();
        components.insert(
            ComponentId::new("producer"),
            ComponentSpec::continuous("producer").output("o"),
        );
        components.insert(
            ComponentId::new("consumer"),
            ComponentSpec::discrete("consumer", 10.0)
                .input("i")
                .input_with_default("bias", json!(0.0)),
        );
        components
    }

    #[test]
    fn test_valid_map_with_default_input() {
        let mut map = ConnectionMap::new();
        map.add(
            ComponentId::new("consumer").input("i"),
            ComponentId::new("producer").output("o"),
        )
        .unwrap();
        ConnectionValidator::validate(&components(), &map).unwrap();
    }

    #[test]
    fn test_missing_entry_is_rejected() {
        let err = ConnectionValidator::validate(&components(), &ConnectionMap::new()).unwrap_err();
        assert!(matches!(
            err,
            SimError::UnconnectedInput { ref component, ref port } if component == "consumer" && port == "i"
        ));
    }

    #[test]
    fn test_unknown_component_and_ports_are_rejected() {
        let mut map = ConnectionMap::new();
        map.add(
            ComponentId::new("consumer").input("i"),
            ComponentId::new("ghost").output("o"),
        )
        .unwrap();
        assert!(matches!(
            ConnectionValidator::validate(&components(), &map),
            Err(SimError::UnknownComponent(ref id)) if id == "ghost"
        ));

        let mut map = ConnectionMap::new();
        map.add(
            ComponentId::new("consumer").input("i"),
            ComponentId::new("producer").output("nope"),
        )
        .unwrap();
        assert!(matches!(
            ConnectionValidator::validate(&components(), &map),
            Err(SimError::UnknownPort { side: "output", .. })
        ));

        let mut map = ConnectionMap::new();
        map.add(
            ComponentId::new("consumer").input("nope"),
            ComponentId::new("producer").output("o"),
        )
        .unwrap();
        assert!(matches!(
            ConnectionValidator::validate(&components(), &map),
            Err(SimError::UnknownPort { side: "input", .. })
        ));
    }

    #[test]
    fn test_duplicate_port_declaration_is_rejected() {
        let mut components = components();
        components.insert(
            ComponentId::new("twice"),
            ComponentSpec::continuous("twice").output("o").output("o"),
        );
        let mut map = ConnectionMap::new();
        map.add(
            ComponentId::new("consumer").input("i"),
            ComponentId::new("producer").output("o"),
        )
        .unwrap();
        assert!(ConnectionValidator::validate(&components, &map).is_err());
    }
}
