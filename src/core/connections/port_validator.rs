use crate::core::components::spec::ComponentSpec;
use crate::core::error::{SimError, SimResult};
use crate::core::types::{ComponentId, PortType};

/// Port validation utilities for component declarations
pub struct PortValidator;

impl PortValidator {
    /// Validate that a component declares the specified output port
    pub fn validate_source_port(id: &ComponentId, spec: &ComponentSpec, port: &str) -> SimResult<()> {
        if spec.has_output(port) {
            return Ok(());
        }
        Err(Self::unknown(id, PortType::Output, port))
    }

    /// Validate that a component declares the specified input port
    pub fn validate_target_port(id: &ComponentId, spec: &ComponentSpec, port: &str) -> SimResult<()> {
        if spec.has_input(port) {
            return Ok(());
        }
        Err(Self::unknown(id, PortType::Input, port))
    }

    /// Port names must be unique per side and non-empty; output names double
    /// as topics
    pub fn validate_declaration(id: &ComponentId, spec: &ComponentSpec) -> SimResult<()> {
        for (side, ports) in [(PortType::Input, &spec.inputs), (PortType::Output, &spec.outputs)] {
            for (idx, port) in ports.iter().enumerate() {
                if port.is_empty() || ports[..idx].contains(port) {
                    return Err(SimError::UnknownPort {
                        component: id.to_string(),
                        side: side.as_str(),
                        port: format!("{port:?} (empty or declared twice)"),
                    });
                }
            }
        }
        Ok(())
    }

    fn unknown(id: &ComponentId, side: PortType, port: &str) -> SimError {
        SimError::UnknownPort {
            component: id.to_string(),
            side: side.as_str(),
            port: port.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_and_target_ports() {
        let id = ComponentId::new("llc");
        let spec = ComponentSpec::discrete("llc", 100.0).input("states").output("u");

        assert!(PortValidator::validate_source_port(&id, &spec, "u").is_ok());
        assert!(PortValidator::validate_target_port(&id, &spec, "states").is_ok());

        let err = PortValidator::validate_source_port(&id, &spec, "states").unwrap_err();
        assert!(matches!(err, SimError::UnknownPort { side: "output", .. }));
        let err = PortValidator::validate_target_port(&id, &spec, "u").unwrap_err();
        assert!(err.to_string().contains("no input port 'u'"));
    }

    #[test]
    fn test_declaration_rejects_repeated_and_empty_names() {
        let id = ComponentId::new("plant");
        assert!(PortValidator::validate_declaration(&id, &ComponentSpec::continuous("p").output("y")).is_ok());
        assert!(PortValidator::validate_declaration(&id, &ComponentSpec::continuous("p").output("y").output("y")).is_err());
        assert!(PortValidator::validate_declaration(&id, &ComponentSpec::continuous("p").input("")).is_err());
    }
}
