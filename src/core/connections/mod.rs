pub mod connection_validator;
pub mod manager;
pub mod port_allocator;
pub mod port_validator;

pub use connection_validator::ConnectionValidator;
pub use manager::{ConnectionMap, ConnectionStats};
pub use port_allocator::{PortAllocator, PortPlan};
pub use port_validator::PortValidator;
