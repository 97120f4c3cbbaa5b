//! Component simulation over a publish/subscribe transport.
//!
//! Components exchange JSON values through TCP pub/sub sockets with
//! latest-value-only inputs. A [`SystemBuilder`] declares components and their
//! connections, resolves ports and evaluation order, and binds the graph into
//! a [`SystemEngine`] that steps continuous and discrete components on a
//! shared clock.

pub mod core;
pub mod rpc;

// Re-export commonly used types
pub use crate::core::builder::{SystemBuilder, SystemGraph};
pub use crate::core::components::{Behavior, Component, ComponentSpec, FlowTable, PubSubNode};
pub use crate::core::error::{BehaviorError, SimError, SimResult};
pub use crate::core::execution::{ConcurrencyMode, DeliveryMode, GraphConfig, SystemEngine};
pub use crate::core::types::ComponentId;
