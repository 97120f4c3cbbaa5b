pub mod clock;
pub mod config;
pub mod execution_order;
pub mod system_engine;
pub mod trace;

pub use clock::{Sampler, TickClock};
pub use config::{ConcurrencyMode, DeliveryMode, GraphConfig};
pub use execution_order::{ExecutionOrder, ExecutionOrderBuilder};
pub use system_engine::SystemEngine;
pub use trace::{Trace, TraceEntry};
