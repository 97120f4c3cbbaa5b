pub mod system_builder;

pub use system_builder::{SystemBuilder, SystemGraph};
