pub mod builder;
pub mod components;
pub mod connections;
pub mod error;
pub mod execution;
pub mod messages;
pub mod net;
pub mod types;
