//! TCP publish/subscribe transport.
//!
//! Each output port is a [`PubSocket`] bound on `0.0.0.0:port`; each input
//! port is a [`SubSocket`] whose listener thread conflates matching messages
//! into a single-slot [`Mailbox`].
//!
//! A subscriber opens every connection with a `[SUB, topic]` frame and the
//! publisher answers `[ACK]` once the subscriber will receive data, which
//! lets `connect_input` wait for real readiness instead of sleeping.

pub mod context;
pub mod mailbox;
pub mod options;
pub mod publisher;
pub mod subscriber;

pub use context::NetContext;
pub use mailbox::Mailbox;
pub use options::SocketOptions;
pub use publisher::PubSocket;
pub use subscriber::SubSocket;

pub(crate) const SUB_MARKER: &[u8] = b"SUB";
pub(crate) const ACK_MARKER: &[u8] = b"ACK";
