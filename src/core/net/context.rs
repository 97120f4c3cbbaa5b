use crate::core::error::SimResult;
use crate::core::messages::Codec;
use crate::core::net::options::SocketOptions;
use crate::core::net::publisher::PubSocket;
use crate::core::net::subscriber::SubSocket;
use crate::core::types::InputPortDescriptor;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Messaging context exclusively owned by one node.
///
/// Holds every socket the node opened and the stop flag their background
/// threads watch. Dropping the context terminates it.
pub struct NetContext {
    owner: String,
    options: SocketOptions,
    stop: Arc<AtomicBool>,
    outputs: Vec<PubSocket>,
    inputs: Vec<SubSocket>,
    terminated: bool,
}

impl NetContext {
    pub fn new(owner: impl Into<String>, options: SocketOptions) -> Self {
        Self {
            owner: owner.into(),
            options,
            stop: Arc::new(AtomicBool::new(false)),
            outputs: Vec::new(),
            inputs: Vec::new(),
            terminated: false,
        }
    }

    pub fn options(&self) -> &SocketOptions {
        &self.options
    }

    /// Bind a publisher and return the port it actually listens on
    pub fn bind_publisher(&mut self, port: u16) -> SimResult<u16> {
        let socket = PubSocket::bind(port, Arc::clone(&self.stop), &self.options, &self.owner)?;
        let bound = socket.port();
        self.outputs.push(socket);
        Ok(bound)
    }

    pub fn connect_subscriber(
        &mut self,
        descriptor: InputPortDescriptor,
        codec: Arc<dyn Codec>,
        debug: bool,
    ) -> SimResult<()> {
        let index = self.inputs.len();
        let socket = SubSocket::connect(
            descriptor,
            index,
            codec,
            Arc::clone(&self.stop),
            &self.options,
            &self.owner,
            debug,
        )?;
        self.inputs.push(socket);
        Ok(())
    }

    pub fn outputs(&self) -> &[PubSocket] {
        &self.outputs
    }

    pub fn inputs(&self) -> &[SubSocket] {
        &self.inputs
    }

    /// Stop background threads, close every socket, release the ports
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.stop.store(true, Ordering::Release);
        for socket in &mut self.inputs {
            socket.close();
        }
        for socket in &mut self.outputs {
            socket.close();
        }
        debug!(
            "Component '{}' terminated context ({} inputs, {} outputs)",
            self.owner,
            self.inputs.len(),
            self.outputs.len()
        );
        self.inputs.clear();
        self.outputs.clear();
    }
}

impl Drop for NetContext {
    fn drop(&mut self) {
        self.terminate();
    }
}
