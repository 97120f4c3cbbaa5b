use crate::core::error::{SimError, SimResult};
use crate::core::messages::{encode_frame, Codec, Envelope, FrameDecoder};
use crate::core::net::mailbox::Mailbox;
use crate::core::net::options::{sleep_unless_stopped, SocketOptions};
use crate::core::net::{ACK_MARKER, SUB_MARKER};
use crate::core::types::InputPortDescriptor;
use log::{debug, warn};
use rand::Rng;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Subscribe side of an input port.
///
/// A background thread keeps a connection to the publisher alive and stores
/// every message matching the topic in the port's [`Mailbox`].
pub struct SubSocket {
    descriptor: InputPortDescriptor,
    mailbox: Arc<Mailbox>,
    stop: Arc<AtomicBool>,
    /// Clone of the live stream so `close` can unblock the listener
    live: Arc<Mutex<Option<TcpStream>>>,
    listener: Option<JoinHandle<()>>,
}

/// Everything the listener thread needs
struct Listener {
    descriptor: InputPortDescriptor,
    index: usize,
    mailbox: Arc<Mailbox>,
    codec: Arc<dyn Codec>,
    stop: Arc<AtomicBool>,
    live: Arc<Mutex<Option<TcpStream>>>,
    options: SocketOptions,
    owner: String,
    debug: bool,
}

impl SubSocket {
    pub fn connect(
        descriptor: InputPortDescriptor,
        index: usize,
        codec: Arc<dyn Codec>,
        stop: Arc<AtomicBool>,
        options: &SocketOptions,
        owner: &str,
        debug: bool,
    ) -> SimResult<Self> {
        let mailbox = Arc::new(Mailbox::new());
        let live = Arc::new(Mutex::new(None));
        let listener = Listener {
            descriptor: descriptor.clone(),
            index,
            mailbox: Arc::clone(&mailbox),
            codec,
            stop: Arc::clone(&stop),
            live: Arc::clone(&live),
            options: options.clone(),
            owner: owner.to_string(),
            debug,
        };
        let handle = thread::Builder::new()
            .name(format!("{}-sub-{}", owner, index))
            .spawn(move || listener.run())?;

        Ok(Self {
            descriptor,
            mailbox,
            stop,
            live,
            listener: Some(handle),
        })
    }

    pub fn descriptor(&self) -> &InputPortDescriptor {
        &self.descriptor
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// Raises the shared stop flag, so it is only called on teardown.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(stream) = self.live.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                warn!("Listener for {} panicked", self.descriptor.address());
            }
        }
        self.mailbox.set_ready(false);
    }
}

impl Drop for SubSocket {
    fn drop(&mut self) {
        self.close();
    }
}

impl Listener {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn run(self) {
        let mut backoff = self.options.connect_backoff_initial;
        while !self.stopped() {
            match self.open() {
                Ok(stream) => {
                    backoff = self.options.connect_backoff_initial;
                    if let Err(e) = self.session(stream) {
                        debug!(
                            "Component '{}' input {} lost {}: {}",
                            self.owner,
                            self.index,
                            self.descriptor.address(),
                            e
                        );
                    }
                    self.mailbox.set_ready(false);
                    self.live.lock().unwrap_or_else(PoisonError::into_inner).take();
                }
                Err(e) => {
                    // Publisher not up yet: retry with jittered exponential backoff
                    let jitter = rand::thread_rng().gen_range(0.5..1.5);
                    let delay = backoff.mul_f64(jitter);
                    if self.debug {
                        debug!(
                            "Component '{}' input {} waiting for {} ({}), retry in {:?}",
                            self.owner,
                            self.index,
                            self.descriptor.address(),
                            e,
                            delay
                        );
                    }
                    if !sleep_unless_stopped(&self.stop, delay, self.options.poll_interval) {
                        break;
                    }
                    backoff = next_backoff(backoff, self.options.connect_backoff_max);
                }
            }
        }
    }

    fn open(&self) -> SimResult<TcpStream> {
        let addrs: Vec<SocketAddr> = (self.descriptor.host.as_str(), self.descriptor.port)
            .to_socket_addrs()?
            .collect();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.options.handshake_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .map(SimError::Io)
            .unwrap_or_else(|| SimError::Frame(format!("no address for {}", self.descriptor.address()))))
    }

    /// Subscribe, then read frames until the peer goes away or we are stopped
    fn session(&self, mut stream: TcpStream) -> SimResult<()> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.options.poll_interval))?;
        stream.write_all(&encode_frame(&[SUB_MARKER, self.descriptor.topic.as_bytes()])?)?;
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = Some(stream.try_clone()?);

        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; 64 * 1024];
        while !self.stopped() {
            match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => {
                    decoder.push(&buf[..n]);
                    while let Some(parts) = decoder.next_frame()? {
                        self.deliver(parts)?;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn deliver(&self, parts: Vec<Vec<u8>>) -> SimResult<()> {
        // The publisher acknowledges before it forwards any data
        if !self.mailbox.is_ready() && parts.len() == 1 && parts[0].as_slice() == ACK_MARKER {
            self.mailbox.set_ready(true);
            return Ok(());
        }

        let envelope = match Envelope::from_parts(&parts, self.codec.as_ref()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    "Component '{}' input {} dropped a message it cannot decode with codec '{}': {}",
                    self.owner,
                    self.index,
                    self.codec.name(),
                    e
                );
                return Ok(());
            }
        };
        if !envelope.matches(&self.descriptor.topic) {
            return Ok(());
        }
        if self.debug {
            debug!(
                "Component '{}' Socket {} Receiving {} Topic '{}'",
                self.owner,
                self.index,
                self.mailbox.generation(),
                envelope.topic
            );
        }
        self.mailbox.store(envelope.payload);
        Ok(())
    }
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}
