use crate::core::error::{SimError, SimResult};
use crate::core::messages::{encode_frame, FrameDecoder};
use crate::core::net::options::{sleep_unless_stopped, SocketOptions};
use crate::core::net::{ACK_MARKER, SUB_MARKER};
use log::{debug, warn};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// A subscriber that completed the handshake
struct Peer {
    stream: TcpStream,
    addr: SocketAddr,
    topic: String,
}

type PeerList = Arc<Mutex<Vec<Peer>>>;

fn lock_peers(peers: &PeerList) -> MutexGuard<'_, Vec<Peer>> {
    peers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publish side of an output port.
///
/// Binds `0.0.0.0:port` and runs an accept thread that registers every
/// subscriber after its subscription handshake. Sends are synchronous and
/// fire-and-forget: peers that fail or stall are dropped.
pub struct PubSocket {
    port: u16,
    peers: PeerList,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl PubSocket {
    pub fn bind(
        port: u16,
        stop: Arc<AtomicBool>,
        options: &SocketOptions,
        owner: &str,
    ) -> SimResult<Self> {
        let listener =
            TcpListener::bind(("0.0.0.0", port)).map_err(|source| SimError::Bind { port, source })?;
        let port = listener.local_addr()?.port();
        listener.set_nonblocking(true)?;

        let peers: PeerList = Arc::new(Mutex::new(Vec::new()));
        let accept_peers = Arc::clone(&peers);
        let accept_stop = Arc::clone(&stop);
        let options = options.clone();
        let owner = owner.to_string();
        let accept_thread = thread::Builder::new()
            .name(format!("{}-pub-{}", owner, port))
            .spawn(move || accept_loop(listener, accept_peers, accept_stop, options, owner))?;

        Ok(Self {
            port,
            peers,
            stop,
            accept_thread: Some(accept_thread),
        })
    }

    /// Port actually bound (differs from the requested one when it was 0)
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn subscriber_count(&self) -> usize {
        lock_peers(&self.peers).len()
    }

    /// Send `parts` to every subscriber whose subscription matches `topic`.
    /// Returns the number of subscribers the message was written to.
    pub fn send(&self, topic: &str, parts: &[Vec<u8>]) -> SimResult<usize> {
        let frame = encode_frame(parts)?;
        let mut delivered = 0;
        lock_peers(&self.peers).retain_mut(|peer| {
            let wanted = peer.topic.is_empty() || (!topic.is_empty() && peer.topic == topic);
            if !wanted {
                return true;
            }
            match peer.stream.write_all(&frame) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    debug!("Dropping subscriber {} on port {}: {}", peer.addr, self.port, e);
                    false
                }
            }
        });
        Ok(delivered)
    }

    /// Stop accepting and disconnect every subscriber.
    /// Raises the shared stop flag, so it is only called on teardown.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                warn!("Accept thread for port {} panicked", self.port);
            }
        }
        for peer in lock_peers(&self.peers).drain(..) {
            let _ = peer.stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for PubSocket {
    fn drop(&mut self) {
        self.close();
    }
}

fn accept_loop(
    listener: TcpListener,
    peers: PeerList,
    stop: Arc<AtomicBool>,
    options: SocketOptions,
    owner: String,
) {
    while !stop.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, addr)) => match handshake(stream, addr, &peers, &options) {
                Ok(topic) => debug!(
                    "Component '{}' accepted subscriber {} for topic '{}'",
                    owner, addr, topic
                ),
                Err(e) => debug!("Component '{}' rejected subscriber {}: {}", owner, addr, e),
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                sleep_unless_stopped(&stop, options.poll_interval, options.poll_interval);
            }
            Err(e) => {
                warn!("Component '{}' accept failed: {}", owner, e);
                sleep_unless_stopped(&stop, options.poll_interval, options.poll_interval);
            }
        }
    }
}

/// Read the subscription frame, register the peer, then acknowledge.
///
/// The ACK is written while the peer list is locked so it always precedes
/// the first data frame on the stream.
fn handshake(
    mut stream: TcpStream,
    addr: SocketAddr,
    peers: &PeerList,
    options: &SocketOptions,
) -> SimResult<String> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(options.poll_interval))?;

    let deadline = Instant::now() + options.handshake_timeout;
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 1024];
    let parts = loop {
        if let Some(parts) = decoder.next_frame()? {
            break parts;
        }
        if Instant::now() >= deadline {
            return Err(SimError::Frame("subscription handshake timed out".to_string()));
        }
        match stream.read(&mut buf) {
            Ok(0) => return Err(SimError::Frame("peer closed during handshake".to_string())),
            Ok(n) => decoder.push(&buf[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => return Err(e.into()),
        }
    };

    let topic = match parts.as_slice() {
        [marker, topic] if marker.as_slice() == SUB_MARKER => String::from_utf8(topic.clone())
            .map_err(|e| SimError::Frame(format!("subscription topic is not utf-8: {}", e)))?,
        _ => return Err(SimError::Frame("expected subscription frame".to_string())),
    };

    stream.set_read_timeout(None)?;
    stream.set_write_timeout(Some(options.write_timeout))?;

    let mut peers = lock_peers(peers);
    stream.write_all(&encode_frame(&[ACK_MARKER])?)?;
    peers.push(Peer {
        stream,
        addr,
        topic: topic.clone(),
    });
    Ok(topic)
}
