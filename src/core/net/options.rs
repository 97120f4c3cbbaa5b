use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Timing knobs shared by every socket a node owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketOptions {
    /// How long `connect_input` waits for all subscriptions to be acknowledged
    pub settle_timeout: Duration,
    /// First delay between subscriber connection attempts
    pub connect_backoff_initial: Duration,
    /// Upper bound for the subscriber reconnect delay
    pub connect_backoff_max: Duration,
    /// A subscriber that cannot take a message within this time is dropped
    pub write_timeout: Duration,
    /// Granularity at which background threads check the stop flag
    pub poll_interval: Duration,
    /// Time a publisher allows a new subscriber to send its subscription
    pub handshake_timeout: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_millis(200),
            connect_backoff_initial: Duration::from_millis(10),
            connect_backoff_max: Duration::from_millis(500),
            write_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(20),
            handshake_timeout: Duration::from_secs(1),
        }
    }
}

/// Sleep for `total`, waking early once `stop` is set.
/// Returns false if the stop flag interrupted the sleep.
pub(crate) fn sleep_unless_stopped(stop: &AtomicBool, total: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(poll.min(deadline - now));
    }
}
