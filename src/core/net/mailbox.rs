use serde_json::Value;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Slot {
    value: Option<Value>,
    generation: u64,
    ready: bool,
}

/// Single-slot, overwrite-on-write mailbox for one input port.
///
/// The listener thread stores every matching message; readers only ever see
/// the most recent one. `generation` counts stores and never goes backwards.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panicking listener leaves the slot in a valid state
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the slot with `value`
    pub fn store(&self, value: Value) {
        let mut slot = self.lock();
        slot.value = Some(value);
        slot.generation += 1;
        drop(slot);
        self.changed.notify_all();
    }

    pub fn latest(&self) -> Option<Value> {
        self.lock().value.clone()
    }

    pub fn latest_with_generation(&self) -> (Option<Value>, u64) {
        let slot = self.lock();
        (slot.value.clone(), slot.generation)
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Block until a value newer than `after` arrives or `timeout` elapses.
    /// Returns true when a newer value is available.
    pub fn wait_for_update(&self, after: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        while slot.generation <= after {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            slot = self
                .changed
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Record whether the subscription is currently acknowledged by a publisher
    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
        self.changed.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    /// Block until the subscription is acknowledged or `deadline` passes
    pub fn wait_ready(&self, deadline: Instant) -> bool {
        let mut slot = self.lock();
        while !slot.ready {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            slot = self
                .changed
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_store_overwrites_previous_value() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.latest(), None);

        mailbox.store(json!(1));
        mailbox.store(json!(2));
        mailbox.store(json!(3));

        assert_eq!(mailbox.latest_with_generation(), (Some(json!(3)), 3));
    }

    #[test]
    fn test_wait_for_update_wakes_on_store() {
        let mailbox = Arc::new(Mailbox::new());
        let writer = Arc::clone(&mailbox);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.store(json!({"x": 1.0}));
        });

        assert!(mailbox.wait_for_update(0, Duration::from_secs(5)));
        assert_eq!(mailbox.latest(), Some(json!({"x": 1.0})));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_update_times_out() {
        let mailbox = Mailbox::new();
        mailbox.store(json!(0));
        assert!(!mailbox.wait_for_update(1, Duration::from_millis(10)));
        assert!(mailbox.wait_for_update(0, Duration::from_millis(10)));
    }

    #[test]
    fn test_ready_flag() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.wait_ready(Instant::now() + Duration::from_millis(5)));
        mailbox.set_ready(true);
        assert!(mailbox.is_ready());
        assert!(mailbox.wait_ready(Instant::now()));
    }
}
