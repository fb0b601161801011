//! Duplicate-delivery suppression.
//!
//! The platform redelivers a notification whenever it does not receive a 2xx
//! response in time, reusing the original message id. The deduplicator tracks
//! recently-seen message ids so a redelivered notification is acknowledged
//! without invoking its handler a second time.

use crate::{MessageId, Timestamp};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Outcome of observing a message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDisposition {
    /// The id has not been seen inside the retention window; dispatch it.
    FirstDelivery,
    /// The id was already seen; acknowledge but do not invoke the handler.
    Duplicate,
}

/// Tracks recently-seen message identifiers.
///
/// A single mutex guards the table, so the seen-check and the insert happen
/// as one atomic operation: two near-simultaneous deliveries of the same
/// message id can never both observe `FirstDelivery`.
///
/// Entries older than the retention window are evicted lazily on insert. The
/// window must exceed the platform's documented redelivery horizon; the
/// default leaves comfortable headroom over the platform's ten-minute limit.
pub struct MessageDeduplicator {
    retention: Duration,
    seen: Mutex<HashMap<MessageId, Timestamp>>,
}

impl MessageDeduplicator {
    /// Default retention window.
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

    /// Create a deduplicator with the given retention window.
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Observe a message id, recording it if it is new.
    pub fn observe(&self, message_id: &MessageId) -> DeliveryDisposition {
        let now = Timestamp::now();
        let mut seen = self.seen.lock().expect("dedup table lock poisoned");

        seen.retain(|_, first_seen| now.duration_since(*first_seen) < self.retention);

        match seen.entry(message_id.clone()) {
            Entry::Occupied(_) => DeliveryDisposition::Duplicate,
            Entry::Vacant(slot) => {
                slot.insert(now);
                DeliveryDisposition::FirstDelivery
            }
        }
    }

    /// Number of message ids currently tracked.
    pub fn len(&self) -> usize {
        self.seen.lock().expect("dedup table lock poisoned").len()
    }

    /// Check whether any message ids are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MessageDeduplicator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETENTION)
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
