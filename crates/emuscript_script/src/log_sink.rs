//! Bounded, lock-protected log for script diagnostics
//!
//! Holds the most recent entries only; the oldest entry is evicted once
//! capacity is reached. Guarded by its own lock so that error reporting
//! never waits on the session's execution lock.

use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct LogSink {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogSink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, message: impl Into<String>) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(message.into());
    }

    /// Entries in insertion order.
    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Entries joined into a single text block for the host UI.
    pub fn text(&self) -> String {
        let entries = self.entries.lock();
        let mut out = String::new();
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(entry);
        }
        out
    }
}
