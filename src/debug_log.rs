use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Longest payload excerpt kept per entry, in characters.
pub const MAX_PAYLOAD_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Fetch,
    Ok,
    Warn,
    Error,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugLogEntry {
    /// Milliseconds since the Unix epoch.
    pub time: u64,
    pub kind: LogKind,
    pub message: String,
    #[serde(rename = "truncatedPayload")]
    pub truncated_payload: Option<String>,
}

// ── Bounded ring of recent transport events ───────────────────────────────────

pub struct DebugLog {
    capacity: usize,
    inner: RwLock<VecDeque<DebugLogEntry>>,
}

impl DebugLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one entry, evicting the oldest when full.
    pub fn push(&self, kind: LogKind, message: impl Into<String>, payload: Option<&str>) {
        let entry = DebugLogEntry {
            time: now_millis(),
            kind,
            message: message.into(),
            truncated_payload: payload.map(truncate_payload),
        };

        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.len() == self.capacity {
            inner.pop_front();
        }
        inner.push_back(entry);
    }

    /// Snapshot, oldest first.
    pub fn entries(&self) -> Vec<DebugLogEntry> {
        match self.inner.read() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.inner.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

fn truncate_payload(payload: &str) -> String {
    payload.chars().take(MAX_PAYLOAD_CHARS).collect()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
