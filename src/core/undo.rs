use crate::core::queue::QueuedCandidate;
use crate::models::ValidationLabel;
use chrono::{DateTime, Utc};

/// The most recent validation, as it can be reverted
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    /// The validated entry; `candidate.user_validation` carries `label`
    pub entry: QueuedCandidate,
    pub label: ValidationLabel,
    /// Queue position the entry had when it was validated
    pub position: usize,
    pub validated_at: DateTime<Utc>,
}

impl UndoEntry {
    pub fn new(mut entry: QueuedCandidate, label: ValidationLabel, position: usize) -> Self {
        entry.candidate.user_validation = Some(label);
        Self {
            entry,
            label,
            position,
            validated_at: Utc::now(),
        }
    }

    /// The entry as it should look back in the queue: pending again
    pub fn pending_entry(&self) -> QueuedCandidate {
        let mut entry = self.entry.clone();
        entry.candidate.user_validation = None;
        entry
    }
}

/// Single-slot buffer holding the last validated entry
///
/// Only the latest decision is recoverable. Pushing a new entry drops
/// whatever was there.
#[derive(Debug, Clone, Default)]
pub struct UndoBuffer {
    slot: Option<UndoEntry>,
}

impl UndoBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry`, returning the entry it displaced
    pub fn push(&mut self, entry: UndoEntry) -> Option<UndoEntry> {
        self.slot.replace(entry)
    }

    /// Take the buffered entry, leaving the buffer empty
    pub fn take(&mut self) -> Option<UndoEntry> {
        self.slot.take()
    }

    /// Put back an entry whose undo did not go through. A newer entry wins.
    pub fn restore(&mut self, entry: UndoEntry) -> bool {
        if self.slot.is_some() {
            return false;
        }
        self.slot = Some(entry);
        true
    }

    pub fn peek(&self) -> Option<&UndoEntry> {
        self.slot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}
