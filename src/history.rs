//! Undo/redo stack with transaction boundaries.
//!
//! DESIGN
//! ======
//! Every dispatched command is classified by a [`HistoryMode`]:
//!
//! - `Ignore` never touches the stack.
//! - `Atomic` commits its delta as a single entry immediately.
//! - `Merge` accumulates into the open transaction started by
//!   [`History::begin`]; gestures call it once per frame and end up with one
//!   undo step.
//! - `Throttle` merges into the open transaction when there is one, and
//!   otherwise coalesces repeated dispatches that land inside the window
//!   (measured from when the entry was created) into a single entry.
//!
//! `cursor` counts applied entries. When a transaction is open it is always
//! the entry just below the cursor and there is no redo tail.
//!
//! TRADE-OFFS
//! ==========
//! Throttle windows are evaluated lazily against the caller's clock rather
//! than with timers; the `*_at` variants take that clock explicitly so tests
//! stay deterministic.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::time::{Duration, Instant};

use tracing::debug;

use crate::command::Delta;
use crate::consts::HISTORY_CAPACITY;
use crate::doc::{DocError, Document};

/// How a dispatched command interacts with the undo stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Ignore,
    Atomic,
    Merge,
    Throttle(Duration),
}

#[derive(Debug)]
struct Entry {
    delta: Delta,
    created: Instant,
    throttled: bool,
}

#[derive(Debug)]
pub struct History {
    entries: Vec<Entry>,
    cursor: usize,
    open: bool,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl History {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::new(), cursor: 0, open: false, capacity: capacity.max(1) }
    }

    /// Committed plus open entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0 && !(self.open && self.top_is_empty())
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.open && self.cursor < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.open = false;
        debug!("history cleared");
    }

    // =========================================================================
    // TRANSACTIONS
    // =========================================================================

    /// Start a transaction ("new"). Any open one is committed first.
    pub fn begin(&mut self) {
        self.begin_at(Instant::now());
    }

    pub fn begin_at(&mut self, now: Instant) {
        self.commit();
        self.truncate_redo();
        self.push(Entry { delta: Delta::default(), created: now, throttled: false });
        self.open = true;
        debug!(cursor = self.cursor, "history transaction opened");
    }

    /// Close the open transaction, keeping its effect.
    ///
    /// A transaction that recorded nothing is discarded.
    pub fn commit(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if self.top_is_empty() {
            self.entries.pop();
            self.cursor -= 1;
            debug!("empty history transaction discarded");
        } else {
            debug!(cursor = self.cursor, "history transaction committed");
        }
    }

    /// Revert the open transaction ("back") and drop it from the stack.
    ///
    /// Returns `false` when no transaction was open.
    ///
    /// # Errors
    ///
    /// Propagates a failure to re-apply the inverse ops.
    pub fn back(&mut self, doc: &mut Document) -> Result<bool, DocError> {
        if !self.open {
            return Ok(false);
        }
        self.open = false;
        let Some(entry) = self.entries.pop() else {
            return Ok(false);
        };
        self.cursor -= 1;
        entry.delta.apply_inverse(doc)?;
        debug!(ops = entry.delta.len(), "history transaction reverted");
        Ok(true)
    }

    // =========================================================================
    // RECORDING
    // =========================================================================

    pub fn record(&mut self, delta: Delta, mode: HistoryMode) {
        self.record_at(delta, mode, Instant::now());
    }

    /// Store `delta`, which has already been applied to the document.
    pub fn record_at(&mut self, delta: Delta, mode: HistoryMode, now: Instant) {
        if delta.is_empty() {
            return;
        }
        match mode {
            HistoryMode::Ignore => {}
            HistoryMode::Atomic => {
                self.commit();
                self.truncate_redo();
                self.push(Entry { delta, created: now, throttled: false });
                debug!(cursor = self.cursor, "history entry committed");
            }
            HistoryMode::Merge => {
                if !self.open {
                    self.begin_at(now);
                }
                self.merge_top(delta);
            }
            HistoryMode::Throttle(window) => {
                if self.open || self.throttle_window_open(window, now) {
                    self.merge_top(delta);
                } else {
                    self.truncate_redo();
                    self.push(Entry { delta, created: now, throttled: true });
                    debug!(cursor = self.cursor, "history throttle window opened");
                }
            }
        }
    }

    // =========================================================================
    // UNDO / REDO
    // =========================================================================

    /// Step back one entry. An open transaction is committed first.
    ///
    /// # Errors
    ///
    /// Propagates a failure to re-apply the inverse ops.
    pub fn undo(&mut self, doc: &mut Document) -> Result<bool, DocError> {
        self.commit();
        if self.cursor == 0 {
            return Ok(false);
        }
        self.entries[self.cursor - 1].delta.apply_inverse(doc)?;
        self.cursor -= 1;
        debug!(cursor = self.cursor, "history undo");
        Ok(true)
    }

    /// Re-apply the entry after the cursor.
    ///
    /// # Errors
    ///
    /// Propagates a failure to re-apply the forward ops.
    pub fn redo(&mut self, doc: &mut Document) -> Result<bool, DocError> {
        self.commit();
        let Some(entry) = self.entries.get(self.cursor) else {
            return Ok(false);
        };
        entry.delta.apply_forward(doc)?;
        self.cursor += 1;
        debug!(cursor = self.cursor, "history redo");
        Ok(true)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn top_is_empty(&self) -> bool {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .is_some_and(|e| e.delta.is_empty())
    }

    fn throttle_window_open(&self, window: Duration, now: Instant) -> bool {
        if self.cursor != self.entries.len() {
            return false;
        }
        self.entries
            .last()
            .is_some_and(|e| e.throttled && now.saturating_duration_since(e.created) < window)
    }

    fn merge_top(&mut self, delta: Delta) {
        if let Some(entry) = self.cursor.checked_sub(1).and_then(|i| self.entries.get_mut(i)) {
            entry.delta.merge(delta);
            entry.delta.compact();
        }
    }

    fn truncate_redo(&mut self) {
        if self.cursor < self.entries.len() {
            debug!(dropped = self.entries.len() - self.cursor, "history redo tail truncated");
            self.entries.truncate(self.cursor);
        }
    }

    fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.cursor += 1;
        while self.entries.len() > self.capacity {
            self.entries.remove(0);
            self.cursor -= 1;
        }
    }
}
