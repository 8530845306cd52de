//! Undo/redo history — a bounded, linear, branch-discarding stack of
//! PNG-encoded full-raster snapshots with debounced capture.
//!
//! Rapid mutations coalesce: each `request_snapshot` resets a quiet-period
//! timer, and the raster is only encoded once the window elapses (checked
//! from the frame loop via `tick`).  Restoring is a full overwrite of the
//! raster — no diffs — which keeps the implementation small at the cost of
//! memory, acceptable at the fixed capacity of 50 entries.

use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::io::encode_png;
use crate::log_err;

/// Maximum number of retained snapshots.
pub const HISTORY_CAPACITY: usize = 50;

/// Quiet period before a requested snapshot is actually captured.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

pub struct HistoryManager {
    /// PNG payloads, oldest first.
    entries: Vec<Vec<u8>>,
    /// Cursor into `entries`; valid whenever `entries` is non-empty.
    /// Everything after it is redo-able future.
    index: usize,
    capacity: usize,
    debounce: Duration,
    /// Set by `request_snapshot`, consumed when the window elapses.
    pending_since: Option<Instant>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::with_limits(HISTORY_CAPACITY, DEBOUNCE_WINDOW)
    }
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom capacity/debounce, used by tests and kept for tuning.
    pub fn with_limits(capacity: usize, debounce: Duration) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            capacity: capacity.max(1),
            debounce,
            pending_since: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.index
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.index + 1 < self.entries.len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Schedule a snapshot.  Calling again within the debounce window resets
    /// the timer, so a burst of mutations produces a single entry.
    pub fn request_snapshot(&mut self) {
        self.pending_since = Some(Instant::now());
    }

    /// Capture a pending snapshot once its quiet period has elapsed.
    /// Called every frame; returns true when an entry was committed.
    pub fn tick(&mut self, pixels: &RgbaImage) -> bool {
        match self.pending_since {
            Some(since) if since.elapsed() >= self.debounce => self.commit(pixels),
            _ => false,
        }
    }

    /// Commit any pending snapshot immediately, ignoring the debounce
    /// window.  Used before undo/redo/export so pending state is not lost.
    pub fn flush(&mut self, pixels: &RgbaImage) -> bool {
        if self.pending_since.is_some() {
            self.commit(pixels)
        } else {
            false
        }
    }

    fn commit(&mut self, pixels: &RgbaImage) -> bool {
        self.pending_since = None;

        let encoded = match encode_png(pixels) {
            Ok(bytes) => bytes,
            Err(e) => {
                log_err!("History snapshot encode failed: {}", e);
                return false;
            }
        };

        // Discard the redo-able future — no branching
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }

        // Skip identical consecutive states
        if self.entries.last().is_some_and(|top| *top == encoded) {
            return false;
        }

        self.entries.push(encoded);
        self.index = self.entries.len() - 1;

        // Evict the oldest entry above capacity, keeping the cursor aimed at
        // the same snapshot
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
            self.index -= 1;
        }
        true
    }

    /// Step back one snapshot and restore the raster from it.  Returns false
    /// (raster untouched) when already at the oldest entry.
    pub fn undo(&mut self, pixels: &mut RgbaImage) -> bool {
        self.flush(pixels);
        if !self.can_undo() {
            return false;
        }
        if self.restore(self.index - 1, pixels) {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Step forward one snapshot.  Returns false when already at the newest.
    pub fn redo(&mut self, pixels: &mut RgbaImage) -> bool {
        // A pending mutation becomes the new tip and legitimately discards
        // the future before the redo is attempted.
        self.flush(pixels);
        if !self.can_redo() {
            return false;
        }
        if self.restore(self.index + 1, pixels) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Decode entry `at` and overwrite the raster.  The cursor only moves on
    /// success, so a corrupt entry leaves the state consistent.
    fn restore(&self, at: usize, pixels: &mut RgbaImage) -> bool {
        match image::load_from_memory(&self.entries[at]) {
            Ok(decoded) => {
                *pixels = decoded.to_rgba8();
                true
            }
            Err(e) => {
                log_err!("History restore failed at entry {}: {}", at, e);
                false
            }
        }
    }
}
