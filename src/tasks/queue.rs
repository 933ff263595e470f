//! Playback order, cursor and history over the mirrored photos.
//!
//! Rules:
//! - `order` never holds the same path twice.
//! - `next` records the cursor in a bounded history and marks the photo it
//!   leaves as shown; `back` pops that history and un-marks the photo.
//! - Reaching the end of `order` starts a new cycle: shuffled cycles draw
//!   from photos not yet shown, sequential cycles restart at the top.
//!   History never crosses a cycle boundary.
//! - New arrivals are spliced in at the cursor so they are shown next.

use std::collections::{HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

/// Maximum number of `back` steps remembered.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved,
    /// The cycle ended and a new order was built.
    Exhausted,
}

pub struct PlaybackQueue {
    order: Vec<String>,
    cursor: usize,
    history: VecDeque<usize>,
    shown: HashSet<String>,
    /// Every photo currently known to the mirror.
    universe: Vec<String>,
    shuffle: bool,
    rng: StdRng,
}

impl PlaybackQueue {
    pub fn new(shuffle: bool, rng: StdRng) -> Self {
        Self {
            order: Vec::new(),
            cursor: 0,
            history: VecDeque::new(),
            shown: HashSet::new(),
            universe: Vec::new(),
            shuffle,
            rng,
        }
    }

    /// Replace the order wholesale. The first `pinned` items keep their
    /// position; the rest are shuffled when shuffle is on.
    pub fn rebuild(&mut self, items: &[String], pinned: usize) {
        let items = dedup(items);
        let pinned = pinned.min(items.len());
        let mut rest = items[pinned..].to_vec();
        if self.shuffle {
            rest.shuffle(&mut self.rng);
        }
        self.order = items[..pinned].iter().cloned().chain(rest).collect();
        self.universe = items;
        self.cursor = 0;
        self.history.clear();
        self.shown.clear();
        debug!(
            photos = self.order.len(),
            pinned,
            shuffle = self.shuffle,
            "playback order rebuilt"
        );
    }

    pub fn current(&self) -> Option<&str> {
        self.order.get(self.cursor).map(String::as_str)
    }

    /// Move past the current photo, marking it shown.
    pub fn advance(&mut self) -> Advance {
        let Some(leaving) = self.order.get(self.cursor).cloned() else {
            return Advance::Moved;
        };
        self.shown.insert(leaving.clone());
        if self.cursor + 1 < self.order.len() {
            self.push_history(self.cursor);
            self.cursor += 1;
            Advance::Moved
        } else {
            self.start_cycle(Some(&leaving));
            Advance::Exhausted
        }
    }

    /// Return to the previously shown photo. `false` when there is no history.
    pub fn back(&mut self) -> bool {
        let Some(previous) = self.history.pop_back() else {
            return false;
        };
        self.cursor = previous;
        if let Some(path) = self.order.get(previous) {
            self.shown.remove(path);
        }
        true
    }

    /// Forget what was shown and permute the order.
    pub fn reshuffle(&mut self) {
        self.shown.clear();
        self.history.clear();
        self.order.shuffle(&mut self.rng);
        self.cursor = 0;
    }

    /// Insert newly arrived photos at the cursor. Existing occurrences are
    /// removed first so no path appears twice. Returns how many were inserted.
    pub fn splice(&mut self, new_items: &[String]) -> usize {
        let incoming = dedup(new_items);
        if incoming.is_empty() {
            return 0;
        }
        let incoming_set: HashSet<&str> = incoming.iter().map(String::as_str).collect();

        let mut remap: Vec<Option<usize>> = Vec::with_capacity(self.order.len());
        let mut kept = Vec::with_capacity(self.order.len() + incoming.len());
        let mut removed_before_cursor = 0;
        for (idx, path) in std::mem::take(&mut self.order).into_iter().enumerate() {
            if incoming_set.contains(path.as_str()) {
                remap.push(None);
                if idx < self.cursor {
                    removed_before_cursor += 1;
                }
            } else {
                remap.push(Some(kept.len()));
                kept.push(path);
            }
        }
        self.cursor -= removed_before_cursor;
        let cursor = self.cursor;
        let inserted = incoming.len();
        self.history = self
            .history
            .iter()
            .filter_map(|&idx| remap.get(idx).copied().flatten())
            .map(|idx| if idx >= cursor { idx + inserted } else { idx })
            .collect();

        kept.splice(cursor..cursor, incoming.iter().cloned());
        self.order = kept;

        for path in &incoming {
            self.shown.remove(path);
            if !self.universe.contains(path) {
                self.universe.push(path.clone());
            }
        }
        debug!(inserted, cursor, "spliced new photos");
        inserted
    }

    /// Record the full set of photos known after a reconciliation pass.
    pub fn set_universe(&mut self, items: &[String]) {
        self.universe = dedup(items);
        let known: HashSet<&String> = self.universe.iter().collect();
        self.shown.retain(|p| known.contains(p));
    }

    /// Takes effect at the next cycle or reshuffle; position is kept.
    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    /// Drop the current photo (its file is gone) and move on without
    /// marking anything shown.
    pub fn skip_missing(&mut self) {
        if self.cursor >= self.order.len() {
            return;
        }
        let gone = self.order.remove(self.cursor);
        self.universe.retain(|p| *p != gone);
        let cursor = self.cursor;
        self.history = self
            .history
            .iter()
            .filter(|&&idx| idx != cursor)
            .map(|&idx| if idx > cursor { idx - 1 } else { idx })
            .collect();
        debug!(path = %gone, "skipping photo missing on disk");
        if self.cursor >= self.order.len() {
            self.start_cycle(None);
        }
    }

    fn push_history(&mut self, idx: usize) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(idx);
    }

    fn start_cycle(&mut self, last_shown: Option<&str>) {
        self.history.clear();
        self.cursor = 0;
        if self.shuffle {
            let mut next: Vec<String> = self
                .universe
                .iter()
                .filter(|p| !self.shown.contains(*p))
                .cloned()
                .collect();
            if next.is_empty() {
                self.shown.clear();
                next = self.universe.clone();
            }
            next.shuffle(&mut self.rng);
            // Avoid showing the same photo twice in a row across the boundary.
            if next.len() > 1 && last_shown.is_some_and(|last| next[0] == last) {
                let end = next.len() - 1;
                next.swap(0, end);
            }
            self.order = next;
        } else {
            self.shown.clear();
            let known: HashSet<&String> = self.universe.iter().collect();
            self.order.retain(|p| known.contains(p));
            let queued: HashSet<String> = self.order.iter().cloned().collect();
            let missing: Vec<String> = self
                .universe
                .iter()
                .filter(|p| !queued.contains(*p))
                .cloned()
                .collect();
            self.order.extend(missing);
        }
        debug!(
            photos = self.order.len(),
            shuffle = self.shuffle,
            "playback cycle restarted"
        );
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_shown(&self, path: &str) -> bool {
        self.shown.contains(path)
    }

    pub fn shown_len(&self) -> usize {
        self.shown.len()
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Drop repeated paths, keeping first occurrences in order.
fn dedup(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|p| seen.insert(p.as_str()))
        .cloned()
        .collect()
}
