//! LRU-K replacement policy.
//!
//! Tracks the last k access timestamps of every frame and evicts the frame
//! with the largest backward-k-distance: the gap between now and its k-th
//! most recent access. Frames with fewer than k recorded accesses count as
//! infinitely distant and are preferred, oldest first access winning the
//! tie. Compared to plain LRU this resists scan pollution: one touch does
//! not make a frame look hot.

use std::collections::{HashMap, VecDeque};

use crate::common::FrameId;

/// Per-frame access bookkeeping.
struct LruKNode {
    /// Up to k access timestamps, oldest first.
    history: VecDeque<u64>,
    is_evictable: bool,
}

/// LRU-K eviction policy.
///
/// Owned by the buffer pool and called under the pool latch, so methods
/// take `&mut self` and carry no lock of their own. Passing a frame id the
/// replacer was not sized for, or toggling evictability of a frame it has
/// never seen, is a caller bug and panics.
pub struct LruKReplacer {
    node_store: HashMap<FrameId, LruKNode>,

    /// Monotonic logical clock, bumped once per recorded access.
    current_timestamp: u64,

    /// Number of nodes currently marked evictable.
    curr_size: usize,

    /// Capacity: valid frame ids are `0..replacer_size`.
    replacer_size: usize,

    k: usize,
}

impl LruKReplacer {
    /// Create a replacer for `num_frames` frames with lookback window `k`.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "k must be > 0");
        Self {
            node_store: HashMap::new(),
            current_timestamp: 0,
            curr_size: 0,
            replacer_size: num_frames,
            k,
        }
    }

    /// Record an access to `frame_id` at the current timestamp.
    ///
    /// A frame seen for the first time starts non-evictable with a single
    /// history entry; afterwards the history is capped at k entries,
    /// dropping the oldest.
    ///
    /// # Panics
    /// Panics if `frame_id` is out of range for this replacer.
    pub fn record_access(&mut self, frame_id: FrameId) {
        assert!(
            frame_id.index() < self.replacer_size,
            "{} out of range for replacer over {} frames",
            frame_id,
            self.replacer_size
        );

        let t = self.current_timestamp;
        self.current_timestamp += 1;

        let node = self.node_store.entry(frame_id).or_insert_with(|| LruKNode {
            history: VecDeque::new(),
            is_evictable: false,
        });
        if node.history.len() == self.k {
            node.history.pop_front();
        }
        node.history.push_back(t);
    }

    /// Toggle evictability of `frame_id`, adjusting the evictable count on
    /// actual transitions only.
    ///
    /// # Panics
    /// Panics if the frame has never been recorded.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let node = self
            .node_store
            .get_mut(&frame_id)
            .unwrap_or_else(|| panic!("set_evictable on unrecorded {}", frame_id));

        match (node.is_evictable, evictable) {
            (false, true) => self.curr_size += 1,
            (true, false) => self.curr_size -= 1,
            _ => return,
        }
        node.is_evictable = evictable;
    }

    /// Forget a frame's history. No-op for unknown or pinned frames; the
    /// pool only removes frames whose pages left the pool.
    pub fn remove(&mut self, frame_id: FrameId) {
        let Some(node) = self.node_store.get_mut(&frame_id) else {
            return;
        };
        if !node.is_evictable {
            return;
        }

        node.history.clear();
        node.is_evictable = false;
        self.curr_size -= 1;
    }

    /// Choose and claim an eviction victim.
    ///
    /// Among evictable frames: any frame with fewer than k accesses beats
    /// every fully-sampled frame, ties broken by the oldest first access;
    /// otherwise the frame whose k-th most recent access is oldest wins.
    /// The victim is marked non-evictable and its history cleared.
    pub fn evict(&mut self) -> Option<FrameId> {
        if self.curr_size == 0 {
            return None;
        }

        // (earliest history timestamp, id) for frames with +inf distance
        let mut inf_victim: Option<(u64, FrameId)> = None;
        // (backward-k-distance, id) for fully-sampled frames
        let mut k_victim: Option<(u64, FrameId)> = None;

        for (&id, node) in &self.node_store {
            if !node.is_evictable {
                continue;
            }
            let first = node.history.front().copied().unwrap_or(0);
            if node.history.len() < self.k {
                if inf_victim.map_or(true, |(oldest, _)| first < oldest) {
                    inf_victim = Some((first, id));
                }
            } else {
                let distance = self.current_timestamp - first;
                if k_victim.map_or(true, |(max, _)| distance > max) {
                    k_victim = Some((distance, id));
                }
            }
        }

        let (_, victim) = inf_victim.or(k_victim)?;

        let node = self.node_store.get_mut(&victim).unwrap_or_else(|| {
            unreachable!("victim chosen from node_store");
        });
        node.is_evictable = false;
        node.history.clear();
        self.curr_size -= 1;

        Some(victim)
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.curr_size
    }
}
