use core::fmt::Debug;
use std::collections::{HashMap, HashSet, VecDeque};

use priority_queue::PriorityQueue;

use super::FrameId;

/// A page-replacement policy. The buffer pool calls `record_access` on every
/// fetch and marks a frame evictable again once its pin count drops to zero;
/// `evict` is only ever called when `can_evict` is true.
pub(super) trait Replacer: Send + Sync + Debug {
    fn record_access(&mut self, frame_id: FrameId);
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);
    fn can_evict(&self) -> bool;
    fn evict(&mut self) -> FrameId;
    #[cfg(test)]
    fn peek(&self) -> Option<FrameId>;
}

#[derive(Clone, Debug)]
pub(super) struct Lru {
    timestamp: i64,
    heap: PriorityQueue<FrameId, i64>,
    /// Last access recorded while the frame was pinned (unevictable);
    /// restored into the heap once it becomes evictable again.
    last_access: HashMap<FrameId, i64>,
}

impl Lru {
    pub fn new(size: usize) -> Self {
        Self {
            timestamp: 0,
            heap: PriorityQueue::with_capacity(size),
            last_access: HashMap::with_capacity(size),
        }
    }
}

impl Replacer for Lru {
    fn record_access(&mut self, frame_id: FrameId) {
        self.timestamp += 1;
        self.heap.push_decrease(frame_id, -self.timestamp);
        self.set_evictable(frame_id, false);
    }

    fn can_evict(&self) -> bool {
        !self.heap.is_empty()
    }

    fn evict(&mut self) -> FrameId {
        self.heap.pop().expect("evict called with nothing evictable").0
    }

    #[cfg(test)]
    fn peek(&self) -> Option<FrameId> {
        self.heap.peek().map(|(frame_id, _)| *frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            let ts = self.last_access.remove(&frame_id).unwrap_or(-self.timestamp);
            self.heap.push(frame_id, ts);
        } else if let Some((frame_id, ts)) = self.heap.remove(&frame_id) {
            self.last_access.insert(frame_id, ts);
        }
    }
}

/// LRU-K: evicts the evictable frame with the largest backward k-distance
/// (time since its k-th most recent access). Frames with fewer than `k`
/// recorded accesses have infinite backward distance and are preferred for
/// eviction over any frame with a full history; among those, the one whose
/// earliest recorded access is oldest goes first (classical LRU-K). Ties
/// within the full-history group break on smallest kth-most-recent
/// timestamp; any remaining tie in either group breaks on ascending frame id.
#[derive(Clone, Debug)]
pub(super) struct LruK {
    k: usize,
    timestamp: i64,
    /// Most recent access first (front = newest, back = oldest, capped at
    /// `k` entries).
    history: HashMap<FrameId, VecDeque<i64>>,
    evictable: HashSet<FrameId>,
}

impl LruK {
    pub fn new(_size: usize, k: usize) -> Self {
        Self {
            k: k.max(1),
            timestamp: 0,
            history: HashMap::new(),
            evictable: HashSet::new(),
        }
    }

    /// `None` means fewer than `k` accesses recorded (infinite distance).
    fn kth_most_recent(&self, frame_id: FrameId) -> Option<i64> {
        let history = self.history.get(&frame_id)?;
        if history.len() < self.k {
            None
        } else {
            history.back().copied()
        }
    }

    /// The timestamp of a frame's earliest recorded access, used to break
    /// ties among frames with fewer than `k` accesses (classical LRU-K:
    /// among those, evict the one whose earliest recorded access is
    /// oldest). A frame with no recorded access at all sorts first.
    fn oldest_recorded(&self, frame_id: FrameId) -> i64 {
        self.history.get(&frame_id).and_then(|h| h.back().copied()).unwrap_or(i64::MIN)
    }
}

impl Replacer for LruK {
    fn record_access(&mut self, frame_id: FrameId) {
        self.timestamp += 1;
        let history = self.history.entry(frame_id).or_default();
        history.push_front(self.timestamp);
        if history.len() > self.k {
            history.pop_back();
        }
        self.set_evictable(frame_id, false);
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    fn can_evict(&self) -> bool {
        !self.evictable.is_empty()
    }

    fn evict(&mut self) -> FrameId {
        let victim = *self
            .evictable
            .iter()
            .min_by(|&&a, &&b| {
                // infinite distance (fewer than k accesses): evict first, tie-broken by
                // oldest recorded access; otherwise by largest backward k-distance
                // (smallest kth-most-recent timestamp), tie-broken by frame id.
                let key = |frame_id: FrameId| match self.kth_most_recent(frame_id) {
                    None => (0i64, self.oldest_recorded(frame_id), frame_id as i64),
                    Some(ts) => (1i64, ts, frame_id as i64),
                };
                key(a).cmp(&key(b))
            })
            .expect("evict called with nothing evictable");

        self.evictable.remove(&victim);
        victim
    }

    #[cfg(test)]
    fn peek(&self) -> Option<FrameId> {
        self.evictable
            .iter()
            .copied()
            .min_by(|&a, &b| {
                let key = |frame_id: FrameId| match self.kth_most_recent(frame_id) {
                    None => (0i64, self.oldest_recorded(frame_id), frame_id as i64),
                    Some(ts) => (1i64, ts, frame_id as i64),
                };
                key(a).cmp(&key(b))
            })
    }
}
