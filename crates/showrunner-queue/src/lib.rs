//! Recirculating priority queue feeding the show playback loop.
//!
//! Videos enter at [`Priority::Fresh`] and are moved to
//! [`Priority::Recirculated`] after each play, so the loop keeps serving
//! content once nothing new is queued. The queue is shared between the
//! supervisor's task tree and the control surface, which may enqueue from a
//! different thread, so every operation runs under one internal lock.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Default maximum number of queued videos.
pub const DEFAULT_CAPACITY: usize = 20;

/// Priority class of a queued video. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Never played during this run; dequeued first.
    Fresh,

    /// Already played at least once; replayed only when nothing fresh
    /// remains.
    Recirculated,
}

/// A queued video reference with its ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueItem {
    priority: Priority,
    sequence: u64,
    reference: String,
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // FIFO among equal priorities: sequence breaks the tie.
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    heap: BinaryHeap<Reverse<QueueItem>>,
    sequence: u64,
    open: bool,
}

/// Thread-safe priority queue of pending videos with replay recirculation.
pub struct RecirculatingQueue {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl RecirculatingQueue {
    /// Create a closed queue with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a closed queue bounded to `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                sequence: 0,
                open: false,
            }),
            capacity,
        }
    }

    /// Open the queue for a new run.
    pub fn open(&self) {
        self.inner.lock().open = true;
    }

    /// Close the queue. Terminal for the current run: every later operation
    /// except [`clear`](Self::clear) becomes a logged no-op until the queue
    /// is reopened.
    pub fn close(&self) {
        self.inner.lock().open = false;
    }

    /// Whether the queue currently accepts operations.
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Enqueue a video at fresh priority. Returns false when the queue is
    /// closed or full.
    pub fn enqueue_fresh(&self, reference: &str) -> bool {
        self.enqueue(reference, Priority::Fresh)
    }

    /// Enqueue a video at recirculated priority. Returns false when the
    /// queue is closed or full.
    pub fn enqueue_recirculated(&self, reference: &str) -> bool {
        self.enqueue(reference, Priority::Recirculated)
    }

    fn enqueue(&self, reference: &str, priority: Priority) -> bool {
        let mut inner = self.inner.lock();
        if !inner.open {
            warn!(reference, "Skipped enqueue, queue is closed");
            return false;
        }
        if inner.heap.len() >= self.capacity {
            debug!(reference, capacity = self.capacity, "Queue full, video refused");
            return false;
        }
        push_item(&mut inner, reference.to_string(), priority);
        true
    }

    /// Preview the next video without removing it.
    pub fn peek(&self) -> Option<(Priority, String)> {
        let inner = self.inner.lock();
        if !inner.open {
            warn!("Skipped peek, queue is closed");
            return None;
        }
        inner
            .heap
            .peek()
            .map(|Reverse(item)| (item.priority, item.reference.clone()))
    }

    /// Remove and return the next fresh video.
    ///
    /// Returns `None` when the queue is empty, closed, or when the head is
    /// already at the recirculated tier. The recirculated head is left in
    /// place: "nothing fresh to show" is the caller's cue to play filler,
    /// and popping here would serve the same stale item forever.
    pub fn take_next(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        if !inner.open {
            warn!("Skipped take_next, queue is closed");
            return None;
        }
        take_fresh(&mut inner)
    }

    /// Remove the head video regardless of tier, re-insert it at
    /// recirculated priority, and return it. This is the steady-state
    /// playback operation: the loop feeds itself, replaying recirculated
    /// videos once nothing fresh remains.
    pub fn take_next_and_recirculate(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        if !inner.open {
            warn!("Skipped take_next_and_recirculate, queue is closed");
            return None;
        }
        let reference = inner.heap.pop().map(|Reverse(item)| item.reference)?;
        push_item(&mut inner, reference.clone(), Priority::Recirculated);
        Some(reference)
    }

    /// Drain all queued videos. Allowed on a closed queue so a graceful
    /// stop can close first and drain after.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let drained = inner.heap.len();
        inner.heap.clear();
        if drained > 0 {
            debug!(drained, "Queue cleared");
        }
    }

    /// Number of queued videos.
    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Whether the queue holds no videos.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }
}

impl Default for RecirculatingQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn push_item(inner: &mut Inner, reference: String, priority: Priority) {
    let sequence = inner.sequence;
    inner.sequence += 1;
    inner.heap.push(Reverse(QueueItem {
        priority,
        sequence,
        reference,
    }));
}

fn take_fresh(inner: &mut Inner) -> Option<String> {
    match inner.heap.peek() {
        None => None,
        Some(Reverse(head)) if head.priority == Priority::Recirculated => None,
        Some(_) => inner.heap.pop().map(|Reverse(item)| item.reference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_queue() -> RecirculatingQueue {
        let queue = RecirculatingQueue::new();
        queue.open();
        queue
    }

    #[test]
    fn test_fresh_plays_before_recirculated() {
        let queue = open_queue();
        assert!(queue.enqueue_recirculated("old"));
        assert!(queue.enqueue_fresh("new"));

        assert_eq!(queue.peek(), Some((Priority::Fresh, "new".to_string())));
        assert_eq!(queue.take_next(), Some("new".to_string()));
    }

    #[test]
    fn test_fifo_within_priority() {
        let queue = open_queue();
        queue.enqueue_fresh("a");
        queue.enqueue_fresh("b");
        queue.enqueue_fresh("c");

        assert_eq!(queue.take_next(), Some("a".to_string()));
        assert_eq!(queue.take_next(), Some("b".to_string()));
        assert_eq!(queue.take_next(), Some("c".to_string()));
    }

    #[test]
    fn test_take_next_leaves_recirculated_head() {
        let queue = open_queue();
        queue.enqueue_recirculated("stale");

        // A purely recirculated backlog reads as "nothing fresh".
        assert_eq!(queue.take_next(), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_recirculation_is_lossless() {
        let queue = open_queue();
        queue.enqueue_fresh("a");

        // The sole video replays forever, never lost, never duplicated.
        for _ in 0..3 {
            assert_eq!(queue.take_next_and_recirculate(), Some("a".to_string()));
            assert_eq!(queue.len(), 1);
        }

        // A new fresh video outranks the recirculated copy.
        queue.enqueue_fresh("b");
        assert_eq!(queue.take_next_and_recirculate(), Some("b".to_string()));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take_next_and_recirculate(), Some("a".to_string()));
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let queue = open_queue();
        queue.enqueue_fresh("a");

        assert_eq!(queue.peek(), Some((Priority::Fresh, "a".to_string())));
        assert_eq!(queue.peek(), Some((Priority::Fresh, "a".to_string())));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_closed_queue_is_a_no_op() {
        let queue = open_queue();
        queue.enqueue_fresh("a");
        queue.close();

        assert!(!queue.enqueue_fresh("b"));
        assert!(!queue.enqueue_recirculated("c"));
        assert_eq!(queue.take_next(), None);
        assert_eq!(queue.take_next_and_recirculate(), None);
        assert_eq!(queue.peek(), None);

        // Contents survive closure until the queue is reopened.
        assert_eq!(queue.len(), 1);
        queue.open();
        assert_eq!(queue.take_next(), Some("a".to_string()));
    }

    #[test]
    fn test_clear_drains_even_when_closed() {
        let queue = open_queue();
        queue.enqueue_fresh("a");
        queue.enqueue_fresh("b");
        queue.close();
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let queue = RecirculatingQueue::with_capacity(2);
        queue.open();

        assert!(queue.enqueue_fresh("a"));
        assert!(queue.enqueue_fresh("b"));
        assert!(!queue.enqueue_fresh("c"));
        assert!(!queue.enqueue_recirculated("d"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_concurrent_enqueue_respects_capacity() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(RecirculatingQueue::with_capacity(8));
        queue.open();

        let mut handles = Vec::new();
        for t in 0..4 {
            let queue = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                let mut accepted = 0;
                for i in 0..8 {
                    if queue.enqueue_fresh(&format!("v{t}-{i}")) {
                        accepted += 1;
                    }
                }
                accepted
            }));
        }

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 8);
        assert_eq!(queue.len(), 8);
    }
}
