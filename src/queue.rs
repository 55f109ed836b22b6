//! FIFO queues connecting the pipeline loops.
//!
//! Both pipeline queues (utterances in, speech requests out) need one thing
//! plain `mpsc` does not offer: discarding everything not yet consumed. Echo
//! cancellation flushes stale utterances before each render, and barge-in
//! flushes not-yet-started speech requests. [`FlushableQueue`] is a small
//! notify-backed FIFO that supports both.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// An unbounded async FIFO queue with a flush operation.
///
/// Cloning shares the same underlying queue. Ordering is strict FIFO; the
/// only way items are dropped is an explicit [`drain`](Self::drain).
pub struct FlushableQueue<T> {
    inner: Arc<QueueInner<T>>,
}

struct QueueInner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> Clone for FlushableQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for FlushableQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FlushableQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                items: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }),
        }
    }

    /// Append an item. Never blocks.
    pub fn push(&self, item: T) {
        self.inner
            .items
            .lock()
            .expect("queue lock poisoned")
            .push_back(item);
        self.inner.notify.notify_one();
    }

    /// Wait for and remove the oldest item.
    pub async fn recv(&self) -> T {
        loop {
            if let Some(item) = self
                .inner
                .items
                .lock()
                .expect("queue lock poisoned")
                .pop_front()
            {
                return item;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Remove an item without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.inner
            .items
            .lock()
            .expect("queue lock poisoned")
            .pop_front()
    }

    /// Discard every queued item, returning how many were dropped.
    pub fn drain(&self) -> usize {
        let mut items = self.inner.items.lock().expect("queue lock poisoned");
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Number of items currently waiting.
    pub fn len(&self) -> usize {
        self.inner.items.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order_preserved() {
        let queue = FlushableQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.recv().await, 1);
        assert_eq!(queue.recv().await, 2);
        assert_eq!(queue.recv().await, 3);
    }

    #[tokio::test]
    async fn recv_waits_for_push() {
        let queue = FlushableQueue::new();
        let rx = queue.clone();
        let handle = tokio::spawn(async move { rx.recv().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push("hello");
        assert_eq!(handle.await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn drain_discards_pending_items() {
        let queue = FlushableQueue::new();
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.drain(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.try_recv(), None);
    }

    #[tokio::test]
    async fn push_after_drain_still_delivers() {
        let queue = FlushableQueue::new();
        queue.push(1);
        queue.drain();
        queue.push(2);
        assert_eq!(queue.recv().await, 2);
    }

    #[tokio::test]
    async fn clones_share_the_queue() {
        let a: FlushableQueue<u32> = FlushableQueue::new();
        let b = a.clone();
        a.push(7);
        assert_eq!(b.recv().await, 7);
    }
}
