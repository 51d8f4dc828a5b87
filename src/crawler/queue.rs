//! Delay queue: a bounded, time-ordered collection that yields items once due
//!
//! Items are ordered by absolute deadline, so an item's place in the queue
//! reflects its live remaining delay no matter when it was inserted. Items
//! with equal deadlines come out in insertion order.
//!
//! The queue has a single consumer: `take` suspends until the earliest item is
//! due, waking early whenever an item is inserted or the queue is closed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Something with an absolute instant before which it must not be taken
pub trait Delayed {
    fn deadline(&self) -> Instant;
}

/// Why an offer was rejected; carries the rejected item back
#[derive(Debug, Error)]
pub enum OfferError<T> {
    #[error("delay queue is full")]
    Full(T),

    #[error("delay queue is closed")]
    Closed(T),
}

impl<T> OfferError<T> {
    /// Recovers the rejected item
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

struct Entry<T> {
    deadline: Instant,
    seq: u64,
    item: T,
}

// BinaryHeap is a max-heap; reverse so the earliest deadline sits on top
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

struct QueueInner<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
    closed: bool,
}

pub struct DelayQueue<T> {
    inner: Mutex<QueueInner<T>>,
    available: Notify,
    capacity: usize,
}

impl<T: Delayed> DelayQueue<T> {
    /// Creates an empty queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            available: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts an item
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The item was queued
    /// * `Err(OfferError::Full)` - The queue is at capacity
    /// * `Err(OfferError::Closed)` - The queue no longer accepts items
    pub fn offer(&self, item: T) -> Result<(), OfferError<T>> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(OfferError::Closed(item));
            }
            if inner.heap.len() >= self.capacity {
                return Err(OfferError::Full(item));
            }

            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(Entry {
                deadline: item.deadline(),
                seq,
                item,
            });
        }

        self.available.notify_one();
        Ok(())
    }

    /// Waits for the earliest item to become due and removes it
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn take(&self) -> Option<T> {
        loop {
            let next_deadline = {
                let mut inner = self.lock();
                match inner.heap.peek().map(|entry| entry.deadline) {
                    Some(deadline) if deadline <= Instant::now() => {
                        return inner.heap.pop().map(|entry| entry.item);
                    }
                    Some(deadline) => Some(deadline),
                    None if inner.closed => return None,
                    None => None,
                }
            };

            match next_deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = self.available.notified() => {}
                    }
                }
                None => self.available.notified().await,
            }
        }
    }

    /// Stops accepting items
    ///
    /// Items already queued can still be taken.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_one();
    }

    /// Returns whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Removes every queued item, due or not
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.lock();
        std::mem::take(&mut inner.heap)
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|entry| entry.item)
            .collect()
    }

    /// Deadline of the earliest queued item
    pub fn peek_deadline(&self) -> Option<Instant> {
        self.lock().heap.peek().map(|entry| entry.deadline)
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
