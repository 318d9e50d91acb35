//! # Subscriber Queues
//!
//! Bounded drop-oldest queue per subscriber. The publisher side never
//! blocks: when a queue is full the oldest buffered event is discarded and
//! the stream is marked gapped, so the subscriber learns it missed events
//! before it sees anything newer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use super::event::RecordEvent;

/// What a subscriber receives from its stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// A committed mutation
    Event(RecordEvent),
    /// Buffered events were dropped; the stream has a hole here
    Gap,
}

/// Outcome of a push, for the publisher's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Delivered,
    DroppedOldest,
    Closed,
}

pub(crate) struct SubscriberQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

struct QueueInner {
    buf: VecDeque<RecordEvent>,
    gapped: bool,
    closed: bool,
}

impl SubscriberQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                buf: VecDeque::new(),
                gapped: false,
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue an event without ever blocking the publisher.
    pub(crate) fn push(&self, event: RecordEvent) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            if inner.closed {
                return PushOutcome::Closed;
            }
            let outcome = if inner.buf.len() >= self.capacity {
                inner.buf.pop_front();
                inner.gapped = true;
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Delivered
            };
            inner.buf.push_back(event);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Receive the next message. A pending gap is surfaced before any
    /// buffered event that survived the drop. Returns `None` once the queue
    /// is closed and drained.
    pub(crate) async fn recv(&self) -> Option<BusMessage> {
        loop {
            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                if inner.gapped {
                    inner.gapped = false;
                    return Some(BusMessage::Gap);
                }
                if let Some(event) = inner.buf.pop_front() {
                    return Some(BusMessage::Event(event));
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Close the queue and release its buffer.
    pub(crate) fn close(&self) {
        {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            inner.closed = true;
            inner.buf.clear();
        }
        self.notify.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().expect("queue lock poisoned").closed
    }
}

/// A subscriber's receiving end.
pub struct EventStream {
    pub(crate) queue: Arc<SubscriberQueue>,
}

impl EventStream {
    /// Receive the next message; `None` when the subscription is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.queue.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        // Dropping the stream ends the subscription's delivery; the bus
        // prunes the closed entry on its next publish to the collection.
        self.queue.close();
    }
}
