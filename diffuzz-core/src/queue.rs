//! Bounded multi-producer, multi-consumer work queue
//!
//! A thin layer over a bounded `tokio::sync::mpsc` channel. Producers block
//! in [`WorkQueue::send`] while the queue is full, which is what couples the
//! generation rate to the execution rate. Consumers share the receiver
//! behind an async mutex. Closing is explicit: [`WorkQueue::close`] is called
//! once by the last producer to exit, after which consumers drain what is
//! buffered and then see `None`.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Returned by [`WorkQueue::send`] when the queue no longer accepts items.
/// Hands the item back so the caller can dispose of it.
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

pub struct WorkQueue<T> {
    name: &'static str,
    sender: Mutex<Option<mpsc::Sender<T>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<T>>,
    closed: AtomicBool,
}

impl<T: Send> WorkQueue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            name,
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue `item`, waiting while the queue is full.
    pub async fn send(&self, item: T) -> Result<(), QueueClosed<T>> {
        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => sender
                .send(item)
                .await
                .map_err(|mpsc::error::SendError(item)| QueueClosed(item)),
            None => Err(QueueClosed(item)),
        }
    }

    /// Dequeue the next item. Returns `None` once the queue is closed and
    /// everything buffered has been handed out.
    pub async fn recv(&self) -> Option<T> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    /// Stop accepting items. Returns true for the call that closed the queue.
    pub fn close(&self) -> bool {
        let sender = self.sender.lock().take();
        let closed_now = sender.is_some();
        if closed_now {
            self.closed.store(true, Ordering::Release);
            debug!(queue = self.name, "Closing queue");
        }
        closed_now
    }

    /// Close from the consumer side once no consumer is left, so producers
    /// blocked on a full queue are released with [`QueueClosed`]. Buffered
    /// items stay available to [`WorkQueue::drain`].
    pub fn close_receiving(&self) -> bool {
        match self.receiver.try_lock() {
            Ok(mut receiver) => {
                receiver.close();
                self.closed.store(true, Ordering::Release);
                debug!(queue = self.name, "Closed queue from the consumer side");
                true
            }
            Err(_) => false,
        }
    }

    /// Take every buffered item without waiting. Returns nothing while a
    /// consumer is parked in [`WorkQueue::recv`].
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::new();
        if let Ok(mut receiver) = self.receiver.try_lock() {
            while let Ok(item) = receiver.try_recv() {
                items.push(item);
            }
        }
        trace!(queue = self.name, drained = items.len(), "Drained queue");
        items
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Items currently buffered. Reported as zero once the producer side is
    /// closed.
    pub fn len(&self) -> usize {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.max_capacity() - sender.capacity(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
