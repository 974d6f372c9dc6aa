//! The work queue shared by readers and processors.
//!
//! Items travel through a bounded `crossbeam_channel`, so `put` blocks once
//! `capacity` items are waiting; that is the readers' backpressure. A
//! separate counter tracks every item (sentinels included) that has been
//! put but not yet acknowledged with [WorkQueue::task_done], and
//! [WorkQueue::join_all] waits for it to reach zero.
//!
//! ```text
//! reader 1 ─┐                         ┌─> processor 1
//!           ├─> [ bounded channel ] ──┼─> processor 2
//! reader 2 ─┘                         └─> processor N
//! ```

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

/// What a processor pulls off the queue.
#[derive(Debug)]
pub enum Message<T> {
    Item(T),
    /// No more work for the processor that receives it.
    Sentinel,
}

pub struct WorkQueue<T> {
    sender: Sender<Message<T>>,
    receiver: Receiver<Message<T>>,
    unfinished: Mutex<usize>,
    all_done: Condvar,
}

impl<T> WorkQueue<T> {
    ///
    /// Create a queue that holds at most `capacity` waiting messages.
    ///
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        WorkQueue {
            sender,
            receiver,
            unfinished: Mutex::new(0),
            all_done: Condvar::new(),
        }
    }

    /// Enqueue a real item, blocking while the queue is full.
    pub fn put(&self, item: T) {
        self.send(Message::Item(item));
    }

    /// Enqueue one stop marker.
    pub fn put_sentinel(&self) {
        self.send(Message::Sentinel);
    }

    fn send(&self, message: Message<T>) {
        *self.unfinished.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        // the queue owns a receiver, so the channel never disconnects
        if self.sender.send(message).is_err() {
            self.task_done();
        }
    }

    /// Dequeue the next message, blocking until one is available.
    pub fn get(&self) -> Message<T> {
        self.receiver.recv().unwrap_or(Message::Sentinel)
    }

    /// Like [WorkQueue::get], giving up after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Option<Message<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Some(message),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Message::Sentinel),
        }
    }

    /// Acknowledge one dequeued message.
    pub fn task_done(&self) {
        let mut unfinished = self.unfinished.lock().unwrap_or_else(PoisonError::into_inner);
        *unfinished = unfinished.saturating_sub(1);
        if *unfinished == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until every message put so far has been acknowledged.
    pub fn join_all(&self) {
        let unfinished = self.unfinished.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .all_done
            .wait_while(unfinished, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    ///
    /// Stop `workers` consumers: wait until all real work has been
    /// acknowledged, then enqueue exactly one sentinel per consumer.
    ///
    /// No sentinel is enqueued while a real item is still waiting or being
    /// processed, so a consumer can never stop ahead of queued work.
    /// Producers must have finished before this is called.
    ///
    pub fn release_workers(&self, workers: usize) {
        self.join_all();
        for _ in 0..workers {
            self.put_sentinel();
        }
    }

    /// Messages waiting in the channel.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Messages put but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        *self.unfinished.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(usize::MAX)
    }
}

///
/// Acknowledges one message when dropped, so a message is marked done on
/// every exit path of the code handling it.
///
pub struct Ack<'a, T> {
    queue: &'a WorkQueue<T>,
}

impl<'a, T> Ack<'a, T> {
    pub fn new(queue: &'a WorkQueue<T>) -> Self {
        Ack { queue }
    }
}

impl<T> Drop for Ack<'_, T> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}
