//! Write-database queue.
//!
//! At most one component holds a ledger write transaction at a time. The
//! block processor, the cementer, and the pruner queue here in FIFO order
//! instead of spinning on LMDB's internal writer lock; a waiting writer
//! parks until every guard ahead of it drops.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// The components that take ledger write transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Writer {
    BlockProcessor,
    ConfirmationHeight,
    Pruning,
    OnlineWeight,
    Testing,
}

struct QueueState {
    queue: VecDeque<(u64, Writer)>,
    next_ticket: u64,
}

pub struct WriteQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

/// Held while writing; releasing wakes the next queued writer.
pub struct WriteGuard<'a> {
    queue: &'a WriteQueue,
    ticket: u64,
    writer: Writer,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Join the queue and block until first in line.
    pub fn wait(&self, writer: Writer) -> WriteGuard<'_> {
        let mut state = self.state.lock().expect("write queue lock poisoned");
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back((ticket, writer));
        while state.queue.front().map(|(t, _)| *t) != Some(ticket) {
            state = self
                .condvar
                .wait(state)
                .expect("write queue lock poisoned");
        }
        WriteGuard {
            queue: self,
            ticket,
            writer,
        }
    }

    /// Non-blocking acquire; succeeds only when the queue is idle.
    pub fn try_acquire(&self, writer: Writer) -> Option<WriteGuard<'_>> {
        let mut state = self.state.lock().expect("write queue lock poisoned");
        if !state.queue.is_empty() {
            return None;
        }
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back((ticket, writer));
        Some(WriteGuard {
            queue: self,
            ticket,
            writer,
        })
    }

    /// Whether a writer currently holds or awaits the queue.
    pub fn contains(&self, writer: Writer) -> bool {
        self.state
            .lock()
            .expect("write queue lock poisoned")
            .queue
            .iter()
            .any(|(_, w)| *w == writer)
    }

    fn release(&self, ticket: u64) {
        let mut state = self.state.lock().expect("write queue lock poisoned");
        if let Some(pos) = state.queue.iter().position(|(t, _)| *t == ticket) {
            state.queue.remove(pos);
        }
        drop(state);
        self.condvar.notify_all();
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.queue.release(self.ticket);
    }
}

impl WriteGuard<'_> {
    pub fn writer(&self) -> Writer {
        self.writer
    }
}
