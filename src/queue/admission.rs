//! Admission control bounding the number of in-flight requests
//!
//! Slots are handed over directly from a finishing request to the head of the
//! wait queue, so a release admits exactly one waiter and the queue alone
//! decides admission order.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;
use utoipa::ToSchema;

struct Waiter {
    ticket: u64,
    tx: oneshot::Sender<u64>,
}

struct AdmissionState {
    active: usize,
    waiters: VecDeque<Waiter>,
    next_ticket: u64,
    next_sequence: u64,
    total_admitted: u64,
    total_queued: u64,
}

impl AdmissionState {
    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

/// Point-in-time view of the admission state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AdmissionSnapshot {
    pub active: usize,
    pub queued: usize,
    pub max_concurrent: usize,
    pub total_admitted: u64,
    pub total_queued: u64,
}

/// Global concurrency bound with a FIFO wait queue
pub struct AdmissionControl {
    max_concurrent: usize,
    state: Mutex<AdmissionState>,
}

impl AdmissionControl {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            max_concurrent: max_concurrent.max(1),
            state: Mutex::new(AdmissionState {
                active: 0,
                waiters: VecDeque::new(),
                next_ticket: 0,
                next_sequence: 0,
                total_admitted: 0,
                total_queued: 0,
            }),
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Wait for a concurrency slot.
    ///
    /// Admits immediately when a slot is free and nobody is queued; otherwise
    /// joins the back of the queue. Dropping the returned permit frees the slot.
    pub async fn acquire(self: &Arc<Self>) -> AdmissionPermit {
        loop {
            let (ticket, rx) = {
                let mut state = self.state.lock();
                if state.active < self.max_concurrent && state.waiters.is_empty() {
                    state.active += 1;
                    state.total_admitted += 1;
                    let sequence = state.take_sequence();
                    return AdmissionPermit {
                        control: self.clone(),
                        sequence,
                        queued: false,
                    };
                }

                let ticket = state.next_ticket;
                state.next_ticket += 1;
                state.total_queued += 1;
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(Waiter { ticket, tx });
                (ticket, rx)
            };

            let mut waiting = QueuedWaiter {
                control: &**self,
                ticket,
                rx,
                done: false,
            };

            let received = (&mut waiting.rx).await;
            waiting.done = true;

            if let Ok(sequence) = received {
                return AdmissionPermit {
                    control: self.clone(),
                    sequence,
                    queued: true,
                };
            }
            // The sender vanished without a handoff; queue up again.
        }
    }

    /// Give a freed slot to the queue head, or return it to the pool
    fn release_locked(state: &mut AdmissionState) {
        while let Some(waiter) = state.waiters.pop_front() {
            let sequence = state.take_sequence();
            if waiter.tx.send(sequence).is_ok() {
                state.total_admitted += 1;
                return;
            }
        }
        state.active = state.active.saturating_sub(1);
    }

    fn release(&self) {
        let mut state = self.state.lock();
        Self::release_locked(&mut state);
        debug_assert!(state.active <= self.max_concurrent);
    }

    pub fn active(&self) -> usize {
        self.state.lock().active
    }

    pub fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        let state = self.state.lock();
        AdmissionSnapshot {
            active: state.active,
            queued: state.waiters.len(),
            max_concurrent: self.max_concurrent,
            total_admitted: state.total_admitted,
            total_queued: state.total_queued,
        }
    }
}

/// Removes a cancelled waiter from the queue, or passes on a slot it was
/// handed but never used.
struct QueuedWaiter<'a> {
    control: &'a AdmissionControl,
    ticket: u64,
    rx: oneshot::Receiver<u64>,
    done: bool,
}

impl Drop for QueuedWaiter<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        let mut state = self.control.state.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.ticket == self.ticket) {
            state.waiters.remove(pos);
            return;
        }

        if self.rx.try_recv().is_ok() {
            AdmissionControl::release_locked(&mut state);
        }
    }
}

/// A held concurrency slot; released on drop
pub struct AdmissionPermit {
    control: Arc<AdmissionControl>,
    sequence: u64,
    queued: bool,
}

impl AdmissionPermit {
    /// Position in overall admission order
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the request waited in the queue before admission
    pub fn was_queued(&self) -> bool {
        self.queued
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.control.release();
    }
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("sequence", &self.sequence)
            .field("queued", &self.queued)
            .finish()
    }
}
