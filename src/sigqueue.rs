// src/sigqueue.rs

//! In-order delivery of out-of-order completions.
//!
//! Callers register ids with [`Sigqueue::wait_on`] in the order they want
//! results, workers mark them with [`Sigqueue::ready`] in any order, and the
//! receiver returned by [`Sigqueue::new`] yields ids strictly in registration
//! order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::errors::{CaravanError, Result};

#[derive(Default)]
struct State {
    /// Registered, undelivered ids in registration order.
    waiting: VecDeque<u64>,
    /// Registered ids not yet marked ready.
    pending: HashSet<u64>,
    ready: BinaryHeap<Reverse<u64>>,
    /// Ids in `ready`, for constant-time duplicate detection.
    marked: HashSet<u64>,
    last: Option<u64>,
}

impl State {
    /// Pop every id whose turn has come.
    fn drain_deliverable(&mut self) -> Vec<u64> {
        let mut out = Vec::new();
        while let (Some(&head), Some(&Reverse(min))) = (self.waiting.front(), self.ready.peek()) {
            if head != min {
                break;
            }
            self.waiting.pop_front();
            self.ready.pop();
            self.marked.remove(&head);
            out.push(head);
        }
        out
    }
}

pub struct Sigqueue {
    state: Arc<Mutex<State>>,
    wake: Arc<Notify>,
    merger: JoinHandle<()>,
}

impl Sigqueue {
    /// Create a queue and the receiver its ids are delivered on.
    ///
    /// Spawns the merger task, so this must be called from within a tokio
    /// runtime. The merger stops when the queue is dropped or the receiver
    /// is closed.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<u64>) {
        let state = Arc::new(Mutex::new(State::default()));
        let wake = Arc::new(Notify::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let merger = {
            let state = Arc::clone(&state);
            let wake = Arc::clone(&wake);
            tokio::spawn(async move {
                loop {
                    // A stored permit collapses any number of ready() calls
                    // made since the last pass into this one wake.
                    wake.notified().await;
                    let batch = state.lock().drain_deliverable();
                    for id in batch {
                        trace!(id, "sigqueue delivering");
                        if tx.send(id).is_err() {
                            return;
                        }
                    }
                }
            })
        };

        (
            Self {
                state,
                wake,
                merger,
            },
            rx,
        )
    }

    /// Register an expected completion. `id` must exceed every id registered
    /// before it on this queue.
    pub fn wait_on(&self, id: u64) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(last) = state.last {
            if id <= last {
                return Err(CaravanError::OutOfOrderWait { id, last });
            }
        }
        state.last = Some(id);
        state.waiting.push_back(id);
        state.pending.insert(id);
        Ok(())
    }

    /// Mark a registered id complete.
    pub fn ready(&self, id: u64) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !state.pending.remove(&id) {
                if state.marked.contains(&id) {
                    return Err(CaravanError::AlreadyReady(id));
                }
                return Err(CaravanError::NotRegistered(id));
            }
            state.marked.insert(id);
            state.ready.push(Reverse(id));
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Number of registered ids not yet delivered.
    pub fn len(&self) -> usize {
        self.state.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Sigqueue {
    fn drop(&mut self) {
        self.merger.abort();
    }
}

impl fmt::Debug for Sigqueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Sigqueue")
            .field("waiting", &state.waiting)
            .field("ready", &state.ready.len())
            .field("last", &state.last)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn recv(rx: &mut mpsc::UnboundedReceiver<u64>) -> u64 {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("sigqueue delivery timed out")
            .expect("sigqueue channel closed")
    }

    #[tokio::test]
    async fn duplicate_wait_on_is_rejected_without_mutation() {
        let (q, _rx) = Sigqueue::new();
        q.wait_on(5).unwrap();
        match q.wait_on(5) {
            Err(CaravanError::OutOfOrderWait { id: 5, last: 5 }) => {}
            other => panic!("expected OutOfOrderWait, got {other:?}"),
        }
        assert!(matches!(
            q.wait_on(3),
            Err(CaravanError::OutOfOrderWait { id: 3, last: 5 })
        ));
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn out_of_order_ready_delivers_in_registration_order() {
        let (q, mut rx) = Sigqueue::new();
        q.wait_on(5).unwrap();
        q.wait_on(6).unwrap();

        q.ready(6).unwrap();
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "6 must not be delivered before 5");

        q.ready(5).unwrap();
        assert_eq!(recv(&mut rx).await, 5);
        assert_eq!(recv(&mut rx).await, 6);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn ready_protocol_errors() {
        let (q, _rx) = Sigqueue::new();
        assert!(matches!(q.ready(1), Err(CaravanError::NotRegistered(1))));

        q.wait_on(1).unwrap();
        q.wait_on(2).unwrap();
        q.ready(2).unwrap();
        assert!(matches!(q.ready(2), Err(CaravanError::AlreadyReady(2))));
    }

    #[tokio::test]
    async fn delivered_ids_leave_the_ready_set() {
        let (q, mut rx) = Sigqueue::new();
        q.wait_on(1).unwrap();
        q.wait_on(2).unwrap();
        q.ready(1).unwrap();
        q.ready(2).unwrap();
        assert_eq!(recv(&mut rx).await, 1);
        assert_eq!(recv(&mut rx).await, 2);

        {
            let state = q.state.lock();
            assert!(state.marked.is_empty());
            assert!(state.ready.is_empty());
        }
        assert!(matches!(q.ready(2), Err(CaravanError::NotRegistered(2))));
    }

    #[tokio::test]
    async fn many_concurrent_workers_deliver_in_order() {
        let (q, mut rx) = Sigqueue::new();
        let q = Arc::new(q);
        for id in 1..=50 {
            q.wait_on(id).unwrap();
        }

        let mut handles = Vec::new();
        for id in (1..=50).rev() {
            let q = Arc::clone(&q);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(id % 7)).await;
                q.ready(id).unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        for expected in 1..=50 {
            assert_eq!(recv(&mut rx).await, expected);
        }
    }
}
