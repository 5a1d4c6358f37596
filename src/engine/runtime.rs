// src/engine/runtime.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::LoadEvent;
use super::loader::Shared;
use super::transitions;

/// The dispatch loop.
///
/// It is the only place that decides which transition fires next for a
/// package: each event claims the package's transition slot and spawns the
/// body for its current state. Bodies run concurrently and re-enqueue their
/// package when they finish.
pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    events: mpsc::Receiver<LoadEvent>,
}

impl Dispatcher {
    pub(crate) fn new(shared: Arc<Shared>, events: mpsc::Receiver<LoadEvent>) -> Self {
        Self { shared, events }
    }

    pub(crate) async fn run(mut self) {
        info!("loader dispatch loop started");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.shared.stopped() => {
                    info!("shutdown requested; stopping dispatch loop");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("event channel closed; exiting");
                        break;
                    }
                },
            };

            trace!(key = %event.key, reason = ?event.reason, "dispatch received event");
            self.dispatch(event);
        }

        // Unblock any transition still trying to enqueue.
        self.events.close();
        info!("loader dispatch loop exiting");
    }

    fn dispatch(&self, event: LoadEvent) {
        let Some(pkg) = self.shared.caravan.find(event.key) else {
            warn!(key = %event.key, "event for unknown package");
            return;
        };
        let Some(ticket) = pkg.begin_transition() else {
            return;
        };

        debug!(
            key = %event.key,
            path = %pkg.abs_path().display(),
            from = %ticket.from,
            reason = ?event.reason,
            "starting transition"
        );
        tokio::spawn(transitions::run(Arc::clone(&self.shared), pkg, ticket));
    }
}
