use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::api::Backend;
use crate::controller::{RefreshOutcome, RefreshSequencer, fetch_cycle};

type Cycle = Pin<Box<dyn Future<Output = RefreshOutcome> + Send>>;

/// The recurring refresh timer.
///
/// Cycles run inside the timer task itself, so stopping the task also
/// drops whatever cycle is still waiting on the backend. A new tick does
/// not wait for the previous cycle to finish.
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<B: Backend + 'static>(
        backend: Arc<B>,
        sequencer: Arc<RefreshSequencer>,
        every: Duration,
        outcomes: mpsc::UnboundedSender<RefreshOutcome>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight: FuturesUnordered<Cycle> = FuturesUnordered::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let seq = sequencer.next();
                        debug!(seq, "Refresh tick");
                        let backend = Arc::clone(&backend);
                        in_flight.push(Box::pin(async move { fetch_cycle(backend.as_ref(), seq).await }));
                    }
                    Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                        if outcomes.send(outcome).is_err() {
                            // Receiver gone, nobody is looking at the view.
                            break;
                        }
                    }
                }
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
