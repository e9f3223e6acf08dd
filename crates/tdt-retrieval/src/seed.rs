//! Query seed hand-off between query input and retrieval.
//!
//! The retrieval side awaits a [`SeedReceiver`] until the input side sends
//! the resolved query. There is no timeout; the wait ends when the seed
//! arrives, the sender is dropped, or the shared cancellation token fires.

use std::collections::BTreeSet;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tdt_types::{LabelTable, VertexId, BOUNDARY_VERTEX};

/// A query resolved to vertex ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySeed {
    /// Known query vertices
    pub tokens: BTreeSet<VertexId>,
    /// Terms with no vertex
    pub unknown: Vec<String>,
}

impl QuerySeed {
    /// Seed from already resolved ids.
    pub fn from_ids<I: IntoIterator<Item = VertexId>>(ids: I) -> Self {
        Self {
            tokens: ids.into_iter().filter(|v| *v != BOUNDARY_VERTEX).collect(),
            unknown: Vec::new(),
        }
    }

    /// Resolve query terms against the label table; unknown terms are kept
    /// aside and excluded from the token set.
    pub fn resolve<S: AsRef<str>>(labels: &LabelTable, terms: &[S]) -> Self {
        let (known, unknown) = labels.resolve_all(terms);
        Self {
            tokens: known.into_iter().collect(),
            unknown,
        }
    }

    /// Whether no term resolved.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// How a seed wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedWait {
    /// The query arrived
    Ready(QuerySeed),
    /// The task was cancelled while waiting
    Cancelled,
    /// The input side went away without sending
    Closed,
}

/// Sending half of the seed hand-off.
#[derive(Debug)]
pub struct SeedSender {
    tx: oneshot::Sender<QuerySeed>,
}

impl SeedSender {
    /// Deliver the query. Returns the seed back if the receiver is gone.
    pub fn send(self, seed: QuerySeed) -> Result<(), QuerySeed> {
        debug!(tokens = seed.tokens.len(), "Sending query seed");
        self.tx.send(seed)
    }
}

/// Receiving half of the seed hand-off.
#[derive(Debug)]
pub struct SeedReceiver {
    rx: oneshot::Receiver<QuerySeed>,
}

impl SeedReceiver {
    /// Wait for the query or for cancellation.
    pub async fn wait(self, cancel: &CancellationToken) -> SeedWait {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Seed wait cancelled");
                SeedWait::Cancelled
            }
            seed = self.rx => match seed {
                Ok(seed) => SeedWait::Ready(seed),
                Err(_) => SeedWait::Closed,
            },
        }
    }
}

/// Create a connected sender and receiver.
pub fn seed_channel() -> (SeedSender, SeedReceiver) {
    let (tx, rx) = oneshot::channel();
    (SeedSender { tx }, SeedReceiver { rx })
}
