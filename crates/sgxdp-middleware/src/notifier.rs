//! The Notifier seam between the scan engine and the registration authority.
//!
//! The engine never talks to the node agent directly.  After every scan it
//! hands the complete [`DeviceTree`] to a [`Notifier`]; what happens next
//! (diffing, gRPC `ListAndWatch` updates, logging) is the notifier's job.
//!
//! [`BroadcastNotifier`] fans snapshots out over a [`tokio::sync::broadcast`]
//! channel so any number of consumers can observe them without blocking the
//! scan loop.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sgxdp_types::DeviceTree;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default channel capacity (number of buffered snapshots before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 16;

/// Receives every freshly built [`DeviceTree`].
///
/// # Contract
///
/// * Called once per scan, including when the tree is empty: an empty tree
///   means "nothing available right now" and must retract stale
///   advertisements.
/// * One-way: the engine does not wait for, or react to, downstream
///   registration outcomes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, tree: &DeviceTree);
}

/// One published snapshot.
#[derive(Debug, Clone)]
pub struct TreeUpdate {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tree: Arc<DeviceTree>,
}

/// [`Notifier`] backed by a broadcast channel.  Clone it cheaply – all clones
/// share the same channel.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<TreeUpdate>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> TreeSubscriber {
        TreeSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish `tree` and return the number of subscribers that received it.
    /// Having no subscribers is a normal condition and returns `0`.
    pub fn publish(&self, tree: &DeviceTree) -> usize {
        let update = TreeUpdate {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            tree: Arc::new(tree.clone()),
        };
        match self.sender.send(update) {
            Ok(n) => n,
            Err(broadcast::error::SendError(update)) => {
                debug!(update_id = %update.id, "no subscribers for device tree update");
                0
            }
        }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, tree: &DeviceTree) {
        self.publish(tree);
    }
}

/// Receiving half obtained from [`BroadcastNotifier::subscribe`].
pub struct TreeSubscriber {
    receiver: broadcast::Receiver<TreeUpdate>,
}

impl TreeSubscriber {
    /// Wait for the next snapshot.
    ///
    /// A lagging subscriber skips straight to the newer snapshots since each
    /// one is complete on its own.  Returns `None` once every
    /// [`BroadcastNotifier`] clone has been dropped.
    pub async fn recv(&mut self) -> Option<TreeUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "device tree subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
