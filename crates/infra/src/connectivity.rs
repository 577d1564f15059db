//! Reachability source driven by the host platform.
//!
//! Platform network callbacks (or tests) call [`ManualConnectivity::set_online`];
//! the queue processor observes the transitions through a watch channel.

use relayq_core::ConnectivityMonitor;
use tokio::sync::watch;
use tracing::info;

/// Connectivity monitor backed by a `watch` channel.
///
/// Repeated reports of the same status are swallowed, so subscribers see at
/// most one event per real transition.
#[derive(Debug)]
pub struct ManualConnectivity {
    sender: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    /// Record the current reachability. Returns true when this was a
    /// transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });

        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }
}

impl Default for ManualConnectivity {
    /// Starts offline until the platform reports otherwise.
    fn default() -> Self {
        Self::new(false)
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}
