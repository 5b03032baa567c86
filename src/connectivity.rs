//! Connectivity oracle.
//!
//! Online/offline is an external fact the sync manager reacts to, never
//! decides. [`Connectivity`] wraps whatever signal the embedder has (a
//! browser online event, a heartbeat prober) behind a current-value read
//! plus a watch channel for transitions.

use tokio::sync::watch;

pub trait Connectivity: Send + Sync {
    /// Current belief about connectivity.
    fn is_online(&self) -> bool;

    /// Subscribe to transitions. The receiver yields the latest value,
    /// not one event per flap.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Manually driven connectivity, for tests and for embedders that learn
/// about transitions from outside the process.
pub struct SwitchableConnectivity {
    tx: watch::Sender<bool>,
}

impl SwitchableConnectivity {
    pub fn new(initially_online: bool) -> Self {
        Self {
            tx: watch::Sender::new(initially_online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }
}

impl Connectivity for SwitchableConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
