//! Hot-reloadable config holder.
//!
//! `ConfigStore<T>` keeps the current value behind an `RwLock` and bumps a
//! version on a `watch` channel whenever it is replaced, so long-running
//! loops can `select!` on a change instead of re-reading on a timer.

use std::sync::Arc;
use tokio::sync::{RwLock, watch};

pub struct ConfigStore<T> {
    inner: Arc<Shared<T>>,
}

struct Shared<T> {
    value: RwLock<T>,
    version_tx: watch::Sender<u64>,
}

/// Change notifications for one [`ConfigStore`].
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(Shared {
                value: RwLock::new(initial),
                version_tx,
            }),
        }
    }

    /// Swap in a new value and wake every watcher.
    pub async fn update(&self, value: T) {
        *self.inner.value.write().await = value;
        self.inner.version_tx.send_modify(|version| *version += 1);
    }

    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }
}

impl<T: Clone> ConfigStore<T> {
    /// Clone of the current value, without holding the lock.
    pub async fn snapshot(&self) -> T {
        self.inner.value.read().await.clone()
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ConfigWatcher {
    /// Resolves on the next update, or errors once the store is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}
