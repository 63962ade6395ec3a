//! Cooperative shutdown signalling between the runner and its workers.

use tokio::sync::watch;

/// Sending half, owned by the runner.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half handed to workers.
///
/// Workers check it between units of work; it never interrupts work in
/// progress.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/receiver pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Ask every worker to stop.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Create another receiver.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested.
    ///
    /// Also returns if the trigger was dropped, which can only happen once
    /// the runner itself is gone.
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_receivers() {
        let (trigger, shutdown) = channel();
        let mut other = trigger.subscribe();

        assert!(!shutdown.is_triggered());
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), other.triggered())
            .await
            .expect("receiver should wake");
        assert!(shutdown.is_triggered());
    }
}
