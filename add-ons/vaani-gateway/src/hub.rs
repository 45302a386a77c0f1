//! Connection hub: one coordinating task owning the set of live client ids.
//!
//! Clients never share state directly; they register and unregister through a
//! command channel, and health reporting asks the hub for a count. The hub
//! task is the only owner of the set, so no lock is needed.

use tokio::sync::{mpsc, oneshot};

const COMMAND_CAPACITY: usize = 64;

enum HubCommand {
    Register { id: u64 },
    Unregister { id: u64 },
    Count { reply: oneshot::Sender<usize> },
}

/// Handle to the hub task. Cheap to clone; all handles feed the same task.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::Sender<HubCommand>,
}

impl Hub {
    /// Spawn the coordinating task and return its handle.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel(COMMAND_CAPACITY);
        tokio::spawn(async move {
            let mut clients = std::collections::HashSet::new();
            while let Some(command) = rx.recv().await {
                match command {
                    HubCommand::Register { id } => {
                        clients.insert(id);
                        tracing::info!(
                            target: "vaani::hub",
                            client_id = id,
                            total = clients.len(),
                            "client registered"
                        );
                    }
                    HubCommand::Unregister { id } => {
                        clients.remove(&id);
                        tracing::info!(
                            target: "vaani::hub",
                            client_id = id,
                            total = clients.len(),
                            "client unregistered"
                        );
                    }
                    HubCommand::Count { reply } => {
                        let _ = reply.send(clients.len());
                    }
                }
            }
        });
        Self { tx }
    }

    pub async fn register(&self, id: u64) {
        let _ = self.tx.send(HubCommand::Register { id }).await;
    }

    pub async fn unregister(&self, id: u64) {
        let _ = self.tx.send(HubCommand::Unregister { id }).await;
    }

    pub async fn count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubCommand::Count { reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_unregister_update_count() {
        let hub = Hub::spawn();
        assert_eq!(hub.count().await, 0);

        hub.register(1).await;
        hub.register(2).await;
        assert_eq!(hub.count().await, 2);

        hub.unregister(1).await;
        assert_eq!(hub.count().await, 1);

        // Re-registering the same id is a no-op for the count.
        hub.register(2).await;
        assert_eq!(hub.count().await, 1);
    }
}
