use crate::backends::{BackendRegistry, Voice};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Live view of every registered engine's voices.
///
/// An engine that cannot enumerate (missing credentials, unreachable server)
/// contributes nothing; the rest of the catalog is still returned.
pub struct VoiceCatalog {
    registry: Arc<BackendRegistry>,
    timeout: Duration,
}

impl VoiceCatalog {
    pub fn new(registry: Arc<BackendRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Voices grouped by engine, in registration order.
    pub async fn list_voices(&self) -> Vec<Voice> {
        let queries = self.registry.iter().map(|backend| async move {
            let engine = backend.engine();
            match tokio::time::timeout(self.timeout, backend.list_voices()).await {
                Ok(Ok(voices)) => voices
                    .into_iter()
                    .map(|voice| Voice { engine, ..voice })
                    .collect(),
                Ok(Err(e)) => {
                    warn!("Failed to get {} voices: {}", engine, e);
                    Vec::new()
                }
                Err(_) => {
                    warn!("Timed out listing {} voices", engine);
                    Vec::new()
                }
            }
        });

        join_all(queries).await.into_iter().flatten().collect()
    }
}
