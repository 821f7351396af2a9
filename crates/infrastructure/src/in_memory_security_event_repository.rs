use async_trait::async_trait;
use oasreg_application::{SecurityEvent, SecurityEventRepository};
use oasreg_core::AppResult;
use tokio::sync::RwLock;

/// In-memory append-only log of security events.
#[derive(Default)]
pub struct InMemorySecurityEventRepository {
    events: RwLock<Vec<SecurityEvent>>,
}

impl InMemorySecurityEventRepository {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every appended event, oldest first.
    pub async fn events(&self) -> Vec<SecurityEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl SecurityEventRepository for InMemorySecurityEventRepository {
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}
