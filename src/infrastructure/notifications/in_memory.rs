use crate::core::errors::LedgerError;
use crate::infrastructure::notifications::{LedgerEvent, Notifier};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Keeps every dispatched event; can be switched into a failing mode to
/// exercise delivery outages.
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    events: Arc<RwLock<Vec<LedgerEvent>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        InMemoryNotifier::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, event: LedgerEvent) -> Result<(), LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::StorageError(format!(
                "notification channel down, dropped {}",
                event.name()
            )));
        }
        self.events.write().await.push(event);
        Ok(())
    }
}
