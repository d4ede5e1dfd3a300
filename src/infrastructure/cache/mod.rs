pub mod cache_keys;
pub mod in_memory;

use crate::core::errors::LedgerError;
use crate::infrastructure::schema::ShapeDescriptor;
use async_trait::async_trait;

/// Per-process memory of which table shape each entity resolved to.
#[async_trait]
pub trait ShapeCache: Send + Sync {
    async fn get_shape(&self, entity: &str) -> Result<Option<ShapeDescriptor>, LedgerError>;
    async fn save_shape(&self, entity: &str, shape: &ShapeDescriptor) -> Result<(), LedgerError>;
    async fn invalidate_shape(&self, entity: &str) -> Result<(), LedgerError>;
}
