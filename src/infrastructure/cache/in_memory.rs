use crate::core::errors::LedgerError;
use crate::infrastructure::cache::ShapeCache;
use crate::infrastructure::cache::cache_keys::shape_key;
use crate::infrastructure::schema::ShapeDescriptor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryShapeCache {
    cache: Arc<RwLock<HashMap<String, (ShapeDescriptor, chrono::DateTime<chrono::Utc>)>>>,
}

impl InMemoryShapeCache {
    pub fn new() -> Self {
        InMemoryShapeCache {
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl ShapeCache for InMemoryShapeCache {
    async fn get_shape(&self, entity: &str) -> Result<Option<ShapeDescriptor>, LedgerError> {
        let cache = self.cache.read().await;
        Ok(cache.get(&shape_key(entity)).map(|(shape, _)| shape.clone()))
    }

    async fn save_shape(&self, entity: &str, shape: &ShapeDescriptor) -> Result<(), LedgerError> {
        let mut cache = self.cache.write().await;
        cache.insert(shape_key(entity), (shape.clone(), chrono::Utc::now()));
        Ok(())
    }

    async fn invalidate_shape(&self, entity: &str) -> Result<(), LedgerError> {
        let mut cache = self.cache.write().await;
        cache.remove(&shape_key(entity));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalidation_forgets_only_that_entity() {
        let cache = InMemoryShapeCache::new();
        cache.save_shape("payment", &ShapeDescriptor::new("payments")).await.unwrap();
        cache.save_shape("expense", &ShapeDescriptor::new("expenses")).await.unwrap();

        cache.invalidate_shape("payment").await.unwrap();

        assert!(cache.get_shape("payment").await.unwrap().is_none());
        assert_eq!(
            cache.get_shape("expense").await.unwrap(),
            Some(ShapeDescriptor::new("expenses"))
        );
        assert_eq!(cache.len().await, 1);
    }
}
