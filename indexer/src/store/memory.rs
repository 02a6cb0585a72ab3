//! In-process entity store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{EntityStore, StoreResult};
use crate::entities::{Entity, EntityKey, StoredEntity};
use crate::events::LedgerCursor;

#[derive(Debug, Default)]
struct MemoryState {
    entities: HashMap<EntityKey, Entity>,
    cursor: LedgerCursor,
}

/// Entity store kept entirely in memory.
///
/// Commits swap in all writes and the cursor under one write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a committed entity by ID.
    pub async fn get<T: StoredEntity>(&self, id: &str) -> Option<T> {
        let state = self.state.read().await;
        state
            .entities
            .get(&EntityKey::new(T::KIND, id))
            .cloned()
            .and_then(T::from_entity)
    }

    /// Returns the total number of committed entities.
    pub async fn len(&self) -> usize {
        self.state.read().await.entities.len()
    }

    /// Returns true if no entity was committed.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entities.is_empty()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load(&self, key: &EntityKey) -> StoreResult<Option<Entity>> {
        Ok(self.state.read().await.entities.get(key).cloned())
    }

    async fn cursor(&self) -> StoreResult<LedgerCursor> {
        Ok(self.state.read().await.cursor.clone())
    }

    async fn commit(&self, writes: Vec<Entity>, cursor: &LedgerCursor) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for entity in writes {
            state.entities.insert(entity.key(), entity);
        }
        state.cursor = cursor.clone();
        Ok(())
    }
}
