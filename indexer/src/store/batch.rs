//! Per-block write overlay.

use std::collections::HashMap;

use super::{EntityStore, StoreResult};
use crate::entities::{Entity, EntityKey, StoredEntity};

/// Pending writes of one block on top of a committed store.
///
/// Reads see the batch's own writes first. Writes are last-write-wins per
/// key and are only visible to the store after [`BlockBatch::into_writes`]
/// is committed.
pub struct BlockBatch<'a, S: EntityStore + ?Sized> {
    store: &'a S,
    pending: HashMap<EntityKey, Entity>,
    order: Vec<EntityKey>,
}

impl<'a, S: EntityStore + ?Sized> BlockBatch<'a, S> {
    /// Creates an empty batch over `store`.
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            pending: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Loads an entity, preferring a pending write over the committed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn load<T: StoredEntity>(&self, id: &str) -> StoreResult<Option<T>> {
        let key = EntityKey::new(T::KIND, id);
        if let Some(entity) = self.pending.get(&key) {
            return Ok(T::from_entity(entity.clone()));
        }
        Ok(self.store.load(&key).await?.and_then(T::from_entity))
    }

    /// Stages a full entity write.
    pub fn upsert<T: StoredEntity>(&mut self, entity: T) {
        let entity = entity.into_entity();
        let key = entity.key();
        if !self.pending.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.pending.insert(key, entity);
    }

    /// Returns the number of distinct keys written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Consumes the batch, returning final values in first-write order.
    #[must_use]
    pub fn into_writes(self) -> Vec<Entity> {
        let mut pending = self.pending;
        self.order
            .into_iter()
            .filter_map(|key| pending.remove(&key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Account, Address};
    use crate::events::LedgerCursor;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_batch_reads_own_writes() {
        let store = MemoryStore::new();
        let mut batch = BlockBatch::new(&store);
        let account = Account::new(&Address([1u8; 20]));

        assert!(batch
            .load::<Account>(&account.id)
            .await
            .expect("load")
            .is_none());

        batch.upsert(account.clone());
        let loaded = batch.load::<Account>(&account.id).await.expect("load");
        assert_eq!(loaded, Some(account.clone()));

        // Nothing reaches the store before commit
        assert!(store.get::<Account>(&account.id).await.is_none());
    }

    #[tokio::test]
    async fn test_batch_falls_back_to_store() {
        let store = MemoryStore::new();
        let account = Account::new(&Address([2u8; 20]));
        store
            .commit(vec![account.clone().into_entity()], &LedgerCursor::at_block(1))
            .await
            .expect("commit");

        let batch = BlockBatch::new(&store);
        let loaded = batch.load::<Account>(&account.id).await.expect("load");
        assert_eq!(loaded, Some(account));
    }

    #[tokio::test]
    async fn test_batch_last_write_wins_keeps_first_order() {
        let store = MemoryStore::new();
        let mut batch = BlockBatch::new(&store);

        let a = Account::new(&Address([1u8; 20]));
        let b = Account::new(&Address([2u8; 20]));
        batch.upsert(a.clone());
        batch.upsert(b.clone());
        batch.upsert(Account {
            total_rsvps: 3,
            ..a.clone()
        });

        assert_eq!(batch.len(), 2);
        let writes = batch.into_writes();
        assert_eq!(
            writes,
            vec![
                Account {
                    total_rsvps: 3,
                    ..a
                }
                .into_entity(),
                b.into_entity(),
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_empty() {
        let store = MemoryStore::new();
        let batch = BlockBatch::new(&store);
        assert!(batch.is_empty());
        assert!(batch.into_writes().is_empty());
    }
}
