//! In-memory table store for testing.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    store::{Entity, TableStore, validate_table_name},
};

type Key = (String, String, String);

/// In-memory store backed by `HashMap`. No persistence, for tests only.
pub struct InMemoryTableStore {
    tables: Mutex<HashSet<String>>,
    entities: Mutex<HashMap<Key, Entity>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashSet::new()),
            entities: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entities stored in `table` under `partition_key`.
    pub fn partition_len(&self, table: &str, partition_key: &str) -> usize {
        let entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        entities
            .keys()
            .filter(|(t, p, _)| t == table && p == partition_key)
            .count()
    }

    fn ensure_table(&self, table: &str) -> Result<()> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if tables.contains(table) {
            Ok(())
        } else {
            Err(Error::TableNotFound {
                table: table.to_string(),
            })
        }
    }

    fn key(table: &str, entity: &Entity) -> Key {
        (
            table.to_string(),
            entity.partition_key.clone(),
            entity.row_key.clone(),
        )
    }
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn create_table_if_absent(&self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.insert(table.to_string());
        Ok(())
    }

    async fn insert(&self, table: &str, entity: Entity) -> Result<()> {
        self.ensure_table(table)?;
        let mut entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        let key = Self::key(table, &entity);
        if entities.contains_key(&key) {
            return Err(Error::conflict(table, &key.1, &key.2));
        }
        entities.insert(key, entity);
        Ok(())
    }

    async fn upsert(&self, table: &str, entity: Entity) -> Result<()> {
        self.ensure_table(table)?;
        let mut entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        entities.insert(Self::key(table, &entity), entity);
        Ok(())
    }

    async fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Entity> {
        self.ensure_table(table)?;
        let entities = self.entities.lock().unwrap_or_else(|e| e.into_inner());
        entities
            .get(&(
                table.to_string(),
                partition_key.to_string(),
                row_key.to_string(),
            ))
            .cloned()
            .ok_or_else(|| Error::not_found(table, partition_key, row_key))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn make_store() -> InMemoryTableStore {
        let store = InMemoryTableStore::new();
        store.create_table_if_absent("proactiveTable").await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_then_retrieve() {
        let store = make_store().await;
        let entity = Entity::new("userIDs", "aad-1").with_field("id", "29:one");
        store.insert("proactiveTable", entity.clone()).await.unwrap();

        let got = store
            .retrieve("proactiveTable", "userIDs", "aad-1")
            .await
            .unwrap();
        assert_eq!(got, entity);
    }

    #[tokio::test]
    async fn insert_conflict() {
        let store = make_store().await;
        let entity = Entity::new("userIDs", "aad-1");
        store.insert("proactiveTable", entity.clone()).await.unwrap();
        let err = store.insert("proactiveTable", entity).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[tokio::test]
    async fn upsert_last_writer_wins() {
        let store = make_store().await;
        store
            .upsert(
                "proactiveTable",
                Entity::new("conversationIDs", "u").with_field("conversationID", "a:1"),
            )
            .await
            .unwrap();
        store
            .upsert(
                "proactiveTable",
                Entity::new("conversationIDs", "u").with_field("conversationID", "a:2"),
            )
            .await
            .unwrap();

        let got = store
            .retrieve("proactiveTable", "conversationIDs", "u")
            .await
            .unwrap();
        assert_eq!(got.field_str("conversationID"), Some("a:2"));
        assert_eq!(store.partition_len("proactiveTable", "conversationIDs"), 1);
    }

    #[tokio::test]
    async fn retrieve_missing_is_not_found() {
        let store = make_store().await;
        let err = store
            .retrieve("proactiveTable", "userReference", "nobody")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn partitions_are_independent() {
        let store = make_store().await;
        store
            .insert("proactiveTable", Entity::new("userIDs", "same"))
            .await
            .unwrap();
        store
            .insert("proactiveTable", Entity::new("userReference", "same"))
            .await
            .unwrap();
        assert_eq!(store.partition_len("proactiveTable", "userIDs"), 1);
        assert_eq!(store.partition_len("proactiveTable", "userReference"), 1);
    }

    #[tokio::test]
    async fn unknown_table_rejected() {
        let store = InMemoryTableStore::new();
        let err = store
            .upsert("missingTable", Entity::new("p", "r"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TableNotFound { .. }));
    }
}
