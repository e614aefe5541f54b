//! SQLite-backed table store using sqlx.
//!
//! Each logical table becomes one SQL table keyed by
//! `(partition_key, row_key)`; entity fields are kept as a JSON document.

use {
    async_trait::async_trait,
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
    tracing::debug,
};

use crate::{
    Error, Result,
    error::Context,
    store::{Entity, TableStore, validate_table_name},
};

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// SQLite-backed persistence for table entities.
pub struct SqliteTableStore {
    pool: SqlitePool,
}

impl SqliteTableStore {
    /// Open a store with its own connection pool.
    ///
    /// In-memory databases are pinned to a single long-lived connection, since
    /// every SQLite connection to `:memory:` is a separate database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(database_url).await?;
        debug!(database_url, "connected table store");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn map_write_error(err: sqlx::Error, table: &str, entity: &Entity) -> Error {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::conflict(table, &entity.partition_key, &entity.row_key)
            },
            _ => Self::map_error(err, table),
        }
    }

    fn map_error(err: sqlx::Error, table: &str) -> Error {
        match &err {
            sqlx::Error::Database(db) if db.message().contains("no such table") => {
                Error::TableNotFound {
                    table: table.to_string(),
                }
            },
            _ => Error::unavailable(err),
        }
    }

    async fn write(&self, table: &str, entity: Entity, replace: bool) -> Result<()> {
        validate_table_name(table)?;
        let data = serde_json::to_string(&entity.fields)?;
        let sql = if replace {
            format!(
                "INSERT INTO \"{table}\" (partition_key, row_key, data, created_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(partition_key, row_key) DO UPDATE SET
                    data = excluded.data,
                    created_at = excluded.created_at"
            )
        } else {
            format!(
                "INSERT INTO \"{table}\" (partition_key, row_key, data, created_at)
                 VALUES (?, ?, ?, ?)"
            )
        };
        sqlx::query(&sql)
            .bind(&entity.partition_key)
            .bind(&entity.row_key)
            .bind(&data)
            .bind(unix_now())
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, table, &entity))?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn create_table_if_absent(&self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                partition_key TEXT    NOT NULL,
                row_key       TEXT    NOT NULL,
                data          TEXT    NOT NULL,
                created_at    INTEGER NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            )"
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        debug!(table, "table ready");
        Ok(())
    }

    async fn insert(&self, table: &str, entity: Entity) -> Result<()> {
        self.write(table, entity, false).await
    }

    async fn upsert(&self, table: &str, entity: Entity) -> Result<()> {
        self.write(table, entity, true).await
    }

    async fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Entity> {
        validate_table_name(table)?;
        let sql = format!("SELECT data FROM \"{table}\" WHERE partition_key = ? AND row_key = ?");
        let row = sqlx::query(&sql)
            .bind(partition_key)
            .bind(row_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_error(e, table))?
            .ok_or_else(|| Error::not_found(table, partition_key, row_key))?;

        let data: String = row.get("data");
        let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&data)
            .with_context(|| format!("corrupt entity {table}/{partition_key}/{row_key}"))?;
        Ok(Entity {
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
            fields,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "proactiveTable";

    async fn make_store() -> SqliteTableStore {
        let store = SqliteTableStore::connect("sqlite::memory:").await.unwrap();
        store.create_table_if_absent(TABLE).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = make_store().await;
        let entity = Entity::new("userReference", "aad-1")
            .with_field("user", "Megan")
            .with_field("reference", "{\"conversation\":{\"id\":\"a:1\"}}");
        store.insert(TABLE, entity.clone()).await.unwrap();

        let got = store.retrieve(TABLE, "userReference", "aad-1").await.unwrap();
        assert_eq!(got, entity);
    }

    #[tokio::test]
    async fn test_sqlite_create_is_idempotent() {
        let store = make_store().await;
        store.create_table_if_absent(TABLE).await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_insert_conflict() {
        let store = make_store().await;
        store.insert(TABLE, Entity::new("userIDs", "k")).await.unwrap();
        let err = store
            .insert(TABLE, Entity::new("userIDs", "k"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_sqlite_upsert_replaces() {
        let store = make_store().await;
        store
            .upsert(TABLE, Entity::new("conversationIDs", "k").with_field("conversationID", "old"))
            .await
            .unwrap();
        store
            .upsert(TABLE, Entity::new("conversationIDs", "k").with_field("conversationID", "new"))
            .await
            .unwrap();
        let got = store.retrieve(TABLE, "conversationIDs", "k").await.unwrap();
        assert_eq!(got.field_str("conversationID"), Some("new"));
    }

    #[tokio::test]
    async fn test_sqlite_not_found() {
        let store = make_store().await;
        let err = store.retrieve(TABLE, "userIDs", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sqlite_missing_table() {
        let store = SqliteTableStore::connect("sqlite::memory:").await.unwrap();
        let err = store.retrieve("neverCreated", "p", "r").await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_sqlite_invalid_table_name() {
        let store = make_store().await;
        let err = store
            .upsert("bad\"name", Entity::new("p", "r"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTableName { .. }));
    }

    #[tokio::test]
    async fn test_sqlite_closed_pool_is_unavailable() {
        let store = make_store().await;
        store.close().await;
        let err = store.retrieve(TABLE, "userIDs", "k").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_sqlite_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("herald.db").display());

        let store = SqliteTableStore::connect(&url).await.unwrap();
        store.create_table_if_absent(TABLE).await.unwrap();
        store
            .insert(TABLE, Entity::new("userIDs", "aad").with_field("id", "29:x"))
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteTableStore::connect(&url).await.unwrap();
        let got = reopened.retrieve(TABLE, "userIDs", "aad").await.unwrap();
        assert_eq!(got.field_str("id"), Some("29:x"));
    }
}
