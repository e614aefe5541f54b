//! Table store trait and the entity shape shared by all backends.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize, de::DeserializeOwned},
};

use crate::{Error, Result};

/// A single stored record: a partition/row address plus a flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub partition_key: String,
    pub row_key: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Build an entity whose fields are the serialized form of `value`.
    ///
    /// `value` must serialize to a JSON object.
    pub fn from_value<T: Serialize>(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        value: &T,
    ) -> Result<Self> {
        let serde_json::Value::Object(fields) = serde_json::to_value(value)? else {
            return Err(Error::Message {
                message: "entity fields must serialize to a JSON object".into(),
            });
        };
        Ok(Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            fields,
        })
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(serde_json::Value::as_str)
    }

    /// Decode the fields back into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.fields.clone(),
        ))?)
    }
}

/// Durable keyed storage with basic insert/read semantics and no transactions.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create `table` unless it already exists.
    async fn create_table_if_absent(&self, table: &str) -> Result<()>;

    /// Insert a new entity; fails with [`Error::Conflict`] if the address is taken.
    async fn insert(&self, table: &str, entity: Entity) -> Result<()>;

    /// Insert or replace an entity. The last writer wins.
    async fn upsert(&self, table: &str, entity: Entity) -> Result<()>;

    /// Point read; fails with [`Error::NotFound`] if the address is empty.
    async fn retrieve(&self, table: &str, partition_key: &str, row_key: &str) -> Result<Entity>;
}

/// Table names follow cloud table rules: 3–63 ASCII alphanumerics, leading letter.
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid = (3..=63).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTableName {
            name: name.to_string(),
        })
    }
}
