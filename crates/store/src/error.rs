use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("entity not found: {table}/{partition_key}/{row_key}")]
    NotFound {
        table: String,
        partition_key: String,
        row_key: String,
    },

    #[error("entity already exists: {table}/{partition_key}/{row_key}")]
    Conflict {
        table: String,
        partition_key: String,
        row_key: String,
    },

    #[error("invalid table name: {name}")]
    InvalidTableName { name: String },

    #[error("table does not exist: {table}")]
    TableNotFound { table: String },

    #[error("store unavailable: {source}")]
    Unavailable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn not_found(table: &str, partition_key: &str, row_key: &str) -> Self {
        Self::NotFound {
            table: table.to_string(),
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        }
    }

    #[must_use]
    pub fn conflict(table: &str, partition_key: &str, row_key: &str) -> Self {
        Self::Conflict {
            table: table.to_string(),
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable {
            source: Box::new(source),
        }
    }

    /// `true` for the expected "no such entity" outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl herald_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::unavailable(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

herald_common::impl_context!();
