use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid service URL {url}: {source}")]
    InvalidServiceUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Bot Framework token request failed ({status}): {body}")]
    Token { status: u16, body: String },

    #[error("Teams {operation} failed ({status}): {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Teams {operation} response carried no {field}")]
    IncompleteResponse {
        operation: &'static str,
        field: &'static str,
    },
}

impl Error {
    #[must_use]
    pub fn api(operation: &'static str, status: reqwest::StatusCode, body: String) -> Self {
        Self::Api {
            operation,
            status: status.as_u16(),
            body,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
