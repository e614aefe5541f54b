use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    tracing::{error, warn},
};

/// Plain-text HTTP error for the trigger routes.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<herald_proactive::Error> for ApiError {
    fn from(err: herald_proactive::Error) -> Self {
        use herald_proactive::Error;

        let status = match &err {
            Error::UnresolvableIdentity { .. } | Error::InvalidInput { .. } => {
                StatusCode::BAD_REQUEST
            },
            Error::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::PlatformCallFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::NotConfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, status = status.as_u16(), "trigger failed");
        } else {
            warn!(error = %err, status = status.as_u16(), "trigger rejected");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, herald_proactive::Error};

    #[test]
    fn maps_taxonomy_to_status() {
        let cases = [
            (Error::unresolvable("x"), StatusCode::BAD_REQUEST),
            (Error::invalid_input("x"), StatusCode::BAD_REQUEST),
            (
                Error::from(herald_store::Error::unavailable(std::io::Error::other("down"))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                Error::platform("send")(herald_msteams::Error::Token {
                    status: 401,
                    body: String::new(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (Error::not_configured("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }
}
