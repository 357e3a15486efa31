//! Conversions from external infrastructure errors into domain errors.

use fluffer_domain::FlufferError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FlufferError);

impl From<InfraError> for FlufferError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FlufferError> for InfraError {
    fn from(value: FlufferError) -> Self {
        InfraError(value)
    }
}

trait IntoFlufferError {
    fn into_fluffer(self) -> FlufferError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → FlufferError */
/* -------------------------------------------------------------------------- */

impl IntoFlufferError for SqlError {
    fn into_fluffer(self) -> FlufferError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => FlufferError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        FlufferError::Database("database is locked".into())
                    }
                    ErrorCode::NotADatabase => {
                        FlufferError::Database("file is not a database".into())
                    }
                    _ => FlufferError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => FlufferError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                FlufferError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                FlufferError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => FlufferError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => FlufferError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_fluffer())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → FlufferError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(FlufferError::Database(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → FlufferError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(FlufferError::Internal(format!("json: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FlufferError */
/* -------------------------------------------------------------------------- */

impl IntoFlufferError for HttpError {
    fn into_fluffer(self) -> FlufferError {
        if self.is_timeout() {
            return FlufferError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return FlufferError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return FlufferError::Internal(format!("failed to decode HTTP response: {self}"));
        }

        if let Some(status) = self.status() {
            let reason = status.canonical_reason().unwrap_or("unknown status");
            return status_error(status.as_u16(), reason);
        }

        FlufferError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_fluffer())
    }
}

/// Map an HTTP status to the domain error taxonomy.
pub fn status_error(code: u16, detail: &str) -> FlufferError {
    let message = format!("HTTP {code} {detail}");
    match code {
        401 | 403 => FlufferError::Auth(message),
        404 => FlufferError::NotFound(message),
        410 => FlufferError::StaleCheckpoint(message),
        429 => FlufferError::RateLimited(message),
        400..=499 => FlufferError::InvalidInput(message),
        _ => FlufferError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: FlufferError = InfraError::from(err).into();
        match mapped {
            FlufferError::Database(msg) => assert!(msg.contains("busy")),
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let mapped: FlufferError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, FlufferError::NotFound(_)));
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert!(matches!(status_error(410, "Gone"), FlufferError::StaleCheckpoint(_)));
        assert!(matches!(status_error(429, "Too Many"), FlufferError::RateLimited(_)));
        assert!(matches!(status_error(400, "Bad"), FlufferError::InvalidInput(_)));
        assert!(matches!(status_error(503, "Unavailable"), FlufferError::Network(_)));
        assert!(status_error(503, "Unavailable").is_transient());
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: FlufferError = InfraError::from(error).into();
        match mapped {
            FlufferError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {:?}", other),
        }
    }
}
