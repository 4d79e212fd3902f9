//! Structured-body collaborator: JSON decode and encode around the
//! protocol core.

use crate::http::{response::Response, types::StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

/// Decodes raw body bytes into a `T`.
///
/// Failure never aborts the request: it propagates as an absent value for
/// the caller to bind and decide on.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("unable to deserialize request body, value will be absent: {err}");
            None
        }
    }
}

/// Encodes `value` as an `application/json` response with the given
/// status.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => Response::new(status)
            .header("Content-Type", "application/json")
            .body(body),
        Err(err) => {
            warn!("unable to serialize response body: {err}");
            Response::new(StatusCode::InternalServerError)
                .header("Content-Type", "application/json")
                .body("{}")
        }
    }
}
