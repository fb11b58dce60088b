//! Content negotiation for the control surface (spec §6): a response is
//! rendered as `pb` (bincode bytes standing in for the undocumented wire
//! protobuf — see [`crate`] docs), `json`, or `debugpb` (pretty `{:#?}`
//! text, responses only).

use serde::de::DeserializeOwned;
use serde::Serialize;
pub use shared::ContentFormat;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

/// Encodes `value` per `format`, setting the appropriate `Content-Type`.
pub fn encode<T: Serialize + std::fmt::Debug>(format: ContentFormat, value: &T) -> Response {
    match format {
        ContentFormat::Json => warp::reply::json(value).into_response(),
        ContentFormat::Pb => match bincode::serialize(value) {
            Ok(bytes) => warp::reply::with_header(
                bytes,
                "content-type",
                "application/octet-stream",
            )
            .into_response(),
            Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        },
        ContentFormat::DebugPb => warp::reply::with_header(
            format!("{value:#?}"),
            "content-type",
            "text/plain; charset=utf-8",
        )
        .into_response(),
    }
}

/// Decodes a request body per `format`. `debugpb` is responses-only (spec
/// §6) and is rejected here.
///
/// # Errors
/// Returns a human-readable message on malformed input.
pub fn decode<T: DeserializeOwned>(format: ContentFormat, body: &[u8]) -> Result<T, String> {
    match format {
        ContentFormat::Json => {
            serde_json::from_slice(body).map_err(|e| format!("invalid json body: {e}"))
        }
        ContentFormat::Pb => {
            bincode::deserialize(body).map_err(|e| format!("invalid pb body: {e}"))
        }
        ContentFormat::DebugPb => Err("debugpb is a response-only format".to_string()),
    }
}

/// Renders an [`InvalidRequest`](crate::Error::InvalidRequest)-shaped error.
#[must_use]
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let mut response = warp::reply::with_status(message.to_string(), status).into_response();
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_through_encode_and_decode() {
        let value = vec![1_i32, 2, 3];
        let response = encode(ContentFormat::Json, &value);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn debugpb_rejects_as_a_request_format() {
        let err = decode::<i32>(ContentFormat::DebugPb, b"1").expect_err("debugpb is response-only");
        assert!(err.contains("response-only"));
    }
}
