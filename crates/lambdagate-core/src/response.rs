use serde::Serialize;

use crate::body::Body;
use crate::error::GateError;
use crate::http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    HeaderValue, Response, StatusCode,
};

/// Message returned to the caller whenever the framework handler fails.
pub const FAILURE_MESSAGE: &str = "Server failed to respond.";

/// Convert common return types into `Response`.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

pub fn response_with_body(status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;

    if let Body::Once(ref bytes) = body {
        if !bytes.is_empty() {
            let headers = response.headers_mut();
            headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
        }
    }

    *response.body_mut() = body;
    response
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub message: &'static str,
    pub details: serde_json::Value,
}

impl ErrorPayload {
    pub fn new(error: &GateError) -> Self {
        Self {
            message: FAILURE_MESSAGE,
            details: error.details(),
        }
    }

    /// Pretty JSON with a three-space indent.
    pub fn to_pretty_json(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"   ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        if self.serialize(&mut serializer).is_err() {
            return FAILURE_MESSAGE.as_bytes().to_vec();
        }
        buf
    }
}

/// Response written in place of the framework's output when its handler fails.
///
/// The status is left at `200`: the failure is reported in the payload only.
pub fn failure_response(error: &GateError) -> Response {
    let body = Body::from(ErrorPayload::new(error).to_pretty_json());
    let mut response = response_with_body(StatusCode::OK, body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_body_sets_length_and_type() {
        let response = response_with_body(StatusCode::OK, Body::from("hello"));
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_LENGTH], "5");
        assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn empty_body_does_not_set_length() {
        let response = response_with_body(StatusCode::OK, Body::empty());
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
    }

    #[test]
    fn failure_response_is_json_with_fixed_message() {
        let err = GateError::internal(anyhow::anyhow!("getStaticProps threw"));
        let response = failure_response(&err);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let value: serde_json::Value = response.body().to_json().expect("json body");
        assert_eq!(value["message"], FAILURE_MESSAGE);
        assert_eq!(
            value["details"]["message"],
            "internal error: getStaticProps threw"
        );
    }

    #[test]
    fn pretty_json_uses_three_space_indent() {
        let payload = ErrorPayload::new(&GateError::bad_request("bad"));
        let text = String::from_utf8(payload.to_pretty_json()).expect("utf8");
        assert!(text.starts_with("{\n   \"message\": \"Server failed to respond.\""));
    }
}
