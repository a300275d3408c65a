//! Trace segments for invocations.
//!
//! Two ways of attaching a segment are supported:
//!
//! - [`TraceAnnotation`] is a middleware that opens a segment around the framework handler and
//!   annotates it with the request metadata.
//! - [`InvocationTraceLayer`] wraps the whole entry service and opens one segment per invocation.
//!
//! Neither records response bodies.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use async_trait::async_trait;
use aws_lambda_events::apigw::{ApiGatewayV2httpRequest, ApiGatewayV2httpResponse};
use lambda_runtime::LambdaEvent;
use lambdagate_core::error::GateError;
use lambdagate_core::http::{header::USER_AGENT, Request, Response};
use lambdagate_core::middleware::{Middleware, Next};
use serde::Deserialize;
use thiserror::Error;
use tower_layer::Layer;
use tower_service::Service;
use tracing::field::Empty;
use tracing::Instrument;

use crate::context::LambdaRequestContext;

/// Header carrying the X-Ray trace context.
pub const TRACE_HEADER: &str = "x-amzn-trace-id";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingMode {
    Off,
    /// Annotate the request/response pair inside the handler pipeline.
    Annotate,
    /// Wrap the entire entry service.
    #[default]
    Decorate,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceHeaderError {
    #[error("trace header is empty")]
    Empty,
    #[error("malformed trace header segment: {0}")]
    Segment(String),
}

/// Parsed `Root=...;Parent=...;Sampled=...` trace header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceHeader {
    pub root: Option<String>,
    pub parent: Option<String>,
    pub sampled: Option<bool>,
    pub extra: Vec<(String, String)>,
}

impl FromStr for TraceHeader {
    type Err = TraceHeaderError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TraceHeaderError::Empty);
        }

        let mut header = TraceHeader::default();
        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((key, value)) = segment.split_once('=') else {
                return Err(TraceHeaderError::Segment(segment.to_string()));
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(TraceHeaderError::Segment(segment.to_string()));
            }
            match key {
                "Root" => header.root = Some(value.to_string()),
                "Parent" => header.parent = Some(value.to_string()),
                "Sampled" => header.sampled = Some(value == "1"),
                _ => header.extra.push((key.to_string(), value.to_string())),
            }
        }
        Ok(header)
    }
}

impl fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(root) = &self.root {
            parts.push(format!("Root={root}"));
        }
        if let Some(parent) = &self.parent {
            parts.push(format!("Parent={parent}"));
        }
        if let Some(sampled) = self.sampled {
            parts.push(format!("Sampled={}", u8::from(sampled)));
        }
        for (key, value) in &self.extra {
            parts.push(format!("{key}={value}"));
        }
        f.write_str(&parts.join(";"))
    }
}

impl TraceHeader {
    /// Parse a header, logging and discarding malformed values.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.parse() {
            Ok(header) => Some(header),
            Err(err) => {
                tracing::debug!("ignoring trace header {:?}: {}", raw, err);
                None
            }
        }
    }
}

/// Middleware opening a segment around the framework handler.
pub struct TraceAnnotation;

#[async_trait(?Send)]
impl Middleware for TraceAnnotation {
    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, GateError> {
        let context = LambdaRequestContext::get(&request);
        let trace_id = context
            .and_then(|ctx| ctx.trace.as_ref())
            .and_then(|trace| trace.root.clone())
            .unwrap_or_default();
        let client_ip = context
            .and_then(|ctx| ctx.source_ip.clone())
            .unwrap_or_default();
        let user_agent = request
            .headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        let span = tracing::info_span!(
            "segment",
            trace_id = %trace_id,
            http.method = %request.method(),
            http.url = %request.uri(),
            http.user_agent = %user_agent,
            http.client_ip = %client_ip,
            http.status = Empty,
            error = Empty,
        );

        let result = next.run(request).instrument(span.clone()).await;
        match &result {
            Ok(response) => {
                span.record("http.status", response.status().as_u16());
            }
            Err(err) => {
                span.record("error", err.message().as_str());
            }
        }
        result
    }
}

/// Tower layer producing one `invocation` span per Lambda event.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvocationTraceLayer;

impl InvocationTraceLayer {
    pub fn new() -> Self {
        Self
    }

    /// Response bodies are never captured into the trace.
    pub fn capture_response(&self) -> bool {
        false
    }
}

impl<S> Layer<S> for InvocationTraceLayer {
    type Service = InvocationTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InvocationTraceService { inner }
    }
}

#[derive(Clone, Debug)]
pub struct InvocationTraceService<S> {
    inner: S,
}

impl<S> Service<LambdaEvent<ApiGatewayV2httpRequest>> for InvocationTraceService<S>
where
    S: Service<LambdaEvent<ApiGatewayV2httpRequest>, Response = ApiGatewayV2httpResponse>,
    S::Future: 'static,
    S::Error: fmt::Display,
{
    type Response = ApiGatewayV2httpResponse;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<ApiGatewayV2httpRequest>) -> Self::Future {
        let trace_id = event
            .context
            .xray_trace_id
            .as_deref()
            .and_then(TraceHeader::parse_lenient)
            .and_then(|trace| trace.root)
            .unwrap_or_default();
        let span = tracing::info_span!(
            "invocation",
            request_id = %event.context.request_id,
            trace_id = %trace_id,
            method = %event.payload.request_context.http.method,
            path = event.payload.raw_path.as_deref().unwrap_or("/"),
            capture_response = false,
            status = Empty,
            error = Empty,
        );

        let future = {
            let _entered = span.enter();
            self.inner.call(event)
        };

        Box::pin(async move {
            let result = future.instrument(span.clone()).await;
            match &result {
                Ok(response) => {
                    span.record("status", response.status_code);
                }
                Err(err) => {
                    span.record("error", err.to_string().as_str());
                }
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_header() {
        let header: TraceHeader =
            "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1"
                .parse()
                .expect("header");
        assert_eq!(
            header.root.as_deref(),
            Some("1-5759e988-bd862e3fe1be46a994272793")
        );
        assert_eq!(header.parent.as_deref(), Some("53995c3f42cd8ad8"));
        assert_eq!(header.sampled, Some(true));
        assert!(header.extra.is_empty());
    }

    #[test]
    fn keeps_unknown_keys_in_order() {
        let header: TraceHeader = "Root=1-abc;Lineage=a87bd80c:1|68fd508a:5;Self=1-def"
            .parse()
            .expect("header");
        assert_eq!(
            header.extra,
            vec![
                ("Lineage".to_string(), "a87bd80c:1|68fd508a:5".to_string()),
                ("Self".to_string(), "1-def".to_string()),
            ]
        );
        assert_eq!(
            header.to_string(),
            "Root=1-abc;Lineage=a87bd80c:1|68fd508a:5;Self=1-def"
        );
    }

    #[test]
    fn sampled_zero_is_false() {
        let header: TraceHeader = "Root=1-abc;Sampled=0".parse().expect("header");
        assert_eq!(header.sampled, Some(false));
        assert_eq!(header.to_string(), "Root=1-abc;Sampled=0");
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!("".parse::<TraceHeader>(), Err(TraceHeaderError::Empty));
        assert_eq!(
            "Root".parse::<TraceHeader>(),
            Err(TraceHeaderError::Segment("Root".to_string()))
        );
        assert_eq!(
            "=1".parse::<TraceHeader>(),
            Err(TraceHeaderError::Segment("=1".to_string()))
        );
        assert!(TraceHeader::parse_lenient("garbage").is_none());
    }

    #[test]
    fn tracing_mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: TracingMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"annotate\"").expect("mode");
        assert_eq!(parsed.mode, TracingMode::Annotate);
        assert_eq!(TracingMode::default(), TracingMode::Decorate);
    }

    #[test]
    fn layer_never_captures_response_bodies() {
        assert!(!InvocationTraceLayer::new().capture_response());
    }
}
