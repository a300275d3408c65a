use aws_lambda_events::apigw::ApiGatewayV2httpRequest;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use lambda_runtime::Context;
use lambdagate_core::body::Body;
use lambdagate_core::error::GateError;
use lambdagate_core::http::{
    header::{CONTENT_LENGTH, COOKIE, HOST},
    request_builder, HeaderName, HeaderValue, Method, Request, Uri,
};

use crate::context::LambdaRequestContext;
use crate::options::ShimOptions;
use crate::trace::{TraceHeader, TRACE_HEADER};

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Raw request body exposed the way body-parsing middleware would leave it.
///
/// Frameworks that find this extension skip their own body parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparsedBody(pub Bytes);

/// Convert a function-URL (HTTP API v2) event into a core request.
pub fn into_core_request(
    event: ApiGatewayV2httpRequest,
    lambda_context: &Context,
    options: &ShimOptions,
) -> Result<Request, GateError> {
    let ApiGatewayV2httpRequest {
        raw_path,
        raw_query_string,
        cookies,
        mut headers,
        request_context,
        body,
        is_base64_encoded,
        ..
    } = event;

    let method: Method = request_context.http.method.clone();
    let uri = build_uri(
        raw_path
            .filter(|path| !path.is_empty())
            .or_else(|| request_context.http.path.clone()),
        raw_query_string,
    )?;
    let body = decode_body(body, is_base64_encoded)?;

    if let Some(cookies) = cookies.filter(|cookies| !cookies.is_empty()) {
        let joined = HeaderValue::from_str(&cookies.join("; "))
            .map_err(|err| GateError::bad_request(format!("invalid cookie header: {err}")))?;
        headers.insert(COOKIE, joined);
    }
    if !body.is_empty() && !headers.contains_key(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    if !headers.contains_key(HOST) {
        if let Some(value) = request_context
            .domain_name
            .as_deref()
            .and_then(|domain| HeaderValue::from_str(domain).ok())
        {
            headers.insert(HOST, value);
        }
    }
    if !headers.contains_key(&FORWARDED_FOR) {
        if let Some(value) = request_context
            .http
            .source_ip
            .as_deref()
            .and_then(|ip| HeaderValue::from_str(ip).ok())
        {
            headers.insert(FORWARDED_FOR, value);
        }
    }

    let trace = headers
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .or(lambda_context.xray_trace_id.as_deref())
        .and_then(TraceHeader::parse_lenient);

    let mut request = request_builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.clone()))
        .map_err(GateError::internal)?;
    *request.headers_mut() = headers;

    if options.preparsed_body && !body.is_empty() {
        request.extensions_mut().insert(PreparsedBody(body));
    }

    LambdaRequestContext::insert(
        &mut request,
        LambdaRequestContext {
            request_id: lambda_context.request_id.clone(),
            api_request_id: request_context.request_id,
            source_ip: request_context.http.source_ip,
            stage: request_context.stage,
            domain_name: request_context.domain_name,
            trace,
        },
    );

    Ok(request)
}

fn build_uri(path: Option<String>, query: Option<String>) -> Result<Uri, GateError> {
    let mut target = path.filter(|path| !path.is_empty()).unwrap_or_else(|| "/".to_string());
    if !target.starts_with('/') {
        target.insert(0, '/');
    }
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        target.push('?');
        target.push_str(&query);
    }
    target
        .parse::<Uri>()
        .map_err(|err| GateError::bad_request(format!("invalid request URI: {err}")))
}

fn decode_body(body: Option<String>, is_base64_encoded: bool) -> Result<Bytes, GateError> {
    let Some(body) = body else {
        return Ok(Bytes::new());
    };
    if is_base64_encoded {
        BASE64
            .decode(body.as_bytes())
            .map(Bytes::from)
            .map_err(|err| GateError::bad_request(format!("invalid base64 body: {err}")))
    } else {
        Ok(Bytes::from(body))
    }
}
