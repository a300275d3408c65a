use aws_lambda_events::apigw::ApiGatewayV2httpResponse;
use aws_lambda_events::encodings::Body as EnvelopeBody;
use lambdagate_core::body::Body;
use lambdagate_core::error::GateError;
use lambdagate_core::http::{
    header::{CONNECTION, SET_COOKIE, TRANSFER_ENCODING},
    HeaderMap, HeaderValue, Response,
};

use crate::binary::BinaryPolicy;

/// Convert a buffered core response into a function-URL response envelope.
///
/// Repeated headers are joined with `,`, `set-cookie` values move to `cookies`, and the body is
/// base64 encoded whenever `policy` marks it as binary.
pub fn from_core_response(
    response: Response,
    policy: &BinaryPolicy,
) -> Result<ApiGatewayV2httpResponse, GateError> {
    let (parts, body) = response.into_parts();
    let bytes = match body {
        Body::Once(bytes) => bytes,
        Body::Stream(_) => {
            return Err(GateError::internal(anyhow::anyhow!(
                "streaming body must be collected before building the envelope"
            )))
        }
    };

    let is_binary = policy.is_binary(&parts.headers);
    let (headers, cookies) = flatten_headers(&parts.headers);

    let mut envelope = ApiGatewayV2httpResponse::default();
    envelope.status_code = i64::from(parts.status.as_u16());
    envelope.headers = headers;
    envelope.cookies = cookies;
    envelope.is_base64_encoded = is_binary;
    envelope.body = Some(if is_binary {
        EnvelopeBody::Binary(bytes.to_vec())
    } else {
        EnvelopeBody::Text(String::from_utf8_lossy(&bytes).into_owned())
    });

    Ok(envelope)
}

fn flatten_headers(source: &HeaderMap) -> (HeaderMap, Vec<String>) {
    let mut headers = HeaderMap::new();
    let mut cookies = Vec::new();

    for name in source.keys() {
        if name == TRANSFER_ENCODING || name == CONNECTION {
            continue;
        }
        if name == SET_COOKIE {
            cookies.extend(
                source
                    .get_all(name)
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .map(str::to_string),
            );
            continue;
        }

        let mut values = source.get_all(name).iter();
        let Some(first) = values.next() else {
            continue;
        };
        let mut joined = first.as_bytes().to_vec();
        for value in values {
            joined.push(b',');
            joined.extend_from_slice(value.as_bytes());
        }
        match HeaderValue::from_bytes(&joined) {
            Ok(value) => {
                headers.insert(name.clone(), value);
            }
            Err(err) => tracing::warn!("dropping response header {}: {}", name, err),
        }
    }

    (headers, cookies)
}
