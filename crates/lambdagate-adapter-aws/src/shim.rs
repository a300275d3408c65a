use std::marker::PhantomData;

use lambda_runtime::Context;
use lambdagate_core::body::Body;
use lambdagate_core::error::GateError;
use lambdagate_core::http::{Request, Response};
use lambdagate_core::response::failure_response;
use lambdagate_core::server::BoxHandler;

use crate::options::ShimOptions;
use crate::profile::{AwsFunctionUrl, ProviderProfile};

/// Bidirectional translation between a provider envelope and the framework handler.
pub struct Shim<P = AwsFunctionUrl> {
    handler: BoxHandler,
    options: ShimOptions,
    _profile: PhantomData<fn() -> P>,
}

impl<P: ProviderProfile> Shim<P> {
    pub fn new(handler: BoxHandler, options: ShimOptions) -> Self {
        Self {
            handler,
            options,
            _profile: PhantomData,
        }
    }

    pub fn options(&self) -> &ShimOptions {
        &self.options
    }

    /// Handle one invocation.
    ///
    /// Only envelope translation errors are returned. A failing framework handler produces the
    /// JSON failure payload instead.
    pub async fn dispatch(&self, event: P::Event, context: &Context) -> Result<P::Output, GateError> {
        let mut request = P::into_request(event, context, &self.options)?;
        if let Some(hook) = self.options.request {
            hook(&mut request);
        }

        let response = self.render(request).await;
        P::into_output(response, &self.options.binary)
    }

    async fn render(&self, request: Request) -> Response {
        let result = match self.handler.handle(request).await {
            Ok(response) => buffer(response).await,
            Err(err) => Err(err),
        };

        result.unwrap_or_else(|err| {
            tracing::error!("framework request failed due to: {}", err);
            failure_response(&err)
        })
    }
}

async fn buffer(response: Response) -> Result<Response, GateError> {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.map_err(GateError::internal)?;
    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_lambda_events::encodings::Body as EnvelopeBody;
    use bytes::Bytes;
    use futures::executor::block_on;
    use lambdagate_core::http::{header::CONTENT_TYPE, response_builder, StatusCode};
    use lambdagate_core::response::FAILURE_MESSAGE;
    use lambdagate_core::server::handler_fn;
    use serde_json::json;

    use crate::binary::BinaryPolicy;
    use crate::options::strip_preparsed_body;
    use crate::request::PreparsedBody;

    fn post_event(body: &str) -> aws_lambda_events::apigw::ApiGatewayV2httpRequest {
        serde_json::from_value(json!({
            "version": "2.0",
            "rawPath": "/api/posts",
            "rawQueryString": "",
            "headers": { "content-type": "application/json" },
            "requestContext": {
                "http": {
                    "method": "POST",
                    "path": "/api/posts",
                    "protocol": "HTTP/1.1",
                    "sourceIp": "198.51.100.4",
                    "userAgent": "test"
                },
                "requestId": "req",
                "stage": "$default"
            },
            "body": body,
            "isBase64Encoded": false
        }))
        .expect("event")
    }

    fn body_text(output: &aws_lambda_events::apigw::ApiGatewayV2httpResponse) -> String {
        match &output.body {
            Some(EnvelopeBody::Text(text)) => text.clone(),
            Some(EnvelopeBody::Binary(bytes)) => String::from_utf8(bytes.clone()).expect("utf8"),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn handler_output_reaches_envelope() {
        let handler = handler_fn(|request: Request| async move {
            let echoed = request.body().as_bytes().unwrap_or_default().to_vec();
            Ok::<_, GateError>(
                response_builder()
                    .status(StatusCode::CREATED)
                    .header("content-type", "application/json")
                    .body(Body::from(echoed))
                    .expect("response"),
            )
        });
        let shim: Shim = Shim::new(handler, ShimOptions::default());

        let output = block_on(shim.dispatch(post_event("{\"id\":7}"), &Context::default()))
            .expect("output");
        assert_eq!(output.status_code, 201);
        assert!(!output.is_base64_encoded);
        assert_eq!(body_text(&output), "{\"id\":7}");
    }

    #[test]
    fn handler_failure_becomes_json_payload() {
        let handler = handler_fn(|_request: Request| async move {
            Err::<Response, _>(GateError::internal(anyhow::anyhow!("database unreachable")))
        });
        let shim: Shim = Shim::new(handler, ShimOptions::default());

        let output =
            block_on(shim.dispatch(post_event("{}"), &Context::default())).expect("output");
        assert_eq!(output.status_code, 200);
        assert_eq!(output.headers[CONTENT_TYPE], "application/json");

        let payload: serde_json::Value =
            serde_json::from_str(&body_text(&output)).expect("json payload");
        assert_eq!(payload["message"], FAILURE_MESSAGE);
        assert_eq!(
            payload["details"]["message"],
            "internal error: database unreachable"
        );
    }

    #[test]
    fn stream_failure_becomes_json_payload() {
        let handler = handler_fn(|_request: Request| async move {
            let chunks = futures::stream::iter(vec![
                Ok(Bytes::from_static(b"<html>")),
                Err(anyhow::anyhow!("render aborted")),
            ]);
            Ok::<_, GateError>(
                response_builder()
                    .status(StatusCode::OK)
                    .header("content-type", "text/html")
                    .body(Body::from_stream(chunks))
                    .expect("response"),
            )
        });
        let shim: Shim = Shim::new(handler, ShimOptions::default());

        let output =
            block_on(shim.dispatch(post_event("{}"), &Context::default())).expect("output");
        assert_eq!(output.headers[CONTENT_TYPE], "application/json");
        assert!(body_text(&output).contains(FAILURE_MESSAGE));
    }

    #[test]
    fn streamed_response_is_collected() {
        let handler = handler_fn(|_request: Request| async move {
            let chunks = futures::stream::iter(vec![
                Bytes::from_static(b"chunk-1"),
                Bytes::from_static(b"chunk-2"),
            ]);
            Ok::<_, GateError>(Body::stream(chunks))
        });
        let shim: Shim = Shim::new(handler, ShimOptions::default());

        let output =
            block_on(shim.dispatch(post_event(""), &Context::default())).expect("output");
        assert_eq!(body_text(&output), "chunk-1chunk-2");
    }

    #[test]
    fn request_hook_runs_before_handler() {
        let handler = handler_fn(|request: Request| async move {
            let preparsed = request.extensions().get::<PreparsedBody>().is_some();
            Ok::<_, GateError>(format!("preparsed={preparsed}"))
        });

        let exposed: Shim = Shim::new(handler.clone(), ShimOptions::default());
        let output =
            block_on(exposed.dispatch(post_event("{\"a\":1}"), &Context::default())).expect("ok");
        assert_eq!(body_text(&output), "preparsed=true");

        let stripped: Shim = Shim::new(
            handler,
            ShimOptions::default().with_request_hook(strip_preparsed_body),
        );
        let output =
            block_on(stripped.dispatch(post_event("{\"a\":1}"), &Context::default())).expect("ok");
        assert_eq!(body_text(&output), "preparsed=false");
    }

    #[test]
    fn binary_policy_is_applied_to_output() {
        let handler = handler_fn(|_request: Request| async move { Ok::<_, GateError>("plain") });
        let shim: Shim = Shim::new(
            handler,
            ShimOptions::default().with_binary(BinaryPolicy::All),
        );
        let output = block_on(shim.dispatch(post_event(""), &Context::default())).expect("ok");
        assert!(output.is_base64_encoded);
        assert_eq!(output.body, Some(EnvelopeBody::Binary(b"plain".to_vec())));
    }

    #[test]
    fn translation_errors_are_returned() {
        let handler = handler_fn(|_request: Request| async move { Ok::<_, GateError>("never") });
        let shim: Shim = Shim::new(handler, ShimOptions::default());
        let mut event = post_event("");
        event.raw_path = Some("/bad path".to_string());

        let err = block_on(shim.dispatch(event, &Context::default())).expect_err("bad uri");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
