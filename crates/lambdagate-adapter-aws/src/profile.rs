use aws_lambda_events::apigw::{ApiGatewayV2httpRequest, ApiGatewayV2httpResponse};
use lambda_runtime::Context;
use lambdagate_core::error::GateError;
use lambdagate_core::http::{Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::binary::BinaryPolicy;
use crate::options::ShimOptions;
use crate::request::into_core_request;
use crate::response::from_core_response;

/// Envelope shape of a cloud provider's invocation payloads.
pub trait ProviderProfile: 'static {
    type Event: DeserializeOwned + 'static;
    type Output: Serialize + 'static;

    const NAME: &'static str;

    fn into_request(
        event: Self::Event,
        context: &Context,
        options: &ShimOptions,
    ) -> Result<Request, GateError>;

    /// `response` must carry a buffered body.
    fn into_output(response: Response, policy: &BinaryPolicy) -> Result<Self::Output, GateError>;
}

/// Lambda function URLs, which share the API Gateway HTTP API v2 payload format.
#[derive(Clone, Copy, Debug, Default)]
pub struct AwsFunctionUrl;

impl ProviderProfile for AwsFunctionUrl {
    type Event = ApiGatewayV2httpRequest;
    type Output = ApiGatewayV2httpResponse;

    const NAME: &'static str = "aws";

    fn into_request(
        event: Self::Event,
        context: &Context,
        options: &ShimOptions,
    ) -> Result<Request, GateError> {
        into_core_request(event, context, options)
    }

    fn into_output(response: Response, policy: &BinaryPolicy) -> Result<Self::Output, GateError> {
        from_core_response(response, policy)
    }
}
