use lambdagate_core::http::Request;

use crate::trace::TraceHeader;

/// Invocation metadata attached to each adapted request.
#[derive(Clone, Debug, Default)]
pub struct LambdaRequestContext {
    pub request_id: String,
    pub api_request_id: Option<String>,
    pub source_ip: Option<String>,
    pub stage: Option<String>,
    pub domain_name: Option<String>,
    pub trace: Option<TraceHeader>,
}

impl LambdaRequestContext {
    pub fn insert(request: &mut Request, context: LambdaRequestContext) {
        request.extensions_mut().insert(context);
    }

    pub fn get(request: &Request) -> Option<&LambdaRequestContext> {
        request.extensions().get::<LambdaRequestContext>()
    }
}
