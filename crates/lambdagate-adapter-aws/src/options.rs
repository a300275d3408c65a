use std::fmt;

use lambdagate_core::http::Request;

use crate::binary::BinaryPolicy;
use crate::request::PreparsedBody;

/// Callback run on every adapted request before it reaches the framework handler.
pub type RequestHook = fn(&mut Request);

/// Options controlling how invocation envelopes are translated.
#[derive(Clone)]
pub struct ShimOptions {
    pub binary: BinaryPolicy,
    pub request: Option<RequestHook>,
    /// Attach the raw body as a [`PreparsedBody`] extension while adapting.
    pub preparsed_body: bool,
}

impl Default for ShimOptions {
    fn default() -> Self {
        Self {
            binary: BinaryPolicy::None,
            request: None,
            preparsed_body: true,
        }
    }
}

impl fmt::Debug for ShimOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimOptions")
            .field("binary", &self.binary)
            .field("request", &self.request.is_some())
            .field("preparsed_body", &self.preparsed_body)
            .finish()
    }
}

impl ShimOptions {
    /// Options used by the composed entry point: every body is binary and the framework always
    /// parses the request body itself.
    pub fn function_url() -> Self {
        Self {
            binary: BinaryPolicy::All,
            request: Some(strip_preparsed_body),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary: BinaryPolicy) -> Self {
        self.binary = binary;
        self
    }

    #[must_use]
    pub fn with_request_hook(mut self, hook: RequestHook) -> Self {
        self.request = Some(hook);
        self
    }
}

/// The framework skips body parsing when a parsed body is already present, so drop it.
pub fn strip_preparsed_body(request: &mut Request) {
    request.extensions_mut().remove::<PreparsedBody>();
}
