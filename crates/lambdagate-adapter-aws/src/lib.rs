//! Adapter that serves a `lambdagate-core` framework server from AWS Lambda function URLs.
//!
//! Function-URL invocations use the API Gateway HTTP API v2 payload. Each event is translated into
//! an `http::Request`, handed to the framework's request handler, and the response is translated
//! back into the envelope the Lambda runtime expects.

mod binary;
mod context;
mod entry;
mod logging;
mod options;
mod profile;
mod request;
mod response;
mod settings;
mod shim;
mod trace;

pub use binary::BinaryPolicy;
pub use context::LambdaRequestContext;
pub use entry::{bootstrap, bundle_root, prepare, run, run_with_root, LambdaEntry};
pub use logging::init_logger;
pub use options::{strip_preparsed_body, RequestHook, ShimOptions};
pub use profile::{AwsFunctionUrl, ProviderProfile};
pub use request::{into_core_request, PreparsedBody};
pub use response::from_core_response;
pub use settings::{
    AdapterSettings, BinarySettings, LogFormat, LogLevel, LoggingSettings, SettingsError,
    SettingsLoader, TracingSettings, SETTINGS_FILE,
};
pub use shim::Shim;
pub use trace::{
    InvocationTraceLayer, InvocationTraceService, TraceAnnotation, TraceHeader, TraceHeaderError,
    TracingMode, TRACE_HEADER,
};
