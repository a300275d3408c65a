//! Provider-neutral primitives for running a framework request handler behind a
//! cloud-function invocation adapter.

pub mod body;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod response;
pub mod server;
