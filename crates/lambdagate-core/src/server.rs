//! Contract between the adapter and the wrapped framework server.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use once_cell::sync::OnceCell;

use crate::config::{ConfigError, ServerConfig};
use crate::error::GateError;
use crate::http::{Request, Response};
use crate::response::IntoResponse;

/// Request handler exposed by a framework server.
///
/// Resolves once the response is completely written, or fails with the underlying error.
#[async_trait(?Send)]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Result<Response, GateError>;
}

pub type BoxHandler = Arc<dyn RequestHandler>;

pub struct FnHandler<F> {
    f: F,
}

#[async_trait(?Send)]
impl<F, Fut, Res> RequestHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, GateError>> + 'static,
    Res: IntoResponse,
{
    async fn handle(&self, request: Request) -> Result<Response, GateError> {
        let response = (self.f)(request).await?;
        Ok(response.into_response())
    }
}

/// Wrap an async closure as a shared [`RequestHandler`].
pub fn handler_fn<F, Fut, Res>(f: F) -> BoxHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, GateError>> + 'static,
    Res: IntoResponse,
{
    Arc::new(FnHandler { f })
}

/// A framework server built from the merged [`ServerConfig`].
pub trait FrameworkServer: Sized {
    fn new(config: Arc<ServerConfig>) -> anyhow::Result<Self>;

    fn request_handler(&self) -> BoxHandler;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    Ready,
}

/// Config and handler of a constructed server.
#[derive(Clone)]
pub struct ReadyServer {
    pub config: Arc<ServerConfig>,
    pub handler: BoxHandler,
}

/// Process-lifetime slot for the framework server. Initialized at most once.
pub struct ServerCell {
    ready: OnceCell<ReadyServer>,
}

impl ServerCell {
    pub const fn new() -> Self {
        Self {
            ready: OnceCell::new(),
        }
    }

    pub fn state(&self) -> ServerState {
        if self.ready.get().is_some() {
            ServerState::Ready
        } else {
            ServerState::Uninitialized
        }
    }

    pub fn get(&self) -> Option<&ReadyServer> {
        self.ready.get()
    }

    /// Load the config and construct `S` on first use; later calls return the same instance.
    pub fn get_or_try_init<S, F>(&self, load: F) -> anyhow::Result<&ReadyServer>
    where
        S: FrameworkServer,
        F: FnOnce() -> Result<ServerConfig, ConfigError>,
    {
        self.ready.get_or_try_init(|| {
            let config = Arc::new(load()?);
            let server =
                S::new(Arc::clone(&config)).context("failed to construct framework server")?;
            tracing::info!(
                "framework server ready dir={} minimal_mode={}",
                config.dir().display(),
                config.minimal_mode()
            );
            Ok(ReadyServer {
                config,
                handler: server.request_handler(),
            })
        })
    }
}

impl Default for ServerCell {
    fn default() -> Self {
        Self::new()
    }
}
