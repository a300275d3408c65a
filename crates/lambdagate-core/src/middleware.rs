use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::GateError;
use crate::http::{Request, Response};
use crate::server::{BoxHandler, RequestHandler};

pub type BoxMiddleware = Arc<dyn Middleware>;

#[async_trait(?Send)]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, GateError>;
}

pub struct Next<'a> {
    middlewares: &'a [BoxMiddleware],
    handler: &'a dyn RequestHandler,
}

impl<'a> Next<'a> {
    pub fn new(middlewares: &'a [BoxMiddleware], handler: &'a dyn RequestHandler) -> Self {
        Self {
            middlewares,
            handler,
        }
    }

    pub async fn run(self, request: Request) -> Result<Response, GateError> {
        if let Some((head, tail)) = self.middlewares.split_first() {
            head.handle(request, Next::new(tail, self.handler)).await
        } else {
            self.handler.handle(request).await
        }
    }
}

/// Framework handler preceded by an ordered middleware stack.
pub struct Pipeline {
    middlewares: Vec<BoxMiddleware>,
    handler: BoxHandler,
}

impl Pipeline {
    pub fn new(handler: BoxHandler) -> Self {
        Self {
            middlewares: Vec::new(),
            handler,
        }
    }

    #[must_use]
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: Middleware,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

#[async_trait(?Send)]
impl RequestHandler for Pipeline {
    async fn handle(&self, request: Request) -> Result<Response, GateError> {
        Next::new(&self.middlewares, self.handler.as_ref())
            .run(request)
            .await
    }
}

pub struct RequestLogger;

#[async_trait(?Send)]
impl Middleware for RequestLogger {
    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response, GateError> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let start = Instant::now();

        match next.run(request).await {
            Ok(response) => {
                let elapsed = start.elapsed().as_secs_f64() * 1000.0;
                tracing::info!(
                    "request method={} path={} status={} elapsed_ms={:.2}",
                    method,
                    path,
                    response.status().as_u16(),
                    elapsed
                );
                Ok(response)
            }
            Err(err) => {
                let elapsed = start.elapsed().as_secs_f64() * 1000.0;
                tracing::error!(
                    "request method={} path={} error={} elapsed_ms={:.2}",
                    method,
                    path,
                    err.message(),
                    elapsed
                );
                Err(err)
            }
        }
    }
}
