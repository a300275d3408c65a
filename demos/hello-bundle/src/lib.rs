//! A minimal framework server used to demonstrate the Lambda entry point.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use lambdagate_core::body::Body;
use lambdagate_core::config::ServerConfig;
use lambdagate_core::error::GateError;
use lambdagate_core::http::{
    header::CONTENT_TYPE, response_builder, Method, Request, Response, StatusCode,
};
use lambdagate_core::server::{BoxHandler, FrameworkServer, RequestHandler};
use serde::{Deserialize, Serialize};

pub struct HelloServer {
    config: Arc<ServerConfig>,
}

impl FrameworkServer for HelloServer {
    fn new(config: Arc<ServerConfig>) -> anyhow::Result<Self> {
        Ok(Self { config })
    }

    fn request_handler(&self) -> BoxHandler {
        Arc::new(HelloHandler {
            config: Arc::clone(&self.config),
        })
    }
}

struct HelloHandler {
    config: Arc<ServerConfig>,
}

#[derive(Deserialize)]
struct EchoBody {
    name: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    minimal_mode: bool,
}

#[async_trait(?Send)]
impl RequestHandler for HelloHandler {
    async fn handle(&self, request: Request) -> Result<Response, GateError> {
        match (request.method(), request.uri().path()) {
            (&Method::GET, "/api/health") => json(
                StatusCode::OK,
                &Health {
                    status: "ok",
                    minimal_mode: self.config.minimal_mode(),
                },
            ),
            (&Method::GET, "/api/config") => json(StatusCode::OK, self.config.conf().as_map()),
            (&Method::POST, "/api/echo") => {
                let body: EchoBody = request
                    .body()
                    .to_json()
                    .map_err(|err| GateError::bad_request(format!("invalid echo body: {err}")))?;
                text(StatusCode::OK, format!("Hello, {}!", body.name))
            }
            (&Method::GET, "/api/stream") => {
                let chunks =
                    stream::iter(0..3).map(|index| Bytes::from(format!("chunk {index}\n")));
                response_builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(Body::stream(chunks))
                    .map_err(GateError::internal)
            }
            _ => text(StatusCode::NOT_FOUND, "Not Found".to_string()),
        }
    }
}

fn text(status: StatusCode, body: String) -> Result<Response, GateError> {
    response_builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::text(body))
        .map_err(GateError::internal)
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response, GateError> {
    let body = Body::json(value).map_err(GateError::internal)?;
    response_builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(GateError::internal)
}
