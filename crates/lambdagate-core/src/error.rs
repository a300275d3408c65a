use anyhow::Error as AnyError;
use serde_json::{json, Value};
use thiserror::Error;

use crate::http::StatusCode;

/// Failure raised while adapting or handling a single invocation.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("{message}")]
    BadRequest { message: String },
    #[error("internal error: {source}")]
    Internal {
        #[from]
        source: AnyError,
    },
}

impl GateError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        GateError::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<AnyError>,
    {
        GateError::Internal {
            source: error.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GateError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            GateError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GateError::BadRequest { message } => message.clone(),
            GateError::Internal { source } => format!("internal error: {}", source),
        }
    }

    /// Serializable description of the error, including the full cause chain.
    pub fn details(&self) -> Value {
        let causes = match self {
            GateError::Internal { source } => source
                .chain()
                .skip(1)
                .map(|cause| Value::String(cause.to_string()))
                .collect(),
            GateError::BadRequest { .. } => Vec::new(),
        };

        json!({
            "status": self.status().as_u16(),
            "message": self.message(),
            "causes": causes,
        })
    }
}
