use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{LocalBoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Request or response payload exchanged with the framework handler.
///
/// Invocation envelopes always carry a fully buffered payload, so adapted requests are `Once`.
/// Framework handlers may still answer with a `Stream`; the shim drains it with [`Body::collect`]
/// before serializing the response envelope.
pub enum Body {
    Once(Bytes),
    Stream(LocalBoxStream<'static, Result<Bytes, anyhow::Error>>),
}

impl Body {
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    pub fn from_bytes<B>(bytes: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self::Once(bytes.into())
    }

    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + 'static,
        anyhow::Error: From<E>,
    {
        Self::Stream(
            stream
                .map(|res| res.map_err(anyhow::Error::from))
                .boxed_local(),
        )
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Bytes> + 'static,
    {
        Self::Stream(stream.map(Ok::<Bytes, anyhow::Error>).boxed_local())
    }

    pub fn text<S>(text: S) -> Self
    where
        S: Into<String>,
    {
        Self::from_bytes(text.into().into_bytes())
    }

    pub fn json<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        serde_json::to_vec(value).map(Self::from_bytes)
    }

    /// Borrow the buffered bytes, or `None` for a streaming body.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Once(bytes) => Some(bytes.as_ref()),
            Body::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Once(bytes) if bytes.is_empty())
    }

    /// Drain the body into a single buffer, failing on the first stream error.
    pub async fn collect(self) -> Result<Bytes, anyhow::Error> {
        match self {
            Body::Once(bytes) => Ok(bytes),
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    pub fn to_json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        match self {
            Body::Once(bytes) => serde_json::from_slice(bytes.as_ref()),
            Body::Stream(_) => Err(serde_json::Error::io(io::Error::other(
                "streaming body cannot be materialised as JSON",
            ))),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Once(bytes) => f
                .debug_struct("Body::Once")
                .field("len", &bytes.len())
                .finish(),
            Body::Stream(_) => f.debug_tuple("Body::Stream").finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Once(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::from_bytes(value)
    }
}

impl From<&[u8]> for Body {
    fn from(value: &[u8]) -> Self {
        Body::from_bytes(Bytes::copy_from_slice(value))
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::text(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::text(value)
    }
}
