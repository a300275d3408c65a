use crate::body::Body;

pub use http::header;
pub use http::request::Builder as RequestBuilder;
pub use http::response::Builder as ResponseBuilder;

pub type Method = http::Method;
pub type StatusCode = http::StatusCode;
pub type HeaderMap = http::HeaderMap;
pub type HeaderValue = http::HeaderValue;
pub type HeaderName = http::header::HeaderName;
pub type Uri = http::Uri;

pub fn request_builder() -> RequestBuilder {
    http::Request::builder()
}

pub fn response_builder() -> ResponseBuilder {
    http::Response::builder()
}

pub type Request = http::Request<Body>;
pub type Response = http::Response<Body>;
