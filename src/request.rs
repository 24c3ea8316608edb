//! The current request, as seen by injected handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri};

/// Route parameters captured from the matched path, by name.
pub type Params = BTreeMap<String, String>;

/// The request being served.
///
/// The builder binds `Request` as a request local, so handlers and providers can have it
/// injected like any other dependency. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Request(Arc<Inner>);

#[derive(Clone, Debug)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Creates a request without headers or body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self(Arc::new(Inner {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }))
    }

    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self(Arc::new(Inner {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        }))
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        Arc::make_mut(&mut self.0).headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        Arc::make_mut(&mut self.0).body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.0.method
    }

    pub fn uri(&self) -> &Uri {
        &self.0.uri
    }

    pub fn path(&self) -> &str {
        self.0.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.0.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.0.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.0.body
    }
}
