//! Test request building.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;

use crate::client::TestClient;
use crate::error::TestError;
use crate::response::TestResponse;

/// Builder for one request sent through a [`TestClient`].
///
/// Builder errors, such as an invalid header, are kept until
/// [`try_send`](Self::try_send) reports them.
#[must_use]
pub struct TestRequestBuilder<'a> {
    client: &'a TestClient,
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    error: Option<TestError>,
}

impl<'a> TestRequestBuilder<'a> {
    pub(crate) fn new(client: &'a TestClient, method: Method, uri: &str) -> Self {
        Self {
            client,
            method,
            uri: uri.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            error: None,
        }
    }

    /// Sets a header on the request, replacing earlier values.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(TestError::InvalidHeader(name.to_string())),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets a `Bearer` authorization header.
    pub fn bearer_auth(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header(header::AUTHORIZATION.as_str(), value)
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `value` as the JSON body and sets the Content-Type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Bytes::from(bytes);
                self.content_type("application/json")
            }
            Err(e) => {
                self.fail(TestError::Json(e));
                self
            }
        }
    }

    /// Sets the peer address the app sees.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Dispatches the request.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built; use
    /// [`try_send`](Self::try_send) to handle that case.
    pub fn send(self) -> TestResponse {
        match self.try_send() {
            Ok(response) => response,
            Err(e) => panic!("failed to send test request: {e}"),
        }
    }

    /// Dispatches the request, reporting builder errors.
    pub fn try_send(self) -> Result<TestResponse, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e: http::uri::InvalidUri| TestError::RequestBuild(e.to_string()))?;
        if uri.scheme().is_some() || uri.authority().is_some() {
            return Err(TestError::RequestBuild(format!(
                "expected a path, got '{}'",
                self.uri
            )));
        }

        let pool = self.client.pool();
        let mut ctx = pool
            .acquire(self.method, uri.path())
            .with_headers(self.headers)
            .with_body(self.body);
        if let Some(query) = uri.query() {
            ctx = ctx.with_query(query);
        }
        if let Some(addr) = self.remote_addr {
            ctx = ctx.with_remote_addr(addr);
        }

        self.client.app().dispatch(&mut ctx);
        let response = TestResponse::from_http(ctx.to_response());
        pool.release(ctx);
        Ok(response)
    }

    fn fail(&mut self, error: TestError) {
        self.error.get_or_insert(error);
    }
}

impl std::fmt::Debug for TestRequestBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRequestBuilder")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
