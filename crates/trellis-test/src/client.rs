//! Test client for in-memory dispatch.

use std::sync::Arc;

use http::Method;
use trellis::App;
use trellis_core::ContextPool;

use crate::request::TestRequestBuilder;

/// A client that sends requests straight into an [`App`].
///
/// Requests go through routing and the full middleware chain, then
/// [`App::dispatch`] renders any escaped error, exactly as a server would.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trellis::App;
/// use trellis_test::TestClient;
///
/// let mut app = App::new();
/// app.get("/users/:id", |ctx| {
///     let id = ctx.param("id").unwrap_or_default().to_string();
///     ctx.json(&serde_json::json!({ "id": id }))
/// })
/// .unwrap();
///
/// let client = TestClient::new(Arc::new(app));
/// let response = client.get("/users/7").send();
/// response.assert_status(http::StatusCode::OK);
/// assert_eq!(response.json_value().unwrap()["id"], "7");
/// ```
#[must_use]
pub struct TestClient {
    app: Arc<App>,
    pool: ContextPool,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `app`.
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            pool: ContextPool::new(16),
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The app under test.
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates an OPTIONS request builder.
    pub fn options(&self, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Creates a request builder for any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestRequestBuilder<'_> {
        let mut builder = TestRequestBuilder::new(self, method, uri.as_ref());
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        builder
    }

    pub(crate) fn pool(&self) -> &ContextPool {
        &self.pool
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("app", &self.app)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}
