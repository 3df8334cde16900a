//! Per-request context.
//!
//! A [`Context`] carries one request through routing, middleware and the
//! handler. The request line (method and path) is fixed at creation. Every
//! other field is mutable, and response fields follow last-write-wins.
//! [`Context::reset`] restores the defaults while keeping allocations so
//! instances can be pooled (see [`crate::ContextPool`]).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue, IntoHeaderName};
use http::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use trellis_router::Params;

use crate::error::{TrellisError, TrellisResult};
use crate::route::Route;

/// Headers consulted, in order, when resolving the client address.
pub const CLIENT_IP_HEADERS: [&str; 4] = [
    "x-forwarded-for",
    "x-real-ip",
    "x-client-ip",
    "cf-connecting-ip",
];

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Mutable per-request state.
///
/// # Example
///
/// ```
/// use trellis_core::Context;
/// use http::{Method, StatusCode};
///
/// let mut ctx = Context::new(Method::GET, "/users/42")
///     .with_query("verbose=true")
///     .with_header("accept", "text/plain");
///
/// assert_eq!(ctx.query("verbose"), Some("true"));
/// assert_eq!(ctx.header("Accept"), Some("text/plain"));
///
/// ctx.put_state("user", String::from("ada"));
/// ctx.set_status(StatusCode::CREATED);
/// ctx.text("created");
///
/// assert_eq!(ctx.state::<String>("user").map(String::as_str), Some("ada"));
/// assert_eq!(ctx.status(), StatusCode::CREATED);
/// ```
pub struct Context {
    method: Method,
    path: String,
    raw_query: Option<String>,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    params: Params,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    state: HashMap<String, Box<dyn Any + Send + Sync>>,
    route: Option<Arc<Route>>,
    aborted: bool,

    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Bytes,
}

impl Context {
    /// Creates a context for `method` and `path`.
    ///
    /// `path` must not carry a query string; use [`Context::with_query`]
    /// or [`Context::from_request`] for that.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            raw_query: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
            params: Params::new(),
            body: Bytes::new(),
            remote_addr: None,
            state: HashMap::new(),
            route: None,
            aborted: false,
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Bytes::new(),
        }
    }

    /// Builds a context from an [`http::Request`].
    pub fn from_request(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let mut ctx = Self::new(parts.method, parts.uri.path());
        if let Some(query) = parts.uri.query() {
            ctx.set_raw_query(query);
        }
        ctx.headers = parts.headers;
        ctx.body = body;
        ctx
    }

    /// Sets the raw query string and parses it.
    #[must_use]
    pub fn with_query(mut self, raw: &str) -> Self {
        self.set_raw_query(raw);
        self
    }

    /// Adds a request header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Replaces the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the peer address of the connection.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    fn set_raw_query(&mut self, raw: &str) {
        self.query = serde_urlencoded::from_str(raw).unwrap_or_default();
        self.raw_query = Some(raw.to_string());
    }

    // ---------------------------------------------------------------------
    // Request accessors
    // ---------------------------------------------------------------------

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, if the request had one.
    pub fn raw_query(&self) -> Option<&str> {
        self.raw_query.as_deref()
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of a request header as a string. Names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a query parameter, in order.
    pub fn query_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All query parameters, in order.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Sets or replaces a query parameter.
    pub fn set_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.query.retain(|(k, _)| *k != name);
        self.query.push((name, value.into()));
    }

    /// Deserializes the query string into `T`.
    pub fn query_as<T: DeserializeOwned>(&self) -> TrellisResult<T> {
        serde_urlencoded::from_str(self.raw_query.as_deref().unwrap_or(""))
            .map_err(|e| TrellisError::bad_request(format!("invalid query string: {e}")))
    }

    /// A bound path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// All bound path parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Mutable path parameters.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Replaces the path parameters, e.g. after a route match.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Raw request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Request body as UTF-8 text.
    pub fn body_text(&self) -> TrellisResult<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| TrellisError::bad_request(format!("body is not valid UTF-8: {e}")))
    }

    /// Deserializes the request body as JSON.
    pub fn body_json<T: DeserializeOwned>(&self) -> TrellisResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| TrellisError::bad_request(format!("invalid JSON body: {e}")))
    }

    /// Value of a request cookie.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    /// Peer address of the connection, if the server supplied one.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Best guess at the originating client address.
    ///
    /// Checks [`CLIENT_IP_HEADERS`] in order (taking the first entry of a
    /// comma-separated list) and falls back to the peer address.
    pub fn client_ip(&self) -> Option<IpAddr> {
        CLIENT_IP_HEADERS
            .iter()
            .filter_map(|name| self.header(name))
            .filter_map(|v| v.split(',').next())
            .find_map(|v| v.trim().parse().ok())
            .or_else(|| self.remote_addr.map(|a| a.ip()))
    }

    /// The route this request matched, once routing has run.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    /// Records the matched route.
    pub fn set_route(&mut self, route: Arc<Route>) {
        self.route = Some(route);
    }

    // ---------------------------------------------------------------------
    // State map
    // ---------------------------------------------------------------------

    /// Stores a value under `key`, replacing any previous value.
    pub fn put_state<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.state.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn state<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.state.get(key).and_then(|v| v.downcast_ref())
    }

    /// Mutable access to the value under `key`.
    pub fn state_mut<T: Any + Send + Sync>(&mut self, key: &str) -> Option<&mut T> {
        self.state.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Removes and returns the value under `key` if it is a `T`.
    ///
    /// A value of a different type is left in place.
    pub fn remove_state<T: Any + Send + Sync>(&mut self, key: &str) -> Option<T> {
        if !self.state.get(key).is_some_and(|v| v.is::<T>()) {
            return None;
        }
        self.state
            .remove(key)
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }

    /// Returns true if any value is stored under `key`.
    pub fn has_state(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    // ---------------------------------------------------------------------
    // Flow control
    // ---------------------------------------------------------------------

    /// Stops the chain: later middleware and the handler are skipped.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Sets `status`, writes `message` as text and aborts.
    pub fn abort_with(&mut self, status: StatusCode, message: impl Into<String>) {
        self.set_status(status);
        self.text(message.into());
        self.abort();
    }

    /// Returns true once [`Context::abort`] has been called.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    // ---------------------------------------------------------------------
    // Response
    // ---------------------------------------------------------------------

    /// Response status (200 until set).
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Response headers.
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Mutable response headers.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// First value of a response header as a string.
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a response header, replacing existing values.
    pub fn set_header(&mut self, name: impl IntoHeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    /// Sets a response header from strings.
    pub fn try_set_header(&mut self, name: &str, value: &str) -> TrellisResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TrellisError::internal_with(format!("invalid header name '{name}'"), e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TrellisError::internal_with(format!("invalid value for '{name}'"), e))?;
        self.response_headers.insert(name, value);
        Ok(())
    }

    /// Adds a response header value without replacing existing ones.
    pub fn append_header(&mut self, name: impl IntoHeaderName, value: HeaderValue) {
        self.response_headers.append(name, value);
    }

    /// Response body.
    pub fn response_body(&self) -> &Bytes {
        &self.response_body
    }

    /// Replaces the response body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.response_body = body.into();
    }

    /// Writes a `text/plain` body.
    pub fn text(&mut self, body: impl Into<String>) {
        self.set_content(TEXT_PLAIN, body.into());
    }

    /// Writes a `text/html` body.
    pub fn html(&mut self, body: impl Into<String>) {
        self.set_content(TEXT_HTML, body.into());
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> TrellisResult<()> {
        let body = serde_json::to_vec(value)
            .map_err(|e| TrellisError::internal_with("failed to serialize JSON response", e))?;
        self.set_content(APPLICATION_JSON, body);
        Ok(())
    }

    /// Redirects to `location` with 302 Found.
    pub fn redirect(&mut self, location: &str) -> TrellisResult<()> {
        self.redirect_with(StatusCode::FOUND, location)
    }

    /// Redirects to `location` with the given 3xx status.
    pub fn redirect_with(&mut self, status: StatusCode, location: &str) -> TrellisResult<()> {
        let value = HeaderValue::from_str(location)
            .map_err(|e| TrellisError::internal_with("invalid redirect location", e))?;
        self.status = status;
        self.response_headers.insert(header::LOCATION, value);
        Ok(())
    }

    fn set_content(&mut self, content_type: &'static str, body: impl Into<Bytes>) {
        self.response_headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.response_body = body.into();
    }

    /// Copies the response fields into an [`http::Response`].
    pub fn to_response(&self) -> Response<Bytes> {
        let mut response = Response::new(self.response_body.clone());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.response_headers.clone();
        response
    }

    // ---------------------------------------------------------------------
    // Pooling
    // ---------------------------------------------------------------------

    /// Clears every mutable field back to its default.
    ///
    /// Maps and buffers keep their capacity. Method and path are left as
    /// they are; a pool rebinds them when the context is reused.
    pub fn reset(&mut self) {
        self.raw_query = None;
        self.headers.clear();
        self.query.clear();
        self.params.clear();
        self.body = Bytes::new();
        self.remote_addr = None;
        self.state.clear();
        self.route = None;
        self.aborted = false;
        self.status = StatusCode::OK;
        self.response_headers.clear();
        self.response_body = Bytes::new();
    }

    /// Points a reset context at a new request line.
    pub(crate) fn rebind(&mut self, method: Method, path: &str) {
        self.method = method;
        self.path.clear();
        self.path.push_str(path);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("state_keys", &self.state.keys().collect::<Vec<_>>())
            .field("status", &self.status)
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}
