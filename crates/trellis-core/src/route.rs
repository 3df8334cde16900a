//! Route definitions and their documentation metadata.
//!
//! Metadata is inert: dispatch never reads it. It exists so a
//! documentation generator can walk the registered routes.

use std::fmt;

use serde::Serialize;
use trellis_router::MethodFilter;

use crate::handler::BoxHandler;
use crate::{Context, TrellisResult};

/// Where a documented parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// A `:name` path segment
    Path,
    /// A query string parameter
    Query,
    /// A request header
    Header,
}

/// A documented request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamDoc {
    /// Parameter name
    pub name: String,
    /// Where the parameter comes from
    #[serde(rename = "in")]
    pub location: ParamLocation,
    /// Short Rust type name of the value
    pub schema: String,
    /// Whether the request must supply it
    pub required: bool,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A documented request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodyDoc {
    /// Short Rust type name of the body
    pub schema: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A documented response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseDoc {
    /// Status code
    pub status: u16,
    /// Short Rust type name of the body
    pub schema: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Documentation attached to one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteDoc {
    /// One-line summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Longer description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Grouping tags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Documented parameters
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamDoc>,
    /// Documented request body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyDoc>,
    /// Documented responses
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<ResponseDoc>,
    /// Whether the route is deprecated
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

/// Returns `T`'s type name with module paths stripped.
///
/// `alloc::vec::Vec<app::User>` becomes `Vec<User>`.
pub fn schema_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut ident = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            ident.push(c);
        } else {
            out.push_str(ident.rsplit("::").next().unwrap_or(""));
            ident.clear();
            out.push(c);
        }
    }
    out.push_str(ident.rsplit("::").next().unwrap_or(""));
    out
}

/// One registered `(method, path, handler)` with its documentation.
#[derive(Clone)]
pub struct Route {
    method: MethodFilter,
    path: String,
    handler: BoxHandler,
    doc: RouteDoc,
}

impl Route {
    /// Creates an undocumented route.
    pub fn new(method: impl Into<MethodFilter>, path: impl Into<String>, handler: BoxHandler) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            handler,
            doc: RouteDoc::default(),
        }
    }

    /// The method filter this route answers to.
    pub fn method(&self) -> &MethodFilter {
        &self.method
    }

    /// The path pattern.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replaces the path pattern, e.g. when a group prefix is applied.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// The route handler.
    pub fn handler(&self) -> &BoxHandler {
        &self.handler
    }

    /// Runs the route handler.
    pub fn call(&self, ctx: &mut Context) -> TrellisResult<()> {
        self.handler.call(ctx)
    }

    /// Documentation metadata.
    pub fn doc(&self) -> &RouteDoc {
        &self.doc
    }

    /// Sets the summary.
    pub fn summary(&mut self, summary: impl Into<String>) -> &mut Self {
        self.doc.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.doc.description = Some(description.into());
        self
    }

    /// Replaces the tags.
    pub fn tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.doc.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Documents a parameter of type `T`.
    ///
    /// A name that appears as `:name` in the path is documented as a path
    /// parameter, anything else as a query parameter.
    pub fn param<T: ?Sized>(
        &mut self,
        name: impl Into<String>,
        required: bool,
        description: impl Into<String>,
    ) -> &mut Self {
        let name = name.into();
        let in_path = self
            .path
            .split('/')
            .any(|s| s.strip_prefix(':') == Some(name.as_str()));
        let location = if in_path {
            ParamLocation::Path
        } else {
            ParamLocation::Query
        };
        self.push_param::<T>(name, location, required, description.into())
    }

    /// Documents a request header of type `T`.
    pub fn header_param<T: ?Sized>(
        &mut self,
        name: impl Into<String>,
        required: bool,
        description: impl Into<String>,
    ) -> &mut Self {
        self.push_param::<T>(name.into(), ParamLocation::Header, required, description.into())
    }

    fn push_param<T: ?Sized>(
        &mut self,
        name: String,
        location: ParamLocation,
        required: bool,
        description: String,
    ) -> &mut Self {
        self.doc.params.push(ParamDoc {
            name,
            location,
            schema: schema_name::<T>(),
            required,
            description: Some(description).filter(|d| !d.is_empty()),
        });
        self
    }

    /// Documents the request body as type `T`.
    pub fn body<T: ?Sized>(&mut self, description: impl Into<String>) -> &mut Self {
        let description = description.into();
        self.doc.body = Some(BodyDoc {
            schema: schema_name::<T>(),
            description: Some(description).filter(|d| !d.is_empty()),
        });
        self
    }

    /// Documents a response with status `status` and body type `T`.
    pub fn response<T: ?Sized>(&mut self, status: u16, description: impl Into<String>) -> &mut Self {
        let description = description.into();
        self.doc.responses.push(ResponseDoc {
            status,
            schema: schema_name::<T>(),
            description: Some(description).filter(|d| !d.is_empty()),
        });
        self
    }

    /// Marks the route deprecated.
    pub fn deprecated(&mut self) -> &mut Self {
        self.doc.deprecated = true;
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;
    use http::Method;

    struct User;

    fn noop() -> BoxHandler {
        handler(|_| Ok(()))
    }

    #[test]
    fn test_schema_name_strips_paths() {
        assert_eq!(schema_name::<String>(), "String");
        assert_eq!(schema_name::<Vec<User>>(), "Vec<User>");
        assert_eq!(schema_name::<Option<u32>>(), "Option<u32>");
        assert_eq!(schema_name::<str>(), "str");
    }

    #[test]
    fn test_fluent_metadata() {
        let mut route = Route::new(Method::POST, "/users/:id/posts", noop());
        route
            .summary("Create post")
            .description("Creates a post for the user")
            .tags(["posts", "users"])
            .param::<u64>("id", true, "User id")
            .param::<bool>("draft", false, "")
            .body::<User>("The new post")
            .response::<User>(201, "Created")
            .response::<String>(404, "No such user");

        let doc = route.doc();
        assert_eq!(doc.summary.as_deref(), Some("Create post"));
        assert_eq!(doc.tags, vec!["posts", "users"]);
        assert_eq!(doc.params[0].location, ParamLocation::Path);
        assert_eq!(doc.params[0].schema, "u64");
        assert_eq!(doc.params[1].location, ParamLocation::Query);
        assert_eq!(doc.params[1].description, None);
        assert_eq!(doc.body.as_ref().map(|b| b.schema.as_str()), Some("User"));
        assert_eq!(doc.responses.len(), 2);
        assert_eq!(route.to_string(), "POST /users/:id/posts");
    }

    #[test]
    fn test_doc_serializes_compactly() {
        let mut route = Route::new(MethodFilter::Any, "/health", noop());
        route.summary("Health").header_param::<str>("x-probe", false, "Probe id");

        let json = serde_json::to_value(route.doc()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "summary": "Health",
                "params": [{
                    "name": "x-probe",
                    "in": "header",
                    "schema": "str",
                    "required": false,
                    "description": "Probe id"
                }]
            })
        );
    }
}
