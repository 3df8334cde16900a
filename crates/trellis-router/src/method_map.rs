//! Per-method values stored at terminal tree nodes.

use std::fmt;

use http::Method;
use smallvec::SmallVec;

/// The method a route answers to.
///
/// `Any` accepts every method but loses to an exact registration on the
/// same pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodFilter {
    /// A single HTTP method
    Exact(Method),
    /// Every method
    Any,
}

impl MethodFilter {
    /// Returns true if a request with `method` passes this filter.
    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Self::Exact(m) => m == method,
            Self::Any => true,
        }
    }

    /// Returns the canonical uppercase name (`ANY` for the wildcard filter).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(m) => m.as_str(),
            Self::Any => "ANY",
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        Self::Exact(method)
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering used when listing methods, e.g. in an `Allow` header.
fn method_rank(method: &Method) -> u8 {
    match *method {
        Method::GET => 0,
        Method::HEAD => 1,
        Method::POST => 2,
        Method::PUT => 3,
        Method::PATCH => 4,
        Method::DELETE => 5,
        Method::OPTIONS => 6,
        Method::TRACE => 7,
        Method::CONNECT => 8,
        _ => 9,
    }
}

/// Sorts `methods` into canonical order and drops duplicates.
pub(crate) fn sort_methods(methods: &mut Vec<Method>) {
    methods.sort_by(|a, b| (method_rank(a), a.as_str()).cmp(&(method_rank(b), b.as_str())));
    methods.dedup();
}

/// Maps HTTP methods to values at a single route endpoint.
#[derive(Debug, Clone)]
pub struct MethodMap<T> {
    exact: SmallVec<[(Method, T); 2]>,
    any: Option<T>,
}

impl<T> Default for MethodMap<T> {
    fn default() -> Self {
        Self {
            exact: SmallVec::new(),
            any: None,
        }
    }
}

impl<T> MethodMap<T> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` for `filter`.
    ///
    /// Hands the value back if the slot is already taken.
    pub fn insert(&mut self, filter: MethodFilter, value: T) -> Result<(), T> {
        match filter {
            MethodFilter::Any => {
                if self.any.is_some() {
                    return Err(value);
                }
                self.any = Some(value);
            }
            MethodFilter::Exact(method) => {
                if self.exact.iter().any(|(m, _)| *m == method) {
                    return Err(value);
                }
                let pos = self
                    .exact
                    .iter()
                    .position(|(m, _)| {
                        (method_rank(m), m.as_str()) > (method_rank(&method), method.as_str())
                    })
                    .unwrap_or(self.exact.len());
                self.exact.insert(pos, (method, value));
            }
        }
        Ok(())
    }

    /// Returns the value for `method`; an exact registration wins over `ANY`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.exact
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
            .or(self.any.as_ref())
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.any.is_none()
    }

    /// Returns true if an `ANY` value is registered.
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.any.is_some()
    }

    /// Lists the explicitly registered methods in canonical order.
    #[must_use]
    pub fn allowed(&self) -> Vec<Method> {
        self.exact.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Iterates over `(filter, value)` pairs, exact methods first.
    pub fn iter(&self) -> impl Iterator<Item = (MethodFilter, &T)> {
        self.exact
            .iter()
            .map(|(m, v)| (MethodFilter::Exact(m.clone()), v))
            .chain(self.any.iter().map(|v| (MethodFilter::Any, v)))
    }
}
