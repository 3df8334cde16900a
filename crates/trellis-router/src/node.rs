//! Radix tree node implementation.
//!
//! Each node is one path segment. Children are split by kind so the
//! match walk can try them in precedence order: literal, then parameter,
//! then wildcard.

use std::borrow::Cow;

use http::Method;

use crate::error::{RouteError, RouteResult};
use crate::method_map::{MethodFilter, MethodMap};
use crate::params::Params;

/// Type of path segment in the radix tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    /// Literal segment (e.g. `users`)
    Static,
    /// Named parameter (e.g. `:id`)
    Param(String),
    /// Trailing catch-all (e.g. `*path`)
    Wildcard(String),
}

/// Splits a request path or pattern into its non-empty segments.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Rebuilds `path` with a single leading slash and no empty segments.
pub(crate) fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in split_path(path) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Parses and validates a route pattern.
pub(crate) fn parse_pattern(pattern: &str) -> RouteResult<Vec<(String, SegmentKind)>> {
    if !pattern.starts_with('/') {
        return Err(RouteError::MissingLeadingSlash {
            pattern: pattern.to_string(),
        });
    }

    let raw: Vec<&str> = split_path(pattern).collect();
    let mut segments = Vec::with_capacity(raw.len());
    for (i, s) in raw.iter().enumerate() {
        let kind = if let Some(name) = s.strip_prefix(':') {
            SegmentKind::Param(name.to_string())
        } else if let Some(name) = s.strip_prefix('*') {
            if i + 1 != raw.len() {
                return Err(RouteError::WildcardNotLast {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }
            SegmentKind::Wildcard(name.to_string())
        } else {
            SegmentKind::Static
        };

        if matches!(&kind, SegmentKind::Param(n) | SegmentKind::Wildcard(n) if n.is_empty()) {
            return Err(RouteError::EmptyParamName {
                pattern: pattern.to_string(),
            });
        }
        segments.push(((*s).to_string(), kind));
    }
    Ok(segments)
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Cow::into_owned)
}

/// A node in the radix tree.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    segment: String,
    kind: SegmentKind,
    /// Normalized pattern, set once a route ends here
    pattern: Option<String>,
    methods: MethodMap<T>,
    /// Sorted by segment for binary search
    static_children: Vec<Node<T>>,
    param_child: Option<Box<Node<T>>>,
    wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn new(segment: String, kind: SegmentKind) -> Self {
        Self {
            segment,
            kind,
            pattern: None,
            methods: MethodMap::new(),
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates the root node.
    pub(crate) fn root() -> Self {
        Self::new(String::new(), SegmentKind::Static)
    }

    pub(crate) fn methods(&self) -> &MethodMap<T> {
        &self.methods
    }

    pub(crate) fn pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or("/")
    }

    /// Inserts `value` under the parsed `segments`.
    ///
    /// Conflicts are detected at existing nodes only, so a failed insert
    /// leaves no partial branch behind.
    pub(crate) fn insert_segments(
        &mut self,
        segments: &[(String, SegmentKind)],
        filter: MethodFilter,
        value: T,
        pattern: &str,
    ) -> RouteResult<()> {
        let Some(((segment, kind), remaining)) = segments.split_first() else {
            let method = filter.to_string();
            self.methods
                .insert(filter, value)
                .map_err(|_| RouteError::Conflict {
                    method,
                    pattern: pattern.to_string(),
                })?;
            if self.pattern.is_none() {
                self.pattern = Some(pattern.to_string());
            }
            return Ok(());
        };

        match kind {
            SegmentKind::Static => {
                let idx = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(idx) => idx,
                    Err(idx) => {
                        self.static_children
                            .insert(idx, Node::new(segment.clone(), SegmentKind::Static));
                        idx
                    }
                };
                self.static_children[idx].insert_segments(remaining, filter, value, pattern)
            }
            SegmentKind::Param(name) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Node::new(segment.clone(), kind.clone())));
                if let SegmentKind::Param(existing) = &child.kind {
                    if existing != name {
                        return Err(RouteError::ParamNameConflict {
                            pattern: pattern.to_string(),
                            existing: existing.clone(),
                            new: name.clone(),
                        });
                    }
                }
                child.insert_segments(remaining, filter, value, pattern)
            }
            SegmentKind::Wildcard(name) => {
                let child = self
                    .wildcard_child
                    .get_or_insert_with(|| Box::new(Node::new(segment.clone(), kind.clone())));
                if let SegmentKind::Wildcard(existing) = &child.kind {
                    if existing != name {
                        return Err(RouteError::WildcardNameConflict {
                            pattern: pattern.to_string(),
                            existing: existing.clone(),
                            new: name.clone(),
                        });
                    }
                }
                child.insert_segments(&[], filter, value, pattern)
            }
        }
    }

    /// Walks the tree for `segments`, binding parameters along the way.
    ///
    /// An endpoint counts only if it accepts `method`; with `None` any
    /// endpoint holding a value does. When a more specific branch dead-ends
    /// the walk backtracks and the bindings it made are discarded.
    pub(crate) fn find<'a>(
        &'a self,
        segments: &[&str],
        method: Option<&Method>,
        params: &mut Params,
    ) -> Option<&'a Node<T>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.accepts(method).then_some(self);
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.find(remaining, method, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), decode(segment));
                if let Some(found) = child.find(remaining, method, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let SegmentKind::Wildcard(name) = &child.kind {
                if child.accepts(method) {
                    params.push(name.clone(), decode(&segments.join("/")));
                    return Some(child);
                }
            }
        }

        None
    }

    /// Adds the methods of every endpoint `segments` can reach to `out`.
    pub(crate) fn collect_methods(&self, segments: &[&str], out: &mut Vec<Method>) {
        let Some((segment, remaining)) = segments.split_first() else {
            out.extend(self.methods.allowed());
            return;
        };
        if let Some(child) = self.find_static_child(segment) {
            child.collect_methods(remaining, out);
        }
        if let Some(child) = &self.param_child {
            child.collect_methods(remaining, out);
        }
        if let Some(child) = &self.wildcard_child {
            out.extend(child.methods.allowed());
        }
    }

    fn accepts(&self, method: Option<&Method>) -> bool {
        match method {
            Some(method) => self.methods.get(method).is_some(),
            None => !self.methods.is_empty(),
        }
    }

    fn find_static_child(&self, segment: &str) -> Option<&Node<T>> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(root: &mut Node<&'static str>, pattern: &str, value: &'static str) -> RouteResult<()> {
        let segments = parse_pattern(pattern)?;
        root.insert_segments(&segments, MethodFilter::Exact(Method::GET), value, &normalize(pattern))
    }

    fn find(root: &Node<&'static str>, path: &str) -> Option<(&'static str, Params)> {
        let segments: Vec<&str> = split_path(path).collect();
        let mut params = Params::new();
        root.find(&segments, Some(&Method::GET), &mut params)
            .and_then(|n| n.methods().get(&Method::GET).copied())
            .map(|v| (v, params))
    }

    #[test]
    fn test_parse_pattern_kinds() {
        let segments = parse_pattern("/users/:id/files/*rest").unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], ("users".to_string(), SegmentKind::Static));
        assert_eq!(segments[1], (":id".to_string(), SegmentKind::Param("id".to_string())));
        assert_eq!(
            segments[3],
            ("*rest".to_string(), SegmentKind::Wildcard("rest".to_string()))
        );
    }

    #[test]
    fn test_parse_pattern_rejects_bad_input() {
        assert!(matches!(
            parse_pattern("users"),
            Err(RouteError::MissingLeadingSlash { .. })
        ));
        assert!(matches!(
            parse_pattern("/files/*path/edit"),
            Err(RouteError::WildcardNotLast { .. })
        ));
        assert!(matches!(
            parse_pattern("/users/:"),
            Err(RouteError::EmptyParamName { .. })
        ));
        assert!(matches!(parse_pattern("/files/*"), Err(RouteError::EmptyParamName { .. })));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("users//list/"), "/users/list");
    }

    #[test]
    fn test_backtracking_drops_stale_bindings() {
        let mut root = Node::root();
        insert(&mut root, "/:a/x", "param-then-x").unwrap();
        insert(&mut root, "/*rest", "catch-all").unwrap();

        let (value, params) = find(&root, "/one/y").unwrap();
        assert_eq!(value, "catch-all");
        assert_eq!(params.get("a"), None);
        assert_eq!(params.get("rest"), Some("one/y"));
    }

    #[test]
    fn test_static_dead_end_falls_back_to_param() {
        let mut root = Node::root();
        insert(&mut root, "/users/me/settings", "settings").unwrap();
        insert(&mut root, "/users/:id", "user").unwrap();

        let (value, params) = find(&root, "/users/me").unwrap();
        assert_eq!(value, "user");
        assert_eq!(params.get("id"), Some("me"));
    }

    #[test]
    fn test_param_is_percent_decoded() {
        let mut root = Node::root();
        insert(&mut root, "/tags/:name", "tag").unwrap();

        let (_, params) = find(&root, "/tags/rust%20lang").unwrap();
        assert_eq!(params.get("name"), Some("rust lang"));
    }

    #[test]
    fn test_wildcard_needs_remainder() {
        let mut root = Node::root();
        insert(&mut root, "/files/*path", "file").unwrap();
        assert!(find(&root, "/files").is_none());
        assert!(find(&root, "/files/").is_none());
    }

    #[test]
    fn test_failed_insert_leaves_tree_intact() {
        let mut root = Node::root();
        insert(&mut root, "/users/:id", "user").unwrap();
        let err = insert(&mut root, "/users/:name/posts", "posts").unwrap_err();
        assert!(matches!(err, RouteError::ParamNameConflict { .. }));

        let (value, params) = find(&root, "/users/7").unwrap();
        assert_eq!(value, "user");
        assert_eq!(params.get("id"), Some("7"));
        assert!(find(&root, "/users/7/posts").is_none());
    }
}
