//! URL path canonicalisation for route compilation.
//!
//! Each fragment (global prefix, controller prefix, route path) is normalized
//! on its own and the results are concatenated as-is. Because a normalized
//! fragment is either empty or starts with `/`, concatenation never needs a
//! second pass.

/// Normalizes a single path fragment.
///
/// - `""` stays `""`
/// - a missing leading `/` is added
/// - one trailing `/` is stripped, unless the fragment is exactly `/`
///
/// ```
/// use axum_controllers::path::normalize;
///
/// assert_eq!(normalize(""), "");
/// assert_eq!(normalize("a/"), "/a");
/// assert_eq!(normalize("/a/"), "/a");
/// assert_eq!(normalize("/"), "/");
/// ```
pub fn normalize(fragment: &str) -> String {
    if fragment.is_empty() {
        return String::new();
    }

    let mut path = if fragment.starts_with('/') {
        fragment.to_string()
    } else {
        format!("/{fragment}")
    };

    if path != "/" && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Builds the full route path from its three fragments.
///
/// ```
/// use axum_controllers::path::join;
///
/// assert_eq!(join("/api", "/auth", "/login"), "/api/auth/login");
/// assert_eq!(join("api", "", "users/"), "/api/users");
/// ```
pub fn join(global_prefix: &str, controller_prefix: &str, route_path: &str) -> String {
    let mut full = normalize(global_prefix);
    full.push_str(&normalize(controller_prefix));
    full.push_str(&normalize(route_path));
    full
}

/// Rewrites express-style captures into axum's syntax: a `:name` segment
/// becomes `{name}`, a `*name` segment becomes `{*name}` and a bare `*`
/// becomes `{*wildcard}`.
///
/// Only whole segments are rewritten; a `:` inside a segment is left alone.
pub(crate) fn to_axum_captures(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
                format!("{{{name}}}")
            } else if segment == "*" {
                "{*wildcard}".to_string()
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A capture segment of a lowered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Capture<'a> {
    Named(&'a str),
    CatchAll(&'a str),
}

impl<'a> Capture<'a> {
    fn parse(segment: &'a str) -> Option<Self> {
        let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
        match inner.strip_prefix('*') {
            Some(name) => Some(Capture::CatchAll(name)),
            None => Some(Capture::Named(inner)),
        }
    }

    pub(crate) fn name(&self) -> &'a str {
        match *self {
            Capture::Named(name) | Capture::CatchAll(name) => name,
        }
    }
}

/// The capture segments of a lowered path, in order.
pub(crate) fn captures(lowered: &str) -> Vec<Capture<'_>> {
    lowered.split('/').filter_map(Capture::parse).collect()
}

/// The lowered path with every capture name erased. Two paths with the same
/// shape match exactly the same requests.
pub(crate) fn shape(lowered: &str) -> String {
    lowered
        .split('/')
        .map(|segment| match Capture::parse(segment) {
            Some(Capture::Named(_)) => "{}",
            Some(Capture::CatchAll(_)) => "{*}",
            None => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_table() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("a"), "/a");
        assert_eq!(normalize("a/"), "/a");
        assert_eq!(normalize("/a/"), "/a");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/a/b"), "/a/b");
    }

    #[test]
    fn test_normalize_strips_only_one_trailing_slash() {
        assert_eq!(normalize("a//"), "/a/");
        assert_eq!(normalize("//"), "/");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/api", "/auth", "/login"), "/api/auth/login");
        assert_eq!(join("/api", "auth", "login"), "/api/auth/login");
        assert_eq!(join("", "", ""), "");
        assert_eq!(join("/api", "", ""), "/api");
    }

    #[test]
    fn test_join_does_not_collapse_root_fragments() {
        // Each "/" survives normalization, and the concatenation is not re-normalized.
        assert_eq!(join("/", "/", "/"), "///");
        assert_eq!(join("/api", "/", "users"), "/api//users");
    }

    #[test]
    fn test_to_axum_captures() {
        assert_eq!(to_axum_captures("/api/users/:id"), "/api/users/{id}");
        assert_eq!(
            to_axum_captures("/api/:org/repos/:repo"),
            "/api/{org}/repos/{repo}"
        );
        assert_eq!(to_axum_captures("/api/a:b"), "/api/a:b");
        assert_eq!(to_axum_captures("/api/{id}"), "/api/{id}");
    }

    #[test]
    fn test_to_axum_captures_wildcards() {
        assert_eq!(to_axum_captures("/files/*"), "/files/{*wildcard}");
        assert_eq!(to_axum_captures("/files/*rest"), "/files/{*rest}");
        assert_eq!(to_axum_captures("/files/a*b"), "/files/a*b");
    }

    #[test]
    fn test_shape_ignores_capture_names() {
        assert_eq!(shape("/users/{id}"), shape("/users/{userId}"));
        assert_eq!(shape("/files/{*rest}"), "/files/{*}");
        assert_ne!(shape("/users/{id}"), shape("/users/me"));
        assert_eq!(
            captures("/orgs/{org}/files/{*rest}"),
            vec![Capture::Named("org"), Capture::CatchAll("rest")]
        );
    }

    mod proptest_path {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Normalizing twice gives the same result as normalizing once
            #[test]
            fn normalize_is_idempotent(fragment in "/?[a-z]{1,4}(/[a-z]{1,4}){0,2}/?") {
                let once = normalize(&fragment);
                prop_assert_eq!(normalize(&once), once);
            }

            /// A normalized non-empty fragment always starts with a slash
            #[test]
            fn normalized_starts_with_slash(fragment in "[a-z/]{1,12}") {
                prop_assert!(normalize(&fragment).starts_with('/'));
            }

            /// The joined path is exactly the concatenation of the normalized fragments
            #[test]
            fn join_is_concatenation(
                a in "[a-z/]{0,6}",
                b in "[a-z/]{0,6}",
                c in "[a-z/]{0,6}"
            ) {
                let expected = format!("{}{}{}", normalize(&a), normalize(&b), normalize(&c));
                prop_assert_eq!(join(&a, &b, &c), expected);
            }
        }
    }
}
