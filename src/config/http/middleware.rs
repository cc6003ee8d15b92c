use serde::Deserialize;

/// Selects which global middleware layers are installed.
///
/// ```toml
/// [http]
/// exclude = ["timeout", "logging"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMiddlewareConfig {
    Include(Vec<HttpMiddleware>),
    Exclude(Vec<HttpMiddleware>),
}

impl HttpMiddlewareConfig {
    pub fn is_enabled(&self, middleware: HttpMiddleware) -> bool {
        match self {
            HttpMiddlewareConfig::Include(list) => list.contains(&middleware),
            HttpMiddlewareConfig::Exclude(list) => !list.contains(&middleware),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HttpMiddleware {
    BodyLimit,
    Cors,
    Logging,
    Timeout,
    RequestId,
    Liveness,
    CatchPanic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_enabled_include() {
        let config = HttpMiddlewareConfig::Include(vec![HttpMiddleware::Logging]);
        assert!(config.is_enabled(HttpMiddleware::Logging));
        assert!(!config.is_enabled(HttpMiddleware::Cors));
    }

    #[test]
    fn test_is_enabled_exclude() {
        let config = HttpMiddlewareConfig::Exclude(vec![HttpMiddleware::CatchPanic]);
        assert!(!config.is_enabled(HttpMiddleware::CatchPanic));
        assert!(config.is_enabled(HttpMiddleware::RequestId));
    }

    #[test]
    fn test_middleware_names_are_kebab_case() {
        #[derive(Deserialize)]
        struct Names {
            names: Vec<HttpMiddleware>,
        }
        let parsed: Names =
            toml::from_str(r#"names = ["body-limit", "request-id", "catch-panic"]"#).unwrap();
        assert_eq!(
            parsed.names,
            vec![
                HttpMiddleware::BodyLimit,
                HttpMiddleware::RequestId,
                HttpMiddleware::CatchPanic
            ]
        );
    }
}
