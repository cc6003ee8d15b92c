mod cors;
mod middleware;

pub use cors::*;
pub use middleware::*;

use {
    crate::{Error, Result},
    serde::Deserialize,
    std::time::Duration,
};

///
/// Configuration for the HTTP server and the global middleware stack.
///
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// IP address to bind to. Defaults to "127.0.0.1".
    #[serde(default = "HttpConfig::default_bind_addr")]
    pub bind_addr: String,

    /// Port to bind to. Defaults to 4600; `PORT` in the environment overrides
    /// it through [`crate::Config::with_app_env`].
    #[serde(default = "HttpConfig::default_bind_port")]
    pub bind_port: u16,

    /// Prefix prepended to every controller route. Defaults to "/api".
    #[serde(default = "HttpConfig::default_global_prefix")]
    pub global_prefix: String,

    /// Largest accepted request body; larger bodies get a 413. Defaults to
    /// 100KiB.
    #[serde(default = "HttpConfig::default_max_payload_size_bytes")]
    pub max_payload_size_bytes: byte_unit::Byte,

    /// Optional transport-level timeout, answered with 408. Off by default.
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// How long in-flight requests may drain after a shutdown signal.
    #[serde(
        default = "HttpConfig::default_shutdown_timeout",
        with = "humantime_serde"
    )]
    pub shutdown_timeout: Duration,

    /// Liveness probe route. Defaults to "/live".
    #[serde(default = "HttpConfig::default_liveness_route")]
    pub liveness_route: String,

    /// CORS rules. When absent every origin is allowed.
    pub cors: Option<HttpCorsConfig>,

    #[serde(flatten)]
    pub middleware: Option<HttpMiddlewareConfig>,
}

impl HttpConfig {
    pub fn full_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    /// The body limit in bytes, saturated to `usize`.
    pub fn body_limit(&self) -> usize {
        usize::try_from(self.max_payload_size_bytes.as_u64()).unwrap_or(usize::MAX)
    }

    fn default_bind_addr() -> String {
        "127.0.0.1".into()
    }

    fn default_bind_port() -> u16 {
        4600
    }

    fn default_global_prefix() -> String {
        "/api".into()
    }

    fn default_max_payload_size_bytes() -> byte_unit::Byte {
        byte_unit::Byte::from_u64(100 * 1024)
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(30)
    }

    fn default_liveness_route() -> String {
        "/live".into()
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(Error::invalid_input(
                "HTTP bind_addr is required. Set [http] bind_addr = \"0.0.0.0\" or \"127.0.0.1\" in config.",
            ));
        }

        if self.bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(Error::invalid_input(
                "HTTP bind_addr must be a valid IP address. Examples: \"127.0.0.1\", \"0.0.0.0\", \"::1\"",
            ));
        }

        if self.global_prefix.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
            return Err(Error::invalid_input(format!(
                "HTTP global_prefix {:?} must be a plain path without whitespace, query or fragment",
                self.global_prefix
            )));
        }

        if !self.liveness_route.starts_with('/') {
            return Err(Error::invalid_input(
                "HTTP liveness_route must start with '/'",
            ));
        }

        if self.max_payload_size_bytes.as_u64() == 0 {
            return Err(Error::invalid_input(
                "HTTP max_payload_size_bytes must be > 0",
            ));
        }

        if let Some(cors) = &self.cors {
            cors.validate()?;
        }

        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            bind_addr: Self::default_bind_addr(),
            bind_port: Self::default_bind_port(),
            global_prefix: Self::default_global_prefix(),
            max_payload_size_bytes: Self::default_max_payload_size_bytes(),
            request_timeout: None,
            shutdown_timeout: Self::default_shutdown_timeout(),
            liveness_route: Self::default_liveness_route(),
            cors: None,
            middleware: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;

    #[test]
    fn test_http_defaults_from_empty_section() {
        let config: Config = "[http]\n".parse().unwrap();
        assert_eq!(config.http.bind_addr, "127.0.0.1");
        assert_eq!(config.http.bind_port, 4600);
        assert_eq!(config.http.global_prefix, "/api");
        assert_eq!(config.http.body_limit(), 100 * 1024);
        assert_eq!(config.http.liveness_route, "/live");
        assert_eq!(config.http.shutdown_timeout, Duration::from_secs(30));
        assert!(config.http.request_timeout.is_none());
        assert!(config.http.middleware.is_none());
    }

    #[test]
    fn test_http_exclude_list_is_parsed() {
        let config: Config = r#"
[http]
exclude = ["timeout", "cors"]
"#
        .parse()
        .unwrap();

        let middleware = config.http.middleware.unwrap();
        assert!(!middleware.is_enabled(HttpMiddleware::Timeout));
        assert!(!middleware.is_enabled(HttpMiddleware::Cors));
        assert!(middleware.is_enabled(HttpMiddleware::Logging));
    }

    #[test]
    fn test_validate_rejects_bad_bind_addr() {
        let config = HttpConfig {
            bind_addr: "localhost".into(),
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HttpConfig {
            bind_addr: "  ".into(),
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_prefix_with_query() {
        let config = HttpConfig {
            global_prefix: "/api?v=1".into(),
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_empty_prefix() {
        let config = HttpConfig {
            global_prefix: String::new(),
            ..HttpConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
