use {
    crate::{Error, Result},
    http::{HeaderName, HeaderValue, Method},
    serde::Deserialize,
    std::{str::FromStr, time::Duration},
    tower_http::cors::{Any, CorsLayer},
};

/// Cross-origin settings.
///
/// Without a `[http.cors]` section every origin is allowed, the way a bare
/// `cors()` middleware behaves. Lists left unset fall back to wildcards unless
/// credentials are allowed, in which case nothing is implied.
///
/// ```toml
/// [http.cors]
/// allow_credentials = true
/// allowed_origins = ["https://app.example.com"]
/// allowed_methods = ["GET", "POST"]
/// allowed_headers = ["content-type", "authorization"]
/// exposed_headers = ["x-request-id"]
/// max_age = "1h"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HttpCorsConfig {
    pub allow_credentials: Option<bool>,
    pub allowed_origins: Option<Vec<String>>,
    pub allowed_methods: Option<Vec<CorsMethod>>,
    pub allowed_headers: Option<Vec<CorsHeader>>,
    pub exposed_headers: Option<Vec<CorsHeader>>,
    #[serde(default, with = "humantime_serde")]
    pub max_age: Option<Duration>,
}

impl HttpCorsConfig {
    pub fn with_allow_credentials(mut self) -> Self {
        self.allow_credentials = Some(true);
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    pub fn with_allowed_methods(mut self, methods: Vec<CorsMethod>) -> Self {
        self.allowed_methods = Some(methods);
        self
    }

    pub fn with_allowed_headers(mut self, headers: Vec<CorsHeader>) -> Self {
        self.allowed_headers = Some(headers);
        self
    }

    pub fn with_exposed_headers(mut self, headers: Vec<CorsHeader>) -> Self {
        self.exposed_headers = Some(headers);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    fn credentials(&self) -> bool {
        self.allow_credentials.unwrap_or(false)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(origins) = &self.allowed_origins {
            for origin in origins {
                if origin == "*" {
                    if self.credentials() {
                        return Err(Error::invalid_input(
                            "CORS allowed_origins cannot contain \"*\" when allow_credentials = true",
                        ));
                    }
                    continue;
                }
                HeaderValue::from_str(origin).map_err(|_| {
                    Error::invalid_input(format!("CORS origin {origin:?} is not a valid header value"))
                })?;
            }
        } else if self.credentials() {
            return Err(Error::invalid_input(
                "CORS allow_credentials = true requires an explicit allowed_origins list",
            ));
        }
        Ok(())
    }

    /// Builds the tower-http layer for these settings.
    pub(crate) fn layer(&self) -> CorsLayer {
        let credentials = self.credentials();
        let mut cors = CorsLayer::new();

        match &self.allowed_origins {
            Some(origins) if origins.iter().any(|o| o == "*") => cors = cors.allow_origin(Any),
            Some(origins) => {
                let origins: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|o| HeaderValue::from_str(o).ok())
                    .collect();
                cors = cors.allow_origin(origins);
            }
            None if !credentials => cors = cors.allow_origin(Any),
            None => {}
        }

        match &self.allowed_methods {
            Some(methods) => {
                cors = cors.allow_methods(methods.iter().map(|m| m.0.clone()).collect::<Vec<_>>())
            }
            None if !credentials => cors = cors.allow_methods(Any),
            None => {}
        }

        match &self.allowed_headers {
            Some(headers) => {
                cors = cors.allow_headers(headers.iter().map(|h| h.0.clone()).collect::<Vec<_>>())
            }
            None if !credentials => cors = cors.allow_headers(Any),
            None => {}
        }

        if let Some(headers) = &self.exposed_headers {
            cors = cors.expose_headers(headers.iter().map(|h| h.0.clone()).collect::<Vec<_>>());
        }
        if let Some(max_age) = self.max_age {
            cors = cors.max_age(max_age);
        }
        if credentials {
            cors = cors.allow_credentials(true);
        }
        cors
    }
}

/// An HTTP method parsed from its name.
#[derive(Debug, Clone)]
pub struct CorsMethod(pub Method);

impl<'de> Deserialize<'de> for CorsMethod {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Method::from_str(&s.to_uppercase())
            .map(CorsMethod)
            .map_err(serde::de::Error::custom)
    }
}

/// A header name parsed from a string.
#[derive(Debug, Clone)]
pub struct CorsHeader(pub HeaderName);

impl<'de> Deserialize<'de> for CorsHeader {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HeaderName::from_str(&s)
            .map(CorsHeader)
            .map_err(serde::de::Error::custom)
    }
}
