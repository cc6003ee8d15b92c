use {
    crate::Sensitive,
    std::{env, str::FromStr},
};

/// Process environment read once at startup.
///
/// A `.env` file in the working directory is loaded first when present.
/// Variables that are unset or do not parse keep their defaults; reading the
/// environment never fails.
///
/// | Variable     | Default       |
/// |--------------|---------------|
/// | `RUST_ENV`   | `development` |
/// | `PORT`       | `4600`        |
/// | `DB_URL`     | empty         |
/// | `JWT_SECRET` | empty         |
#[derive(Debug, Clone, PartialEq)]
pub struct AppEnv {
    pub run_mode: String,
    pub port: u16,
    pub db_url: String,
    pub jwt_secret: Sensitive<String>,
}

impl Default for AppEnv {
    fn default() -> Self {
        Self {
            run_mode: "development".into(),
            port: 4600,
            db_url: String::new(),
            jwt_secret: Sensitive::default(),
        }
    }
}

impl AppEnv {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the environment from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            run_mode: lookup("RUST_ENV")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.run_mode.clone()),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            db_url: lookup("DB_URL").unwrap_or_default(),
            jwt_secret: lookup("JWT_SECRET")
                .map(Sensitive)
                .unwrap_or_default(),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(
            self.run_mode.to_lowercase().as_str(),
            "prod" | "production" | "release"
        )
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %raw, "Unparsable value, using default {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let env = AppEnv::from_lookup(lookup(&[]));
        assert_eq!(env, AppEnv::default());
        assert_eq!(env.run_mode, "development");
        assert_eq!(env.port, 4600);
        assert_eq!(env.db_url, "");
        assert!(env.jwt_secret.is_empty());
    }

    #[test]
    fn test_values_are_read() {
        let env = AppEnv::from_lookup(lookup(&[
            ("RUST_ENV", "production"),
            ("PORT", "8080"),
            ("DB_URL", "postgres://db/app"),
            ("JWT_SECRET", "s3cret"),
        ]));
        assert_eq!(env.port, 8080);
        assert_eq!(env.db_url, "postgres://db/app");
        assert_eq!(env.jwt_secret.expose(), "s3cret");
        assert!(env.is_production());
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_unparsable_port_falls_back() {
        let env = AppEnv::from_lookup(lookup(&[("PORT", "eighty")]));
        assert_eq!(env.port, 4600);
        assert!(logs_contain("Unparsable value"));
    }

    #[test]
    fn test_secret_is_not_printed() {
        let env = AppEnv::from_lookup(lookup(&[("JWT_SECRET", "s3cret")]));
        assert!(!format!("{env:?}").contains("s3cret"));
    }
}
