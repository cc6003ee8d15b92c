//! Small helpers shared by configuration and the HTTP middleware stack.

use {
    http::{HeaderValue, Request},
    regex::{Captures, Regex},
    serde::Deserialize,
    std::{env, sync::LazyLock},
    tower_http::request_id::{MakeRequestId, RequestId},
    uuid::{ContextV7, Timestamp, Uuid},
    zeroize::{Zeroize, ZeroizeOnDrop},
};

/// `{{ VAR_NAME }}` with optional inner whitespace. Names follow the usual
/// upper-case environment variable convention.
static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").expect("placeholder pattern is a valid regex")
});

/// A secret value that prints as `Sensitive(****)` and is zeroed on drop.
///
/// ```
/// use axum_controllers::Sensitive;
///
/// let secret = Sensitive::from("jwt-signing-key");
/// assert_eq!(format!("{secret:?}"), "Sensitive(****)");
/// assert_eq!(secret.expose(), "jwt-signing-key");
/// ```
#[derive(Clone, Deserialize, Default, Zeroize, ZeroizeOnDrop)]
pub struct Sensitive<T: Default + Zeroize>(pub T);

impl Sensitive<String> {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Default + Zeroize + PartialEq> PartialEq for Sensitive<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Default + Zeroize> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sensitive(****)")
    }
}

/// Keeps an incoming `x-request-id`, or mints a UUIDv7 one.
#[derive(Debug, Clone, Copy)]
pub struct RequestIdGenerator;

impl MakeRequestId for RequestIdGenerator {
    fn make_request_id<B>(&mut self, req: &Request<B>) -> Option<RequestId> {
        if let Some(existing) = req.headers().get("x-request-id") {
            return Some(RequestId::new(existing.clone()));
        }
        let uuid = Uuid::new_v7(Timestamp::now(ContextV7::new().with_additional_precision()));
        HeaderValue::from_str(&uuid.to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Substitutes `{{ VAR }}` placeholders with environment variables.
///
/// Unset variables become empty strings and are reported with a warning.
///
/// ```
/// use axum_controllers::replace_handlebars_with_env;
///
/// assert_eq!(replace_handlebars_with_env("port = {{ SURELY_UNSET_VAR }}"), "port = ");
/// ```
pub fn replace_handlebars_with_env(input: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(input, |caps: &Captures| {
            let name = &caps[1];
            env::var(name).unwrap_or_else(|_| {
                tracing::warn!(variable = %name, "Environment variable not set, using empty string");
                String::new()
            })
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sensitive_hides_value() {
        let secret = Sensitive::from("hunter2");
        assert_eq!(format!("{secret:?}"), "Sensitive(****)");
        assert_eq!(secret.expose(), "hunter2");
        assert!(!secret.is_empty());
        assert!(Sensitive::<String>::default().is_empty());
    }

    #[test]
    fn test_sensitive_deserializes_transparently() {
        #[derive(Deserialize)]
        struct Secrets {
            key: Sensitive<String>,
        }
        let parsed: Secrets = toml::from_str(r#"key = "abc""#).unwrap();
        assert_eq!(parsed.key, Sensitive::from("abc"));
    }

    #[test]
    fn test_request_id_is_preserved() {
        let req = Request::builder()
            .header("x-request-id", "given-id")
            .body(())
            .unwrap();
        let id = RequestIdGenerator.make_request_id(&req).unwrap();
        assert_eq!(id.header_value(), "given-id");
    }

    #[test]
    fn test_request_id_is_generated_as_uuid_v7() {
        let req = Request::builder().body(()).unwrap();
        let id = RequestIdGenerator.make_request_id(&req).unwrap();
        let uuid = Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
    }

    #[test]
    fn test_replace_handlebars_whitespace_variants() {
        unsafe {
            env::set_var("AXC_SPACED_VAR", "v");
        }
        let output = replace_handlebars_with_env("{{AXC_SPACED_VAR}} {{ AXC_SPACED_VAR }} {{  AXC_SPACED_VAR  }}");
        assert_eq!(output, "v v v");
        unsafe {
            env::remove_var("AXC_SPACED_VAR");
        }
    }

    #[test]
    fn test_replace_handlebars_ignores_lowercase_names() {
        assert_eq!(replace_handlebars_with_env("{{ lower }}"), "{{ lower }}");
    }

    proptest! {
        /// Text without braces passes through untouched
        #[test]
        fn handlebars_plain_text_unchanged(s in "[^{}]*") {
            prop_assert_eq!(replace_handlebars_with_env(&s), s);
        }

        /// A set variable is substituted wherever it appears
        #[test]
        fn handlebars_set_variable_substituted(
            suffix in "[A-Z0-9_]{1,8}",
            value in "[a-z0-9]{1,12}",
            before in "[^{}]{0,8}",
            after in "[^{}]{0,8}"
        ) {
            let name = format!("AXC_PROPTEST_{suffix}");
            unsafe { env::set_var(&name, &value); }

            let input = format!("{before}{{{{ {name} }}}}{after}");
            let result = replace_handlebars_with_env(&input);

            unsafe { env::remove_var(&name); }
            prop_assert_eq!(result, format!("{before}{value}{after}"));
        }
    }
}
