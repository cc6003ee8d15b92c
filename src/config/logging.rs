use {crate::Result, serde::Deserialize};

///
/// Configuration for log output.
///
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// `default` (full human-readable), `json`, `compact` or `pretty`.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Default,
    Compact,
    Pretty,
}
