//! Tracing/logging initialization.
//!
//! The filter comes from `RUST_LOG` and defaults to `info`; the format from
//! `HAULX_LOG_FORMAT` (`json` or `pretty`) and defaults to JSON. Library crates
//! only emit events; installing a subscriber is left to binaries and tests.

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "HAULX_LOG_FORMAT";

/// Output format of the installed subscriber.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, for log shipping.
    #[default]
    Json,
    /// Human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Parse `json`/`pretty` (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// Format named under [`LOG_FORMAT_VAR`] in `lookup`. Unset or unknown
    /// values fall back to JSON; the raw unknown value is returned alongside.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Option<String>) {
        match lookup(LOG_FORMAT_VAR) {
            None => (Self::default(), None),
            Some(raw) => match Self::parse(&raw) {
                Some(format) => (format, None),
                None => (Self::default(), Some(raw)),
            },
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init(),
        LogFormat::Pretty => builder.compact().try_init(),
    };
}

/// Initialize with the format named by `HAULX_LOG_FORMAT`.
pub fn init_from_env() {
    let (format, rejected) = LogFormat::from_lookup(|key| std::env::var(key).ok());
    init(format);
    if let Some(raw) = rejected {
        ::tracing::warn!(var = LOG_FORMAT_VAR, value = %raw, "unknown log format, using json");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init(LogFormat::Json);
        init(LogFormat::Pretty);
        ::tracing::info!(posting = 1, "still logging");
    }

    #[test]
    fn formats_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    fn env(value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |key| (key == LOG_FORMAT_VAR).then(|| value.to_string())
    }

    #[test]
    fn format_comes_from_the_lookup() {
        assert_eq!(LogFormat::from_lookup(env("pretty")), (LogFormat::Pretty, None));
        assert_eq!(LogFormat::from_lookup(env("Json")), (LogFormat::Json, None));
        assert_eq!(
            LogFormat::from_lookup(env("xml")),
            (LogFormat::Json, Some("xml".to_string()))
        );
        assert_eq!(LogFormat::from_lookup(|_| None), (LogFormat::Json, None));
    }
}
