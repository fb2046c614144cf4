//! Tracing subscriber setup shared by every crate in the workspace.
//!
//! Workspace crates log at the configured level, chatty HTTP and SQL
//! dependencies at `warn`. A custom directive string replaces that default
//! entirely. Two helpers keep credentials and full remote paths out of log
//! lines.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Json)
//!         .with_level(LogLevel::Debug),
//! )?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::time::LogLevel;
use tracing_subscriber::{
    filter::EnvFilter, fmt, fmt::format::FmtSpan, layer::SubscriberExt, registry::Registry,
    util::SubscriberInitExt, Layer,
};

const WORKSPACE_TARGETS: &[&str] = &[
    "cloud_music_core",
    "core_runtime",
    "core_auth",
    "core_library",
    "core_sync",
    "core_service",
    "provider_dropbox",
    "provider_yandex_disk",
    "bridge_desktop",
];

const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "rustls", "sqlx"];

const SENSITIVE_MARKERS: &[&str] = &[
    "token",
    "secret",
    "password",
    "authorization",
    "bearer",
    "api_key",
    "app_key",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; for a terminal
    Pretty,
    /// One JSON object per event
    Json,
    /// One line per event
    Compact,
}

impl Default for LogFormat {
    /// `Pretty` in debug builds, `Json` in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to workspace crates by the default filter
    pub level: LogLevel,
    /// `EnvFilter` directives, e.g. `core_sync=trace,sqlx=info`
    pub filter: Option<String>,
    /// Log span close events with their timings
    pub span_events: bool,
    pub show_target: bool,
    pub show_thread: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            span_events: true,
            show_target: true,
            show_thread: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(self, format: LogFormat) -> Self {
        Self { format, ..self }
    }

    pub fn with_level(self, level: LogLevel) -> Self {
        Self { level, ..self }
    }

    pub fn with_filter(self, directives: impl Into<String>) -> Self {
        Self {
            filter: Some(directives.into()),
            ..self
        }
    }

    pub fn with_span_events(self, span_events: bool) -> Self {
        Self {
            span_events,
            ..self
        }
    }

    pub fn with_target(self, show_target: bool) -> Self {
        Self {
            show_target,
            ..self
        }
    }

    pub fn with_thread(self, show_thread: bool) -> Self {
        Self {
            show_thread,
            ..self
        }
    }

    fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }
        let level = self.level.as_str();
        let mut directives: Vec<String> = WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect();
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
        directives.join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let directives = self.directives();
        EnvFilter::try_new(&directives)
            .map_err(|e| Error::Config(format!("log filter '{}' is invalid: {}", directives, e)))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread)
            .with_thread_names(self.show_thread)
            .with_writer(std::io::stdout);

        match self.format {
            LogFormat::Pretty => base.pretty().with_span_events(spans).boxed(),
            LogFormat::Compact => base.compact().with_span_events(spans).boxed(),
            LogFormat::Json => base
                .json()
                .flatten_event(true)
                .with_current_span(self.span_events)
                .with_span_list(false)
                .boxed(),
        }
    }
}

/// Install the global subscriber. Fails with
/// [`Error::LoggingInitialized`] if one is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter)
        .try_init()
        .map_err(|e| Error::LoggingInitialized(e.to_string()))
}

/// `[REDACTED]` when `field` names a credential; e-mail addresses keep only
/// their first character.
pub fn redact_if_sensitive(field: &str, value: &str) -> String {
    let field = field.to_ascii_lowercase();
    if SENSITIVE_MARKERS.iter().any(|marker| field.contains(marker)) {
        return REDACTED.to_string();
    }

    match value.split_once('@') {
        Some((local, domain)) if domain.contains('.') => {
            let initial: String = local.chars().take(1).collect();
            format!("{initial}***@{REDACTED}")
        }
        _ => value.to_string(),
    }
}

/// Last component of a remote path, e.g. `track.flac` for
/// `/Music/Albums/track.flac`.
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_every_field() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Trace)
            .with_filter("core_sync=trace")
            .with_span_events(false)
            .with_target(false)
            .with_thread(true);

        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.filter.as_deref(), Some("core_sync=trace"));
        assert!(!config.span_events);
        assert!(!config.show_target);
        assert!(config.show_thread);
    }

    #[test]
    fn test_default_directives() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .directives();

        assert!(directives.contains("core_sync=debug"));
        assert!(directives.contains("provider_yandex_disk=debug"));
        assert!(directives.contains("sqlx=warn"));
        assert!(LoggingConfig::default().env_filter().is_ok());
    }

    #[test]
    fn test_custom_filter_replaces_default() {
        let config = LoggingConfig::default().with_filter("provider_dropbox=trace");
        assert_eq!(config.directives(), "provider_dropbox=trace");

        let bad = LoggingConfig::default().with_filter("core_sync=loud");
        assert!(matches!(bad.env_filter(), Err(Error::Config(_))));
    }

    #[test]
    fn test_redaction() {
        assert_eq!(redact_if_sensitive("access_token", "sl.abc"), REDACTED);
        assert_eq!(redact_if_sensitive("Client_Secret", "s3cr3t"), REDACTED);
        assert_eq!(redact_if_sensitive("app_key", "k"), REDACTED);
        assert_eq!(
            redact_if_sensitive("account", "listener@example.com"),
            "l***@[REDACTED]"
        );
        assert_eq!(redact_if_sensitive("link_name", "My Dropbox"), "My Dropbox");
        assert_eq!(redact_if_sensitive("path", "disk:/a@b"), "disk:/a@b");
    }

    #[test]
    fn test_strip_path() {
        assert_eq!(strip_path("/Music/Albums/track.flac"), "track.flac");
        assert_eq!(strip_path("disk:/Music/song.mp3"), "song.mp3");
        assert_eq!(strip_path("C:\\Music\\song.mp3"), "song.mp3");
        assert_eq!(strip_path("song.mp3"), "song.mp3");
        assert_eq!(strip_path("/Music/"), "");
    }

    #[test]
    fn test_format_follows_build_profile() {
        let expected = if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        };
        assert_eq!(LogFormat::default(), expected);
    }
}
