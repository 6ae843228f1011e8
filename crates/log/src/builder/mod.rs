//! Logger builder implementation

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Handle to the logger's root span
///
/// The span carries the `service` field. Instrument the program's top-level
/// future with it (and spawned tasks with `in_current_span`) so events from
/// every worker thread carry the field.
#[derive(Debug)]
pub struct LoggerGuard {
    root_span: tracing::Span,
}

impl LoggerGuard {
    /// Root span; disabled when no service is configured.
    pub fn span(&self) -> &tracing::Span {
        &self.root_span
    }
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Build and install the global subscriber; events go to stderr
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {e}", self.config.level)))?;

        let display = &self.config.display;
        let fmt_layer = match self.config.format {
            Format::Pretty => fmt::layer()
                .pretty()
                .with_ansi(display.colors)
                .with_target(display.target)
                .with_file(display.source)
                .with_line_number(display.source)
                .with_writer(std::io::stderr)
                .boxed(),
            Format::Compact => fmt::layer()
                .compact()
                .with_ansi(display.colors)
                .with_target(display.target)
                .with_file(display.source)
                .with_line_number(display.source)
                .with_writer(std::io::stderr)
                .boxed(),
            Format::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(display.target)
                .with_file(display.source)
                .with_line_number(display.source)
                .with_writer(std::io::stderr)
                .boxed(),
        };

        Registry::default()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?;

        let root_span = self
            .config
            .service
            .as_deref()
            .map_or_else(tracing::Span::none, |service| tracing::info_span!("app", service));

        Ok(LoggerGuard { root_span })
    }
}
