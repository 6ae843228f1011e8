//! Configuration presets for common scenarios

use super::{Config, DisplayConfig, Format};

impl Config {
    /// Create configuration from environment variables
    ///
    /// `CISTERN_LOG` (falling back to `RUST_LOG`) sets the filter and
    /// `CISTERN_LOG_FORMAT` the format. Unknown formats keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("CISTERN_LOG") {
            config.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }

        if let Ok(format) = std::env::var("CISTERN_LOG_FORMAT") {
            config.format = format.parse().unwrap_or_default();
        }

        config.display.parse_env();
        config
    }

    /// Development configuration (pretty, debug level)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                target: true,
                source: true,
            },
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                target: true,
                source: false,
            },
            ..Self::default()
        }
    }

    /// Test configuration (everything, no colors)
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: "trace".to_string(),
            format: Format::Compact,
            display: DisplayConfig {
                colors: false,
                target: false,
                source: false,
            },
            ..Self::default()
        }
    }

    /// Set the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Attach a service name to every event.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_is_json_without_colors() {
        let config = Config::production();
        assert_eq!(config.format, Format::Json);
        assert!(!config.display.colors);
    }

    #[test]
    fn builders_override_preset() {
        let config = Config::development()
            .with_level("cistern_pool=trace")
            .with_format(Format::Compact)
            .with_service("cistern");
        assert_eq!(config.level, "cistern_pool=trace");
        assert_eq!(config.format, Format::Compact);
        assert_eq!(config.service.as_deref(), Some("cistern"));
    }
}
