//! `env_logger` setup for the `splat-render` binary and the integration tests.
//!
//! Library code only emits through the `log` macros and never installs a
//! logger itself.

use env_logger::WriteStyle;
use log::LevelFilter;
use std::sync::Once;

/// Directive used when neither the caller nor `RUST_LOG` names one.
const DEFAULT_DIRECTIVE: &str = "info";

/// How the process-wide logger is set up.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives such as `"debug"` or `"splat_raster=trace"`.
    /// When set, this wins over `RUST_LOG`.
    pub env_filter: Option<String>,
    pub write_style: WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }

    /// The directive string the logger is built from, given the value of
    /// `RUST_LOG` (if any). Blank strings count as unset.
    pub fn directives(&self, rust_log: Option<&str>) -> String {
        [self.env_filter.as_deref(), rust_log]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DIRECTIVE)
            .to_owned()
    }
}

static LOGGER: Once = Once::new();

/// Install `env_logger` for the process. Only the first call has an effect.
pub fn init_logging(config: LoggingConfig) {
    LOGGER.call_once(|| {
        let rust_log = std::env::var("RUST_LOG").ok();
        let directives = config.directives(rust_log.as_deref());

        let installed = env_logger::Builder::new()
            .filter_level(LevelFilter::Off)
            .parse_filters(&directives)
            .write_style(config.write_style)
            .try_init();

        // Test binaries can race another logger in; keep theirs.
        match installed {
            Ok(()) => log::debug!("logger installed with directives {directives:?}"),
            Err(_) => log::debug!("logger already installed, ignoring {directives:?}"),
        }
    });
}
