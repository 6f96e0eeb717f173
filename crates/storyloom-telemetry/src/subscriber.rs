use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_output: false,
        }
    }
}

impl TelemetryConfig {
    pub fn new(level: impl Into<String>, json_output: bool) -> Self {
        Self {
            level: level.into(),
            json_output,
        }
    }

    /// `RUST_LOG` wins over the configured level
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Install the global subscriber; logs go to stderr so stdout stays clean
pub fn init_subscriber(config: &TelemetryConfig) {
    let filter = config.filter();

    if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
