// tracing-subscriber setup for the safras binary. Logs go to stderr so the
// rendered page or JSON can be piped from stdout.
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub level_filter: LevelFilter,
    // When set, RUST_LOG wins over `level_filter`.
    pub use_env_filter: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level_filter: LevelFilter::WARN,
            use_env_filter: true,
            with_target: false,
        }
    }
}

pub fn build_env_filter(config: &LogConfig) -> EnvFilter {
    let fallback = || EnvFilter::new(config.level_filter.to_string());
    if config.use_env_filter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback())
    } else {
        fallback()
    }
}

pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config))
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level_ignores_env() {
        let config = LogConfig {
            level_filter: LevelFilter::DEBUG,
            use_env_filter: false,
            ..LogConfig::default()
        };
        assert_eq!(build_env_filter(&config).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_quiet_turns_logging_off() {
        let config = LogConfig {
            level_filter: LevelFilter::OFF,
            use_env_filter: false,
            ..LogConfig::default()
        };
        assert_eq!(build_env_filter(&config).max_level_hint(), Some(LevelFilter::OFF));
    }
}
