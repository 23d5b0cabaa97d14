use clap::ValueEnum;
use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};

/// Overrides `--log-level` and `--diag` with a full filter, e.g. `crcline_frame=trace`.
pub const LOG_ENV: &str = "CRCLINE_LOG";

/// Target the link's tracing diagnostic sink emits on.
const DIAG_TARGET: &str = "crcline::diag";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Filter for the stderr subscriber.
///
/// A valid `override_spec` wins outright. Otherwise `level` applies everywhere
/// and `diag` lets protocol diagnostics through at debug level.
pub fn build_filter(level: LogLevel, diag: bool, override_spec: Option<&str>) -> EnvFilter {
    if let Some(spec) = override_spec {
        if let Ok(filter) = EnvFilter::try_new(spec) {
            return filter;
        }
    }

    let filter = EnvFilter::builder()
        .with_default_directive(level.as_filter().into())
        .parse_lossy("");

    if !diag {
        return filter;
    }
    match format!("{DIAG_TARGET}=debug").parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Install the stderr subscriber. Stdout stays reserved for received data.
pub fn init_logging(format: LogFormat, level: LogLevel, diag: bool) {
    let override_spec = std::env::var(LOG_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, diag, override_spec.as_deref()))
        .with_ansi(false)
        .with_target(diag);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_alone_sets_default_directive() {
        let filter = build_filter(LogLevel::Warn, false, None).to_string();
        assert!(filter.contains("warn"), "filter: {filter}");
        assert!(!filter.contains(DIAG_TARGET), "filter: {filter}");
    }

    #[test]
    fn diag_raises_diagnostic_target() {
        let filter = build_filter(LogLevel::Error, true, None).to_string();
        assert!(filter.contains("crcline::diag=debug"), "filter: {filter}");
        assert!(filter.contains("error"), "filter: {filter}");
    }

    #[test]
    fn env_override_replaces_flags() {
        let filter = build_filter(LogLevel::Info, true, Some("crcline_frame=trace")).to_string();
        assert!(filter.contains("crcline_frame=trace"), "filter: {filter}");
        assert!(!filter.contains(DIAG_TARGET), "filter: {filter}");
    }

    #[test]
    fn invalid_override_falls_back_to_flags() {
        let filter = build_filter(LogLevel::Info, false, Some("crcline=notalevel")).to_string();
        assert!(filter.contains("info"), "filter: {filter}");
    }
}
