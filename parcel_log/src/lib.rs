use std::path::Path;

use anyhow::Result;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle for swapping the active log filter at runtime.
pub struct LogHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Replace the filter with `directives`, e.g. `debug` or `parcel_index=trace`.
    pub fn set_filter(&self, directives: &str) -> Result<()> {
        let filter = EnvFilter::try_new(directives)?;
        self.inner.reload(filter)?;
        Ok(())
    }
}

/// Build the filter from `RUST_LOG`, falling back to `level`.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Initialize logging with a runtime-reloadable filter.
/// `dir` – when set, JSON lines go to an hourly rolling `parcel.log` there;
/// otherwise human-readable output goes to stderr. `level` – initial level.
pub fn init(dir: Option<&Path>, level: Level) -> Result<LogHandle> {
    let (filter, handle) = reload::Layer::new(env_filter(level));

    let file_layer = dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::HOURLY, dir, "parcel.log");
        fmt::layer()
            .with_writer(appender)
            .json()
            .with_current_span(false)
            .with_span_list(false)
    });
    let stderr_layer = dir
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;
    Ok(LogHandle { inner: handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_applies_without_env() {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy("");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn invalid_directives_are_rejected() {
        assert!(EnvFilter::try_new("parcel_index=loud").is_err());
        assert!(EnvFilter::try_new("parcel_index=trace,info").is_ok());
    }
}
