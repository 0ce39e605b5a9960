use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

use auracity_common::prelude::*;

type FileLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Log files besides `root.log`, with the target prefix that feeds them.
const COMPONENTS: [(&str, &str); 5] = [
    ("discord", "auracity_bot::discord"),
    ("storage", "auracity_storage"),
    ("status", "auracity_bot::status"),
    ("queue", "auracity_bot::queue"),
    ("jobs", "auracity_bot::job"),
];

/// Keeps the background log writers alive. Dropping it flushes and stops file logging.
#[must_use]
pub struct LogGuards(#[allow(dead_code)] Vec<WorkerGuard>);

/// Install the global subscriber: console output, `root.log` and one file per component.
pub fn init(config: &LoggingConfig, dev_mode: bool) -> Result<LogGuards> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config, dev_mode)))
        .with_context(|| format!("Invalid log level {}", config.level))?;

    let mut guards = Vec::with_capacity(COMPONENTS.len() + 1);
    let mut layers: Vec<FileLayer> = Vec::with_capacity(COMPONENTS.len() + 1);

    let (root_writer, guard) = tracing_appender::non_blocking(rolling_file(config, "root")?);
    guards.push(guard);
    layers.push(fmt::layer().with_ansi(false).with_writer(root_writer).boxed());

    for (name, _) in COMPONENTS {
        let (writer, guard) = tracing_appender::non_blocking(rolling_file(config, name)?);
        guards.push(guard);

        layers.push(fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter_fn(move |meta| component_for(meta.target()) == Some(name)))
            .boxed());
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .with(fmt::layer())
        .try_init()
        .with_context(|| "Error installing the log subscriber")?;

    Ok(LogGuards(guards))
}

fn default_directive(config: &LoggingConfig, dev_mode: bool) -> &str {
    if dev_mode {
        "debug"
    } else {
        config.level.as_str()
    }
}

fn rolling_file(config: &LoggingConfig, name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name)
        .filename_suffix("log")
        .max_log_files(config.keep_backups.max(1))
        .build(&config.log_dir)
        .with_context(|| format!("Error opening log file {} in {}", name, config.log_dir.display()))
}

/// The component log a target belongs to, if any.
fn component_for(target: &str) -> Option<&'static str> {
    COMPONENTS.iter()
        .find(|(_, prefix)| target == *prefix || target.starts_with(&format!("{}::", prefix)))
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case("auracity_bot::discord::events", Some("discord"))]
    #[case("auracity_bot::discord", Some("discord"))]
    #[case("auracity_storage::db", Some("storage"))]
    #[case("auracity_bot::status", Some("status"))]
    #[case("auracity_bot::queue", Some("queue"))]
    #[case("auracity_bot::job", Some("jobs"))]
    #[case("auracity_bot::jobless", None)]
    #[case("auracity_bot", None)]
    #[case("serenity::gateway", None)]
    fn targets_map_to_components(#[case] target: &str, #[case] expected: Option<&str>) {
        assert_eq!(expected, component_for(target));
    }

    #[rstest]
    #[case(false, "warn")]
    #[case(true, "debug")]
    fn dev_mode_is_verbose(#[case] dev_mode: bool, #[case] expected: &str) {
        let config = LoggingConfig { level: "warn".into(), ..Default::default() };

        assert_eq!(expected, default_directive(&config, dev_mode));
    }

    #[test]
    fn rolling_files_land_in_the_log_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LoggingConfig { log_dir: dir.path().join("logs"), ..Default::default() };

        rolling_file(&config, "root").unwrap();

        assert!(dir.path().join("logs").is_dir());
    }
}
