use std::error::Error;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/** create a non blocking tracing file appender writing `<datadir>/<who>.log` */
pub fn setup_file_appender<P: AsRef<Path>>(datadir: P, who: &str) -> (NonBlocking, WorkerGuard) {
    let file_appender = rolling::never(datadir.as_ref(), format!("{}.log", who));

    tracing_appender::non_blocking(file_appender)
}

/** create a RUST_LOG env based log filter with the given default level */
pub fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy()
}

/// Parse a `--log-level` style value, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    level.parse().unwrap_or(Level::INFO)
}

/**
 * Initialize tracing-subscriber with env filter based on RUST_LOG env variable.
 * fmt layer is used to print logs to stdout.
 * fmt layer with custom writer is used to write logs to log file in datadir.
 * `log` records from dependencies are bridged through tracing-log.
*/
pub fn init_tracing_subscriber<P: AsRef<Path>>(
    datadir: P,
    who: &str,
    default_level: Level,
) -> Result<LogGuard, Box<dyn Error>> {
    let (file_writer, file_guard) = setup_file_appender(datadir, who);

    let format = fmt::format()
        .with_level(true)
        .with_ansi(true)
        .with_target(false)
        .with_source_location(true)
        .compact();

    let stdout_layer = fmt::layer().event_format(format.clone()).with_writer(std::io::stdout);
    let file_layer = fmt::layer().event_format(format).with_ansi(false).with_writer(file_writer);

    let subscriber = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(env_filter(default_level));

    match subscriber.try_init() {
        Ok(_) => Ok(LogGuard::new(file_guard)),
        Err(err) => Err(Box::new(err)),
    }
}

/// Keeps the non-blocking file writer alive, flushing on drop
pub struct LogGuard {
    _file_appender_guard: WorkerGuard,
}

impl LogGuard {
    pub fn new(file_appender_guard: WorkerGuard) -> Self {
        Self { _file_appender_guard: file_appender_guard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[test]
    fn parse_level_test() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[tokio::test]
    async fn test_setup_file_appender() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.log");

        let (file_writer, file_guard) = setup_file_appender(temp_dir.path(), "test");
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(file_writer))
            .with(env_filter(Level::INFO));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("stream s1 finished after 5 parts");
        });
        drop(file_guard);
        sleep(Duration::from_millis(100)).await;

        assert!(file_path.exists());
        let contents = std::fs::read_to_string(&file_path).expect("failed to read file");
        assert!(contents.contains("stream s1 finished after 5 parts"));
    }
}
