use anyhow::{bail, Result};
use log::{LevelFilter, Metadata, Record};

struct OAuthModelLogger;

static LOGGER: OAuthModelLogger = OAuthModelLogger;

pub(crate) fn init(level: LevelFilter) -> Result<()> {
    match log::set_logger(&LOGGER) {
        Ok(_) => log::set_max_level(level),
        Err(_) => bail!("Logger initalization failed"),
    };

    Ok(())
}

fn format_record(record: &Record) -> String {
    format!(
        "{} - {} - {}:{}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.args()
    )
}

impl log::Log for OAuthModelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            // Results go to stdout, keep the logs out of their way
            eprintln!("{}", format_record(record));
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use serial_test::serial;

    #[test]
    fn record_format() {
        let line = format_record(
            &Record::builder()
                .args(format_args!("consumed authorization code"))
                .level(Level::Info)
                .file(Some("src/authorization/server.rs"))
                .line(Some(42))
                .build(),
        );

        let (timestamp, rest) = line.split_at(19);
        assert!(chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").is_ok());
        assert_eq!(rest, " - INFO - src/authorization/server.rs:42: consumed authorization code");
    }

    #[test]
    #[serial]
    fn level_is_configurable() {
        // Only the first init in the process installs the logger
        let _ = init(LevelFilter::Warn);
        log::set_max_level(LevelFilter::Warn);

        let logger = OAuthModelLogger;
        assert!(log::Log::enabled(&logger, &Metadata::builder().level(Level::Error).build()));
        assert!(log::Log::enabled(&logger, &Metadata::builder().level(Level::Warn).build()));
        assert!(!log::Log::enabled(&logger, &Metadata::builder().level(Level::Info).build()));

        log::set_max_level(LevelFilter::Debug);
        assert!(log::Log::enabled(&logger, &Metadata::builder().level(Level::Debug).build()));
        assert!(!log::Log::enabled(&logger, &Metadata::builder().level(Level::Trace).build()));
    }
}
