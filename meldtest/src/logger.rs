//! Minimal stderr logger for the host binary

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Writes every enabled record to stderr as `[LEVEL target] message`
pub struct StderrLogger {
    level: LevelFilter,
}

impl StderrLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Installs a logger for the rest of the process
    ///
    /// `verbose` raises the level from warnings to debug output.
    pub fn init(verbose: bool) -> Result<(), SetLoggerError> {
        let level = if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        };
        log::set_boxed_logger(Box::new(StderrLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    fn format(record: &Record) -> String {
        format!("[{:<5} {}] {}", record.level(), record.target(), record.args())
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", Self::format(record));
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_enabled_respects_level() {
        let logger = StderrLogger::new(LevelFilter::Warn);
        let warn = Metadata::builder().level(Level::Warn).build();
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }

    #[test]
    fn test_format() {
        let line = StderrLogger::format(
            &Record::builder()
                .level(Level::Info)
                .target("sim_kernel::meld")
                .args(format_args!("wrote {} bytes", 16))
                .build(),
        );
        assert_eq!(line, "[INFO  sim_kernel::meld] wrote 16 bytes");
    }
}
