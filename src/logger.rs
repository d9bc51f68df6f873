//! `log` backend printing over the USB Serial JTAG console.
//!
//! Records are streamed to the console piece by piece, so a line of any
//! length (such as the hex dump of a full MIDI write) is printed whole.

use core::fmt::{self, Write};

use log::Record;

/// Write one log line for `record` to `out`, without the line ending.
pub fn write_record<W: Write>(out: &mut W, record: &Record) -> fmt::Result {
    write!(out, "[{:<5}] {}: {}", record.level(), record.target(), record.args())
}

#[cfg(feature = "embedded")]
pub use console::init;

#[cfg(feature = "embedded")]
mod console {
    use core::fmt;

    use log::{LevelFilter, Metadata, Record};

    use super::write_record;

    /// Forwards formatted text to the console as it is produced
    struct Console;

    impl fmt::Write for Console {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            esp_println::print!("{}", s);
            Ok(())
        }
    }

    struct ConsoleLogger;

    static LOGGER: ConsoleLogger = ConsoleLogger;

    /// Install the console logger.
    ///
    /// Must be called once during startup before anything logs. Later calls
    /// only change the level.
    pub fn init(level: LevelFilter) {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(level);
    }

    impl log::Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }

            let _ = write_record(&mut Console, record);
            esp_println::println!();
        }

        fn flush(&self) {}
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let mut line = std::string::String::new();
        write_record(
            &mut line,
            &Record::builder()
                .args(format_args!("ready"))
                .level(log::Level::Info)
                .target("blemidi")
                .build(),
        )
        .unwrap();

        assert_eq!(line, "[INFO ] blemidi: ready");
    }

    #[test]
    fn test_capture_keeps_long_lines() {
        capture::start();
        log::info!("{}", "x".repeat(1000));

        let lines = capture::lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(&"x".repeat(1000)));
    }
}
