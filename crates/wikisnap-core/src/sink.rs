//! Debug/log sinks.
//!
//! Backup components report progress through a [`LogSink`] and never care
//! which variant is behind it. [`ConsoleSink`] forwards to `tracing` (the
//! subscriber supplies the timestamp prefix); [`FileSink`] appends lines with
//! a timestamp suffix and writes an elapsed-time footer when closed.

use crate::error::Result;
use crate::stamp::{self, LOG_TIME_FORMAT};
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Capability shared by every debug/log destination.
pub trait LogSink: Send + Sync {
    /// Records an informational message.
    fn emit(&self, message: &str);

    /// Records an error message.
    fn emit_error(&self, message: &str);

    /// Whether messages are recorded at all. Callers check this before
    /// building expensive messages.
    fn is_enabled(&self) -> bool;

    /// Records the captured stdout of an external process.
    fn emit_output(&self, process: &str, output: &[u8]) {
        if !self.is_enabled() {
            return;
        }
        let text = String::from_utf8_lossy(output);
        for line in text.lines() {
            self.emit(&format!("{}: {}", process, line));
        }
    }
}

/// Ephemeral console sink backed by `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    enabled: bool,
}

impl ConsoleSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// A sink that drops everything.
    pub fn disabled() -> Self {
        Self::new(false)
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LogSink for ConsoleSink {
    fn emit(&self, message: &str) {
        if self.enabled {
            tracing::info!("{}", message);
        }
    }

    fn emit_error(&self, message: &str) {
        if self.enabled {
            tracing::error!("{}", message);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Persistent sink writing to a log file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    started: NaiveDateTime,
    handle: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    /// Creates (truncates) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            started: stamp::now(),
            handle: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) {
        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(writer) => {
                if let Err(e) = writeln!(writer, "{}", line) {
                    tracing::warn!("Failed to write log file {}: {}", self.path.display(), e);
                }
            }
            None => tracing::debug!("Log file {} is closed", self.path.display()),
        }
    }

    fn timestamp() -> String {
        stamp::now().format(LOG_TIME_FORMAT).to_string()
    }

    /// Writes the elapsed-time footer and closes the file. Further messages
    /// are dropped.
    pub fn close(&self) -> Result<()> {
        let elapsed = (stamp::now() - self.started).num_seconds().max(0);
        self.write_line(&format!(
            "Finishing ( {} ) elapsed time (min : sec) {} : {}-- {}",
            self.started.format(LOG_TIME_FORMAT),
            elapsed / 60,
            elapsed % 60,
            Self::timestamp()
        ));

        let mut guard = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut writer) = guard.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl LogSink for FileSink {
    fn emit(&self, message: &str) {
        self.write_line(&format!("{}-- {}", message, Self::timestamp()));
    }

    fn emit_error(&self, message: &str) {
        self.write_line(&format!("{} (stderr) -- {}", message, Self::timestamp()));
    }

    fn is_enabled(&self) -> bool {
        match self.handle.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    fn emit_output(&self, process: &str, output: &[u8]) {
        let text = String::from_utf8_lossy(output);
        let lines: Vec<&str> = text.lines().collect();
        self.write_line(&format!(
            "{} (stdout) -- {}\n{}",
            process,
            lines.len(),
            Self::timestamp()
        ));
        for line in lines {
            self.write_line(line);
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.handle.lock() {
            if let Some(mut writer) = guard.take() {
                let _ = writer.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_console_sink_enabled_flag() {
        assert!(ConsoleSink::default().is_enabled());
        assert!(!ConsoleSink::disabled().is_enabled());
    }

    #[test]
    fn test_file_sink_writes_suffixed_lines() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs/debug.log");

        let sink = FileSink::create(&path).unwrap();
        assert!(sink.is_enabled());
        sink.emit("Adding notes.wiki");
        sink.emit_error("Diff Error: broken.wiki");
        sink.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with("Adding notes.wiki-- "));
        assert!(lines[1].starts_with("Diff Error: broken.wiki (stderr) -- "));
        assert!(lines[2].starts_with("Finishing ("));
    }

    #[test]
    fn test_file_sink_drops_messages_after_close() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");

        let sink = FileSink::create(&path).unwrap();
        sink.close().unwrap();
        assert!(!sink.is_enabled());
        sink.emit("late message");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("late message"));
    }

    #[test]
    fn test_file_sink_records_process_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("debug.log");

        let sink = FileSink::create(&path).unwrap();
        sink.emit_output("rsync", b"sent 10 bytes\ntotal size is 42\n");
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("rsync (stdout) -- 2"));
        assert!(content.contains("total size is 42"));
    }

    #[test]
    fn test_sinks_are_interchangeable() {
        let temp = TempDir::new().unwrap();
        let sinks: Vec<Arc<dyn LogSink>> = vec![
            Arc::new(ConsoleSink::disabled()),
            Arc::new(FileSink::create(&temp.path().join("a.log")).unwrap()),
        ];
        let enabled: Vec<bool> = sinks.iter().map(|s| s.is_enabled()).collect();
        assert_eq!(enabled, vec![false, true]);
    }
}
