//! Core library for wikisnap
//!
//! Configuration loading, error types, log sinks and the fixed-width date
//! stamps shared by the backup engine and the CLI.

pub mod config;
pub mod error;
pub mod sink;
pub mod stamp;
pub mod utils;

pub use config::{ArchiveFormat, BackupConfig, ConfigFile};
pub use error::{Error, Result};
pub use sink::{ConsoleSink, FileSink, LogSink};
