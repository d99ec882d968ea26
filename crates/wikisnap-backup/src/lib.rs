//! Wikisnap Backup Engine
//!
//! Incremental, diff-based snapshots of a plain-text wiki tree.
//!
//! # Features
//!
//! - **Path enumeration**: recursive listing with prefix ignores and rule-based cleanse
//! - **Change detection**: per-file comparison through an external `diff -s`
//! - **Snapshot sync**: mirrors new files, stages diffs of changed ones, never deletes
//! - **Dated rotation**: fixed-width version names for periodically updated pages
//! - **Archiving**: tar.gz or zip of the staged tree, with SHA256 checksum
//! - **Manifest format**: JSON metadata written next to each archive
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use wikisnap_backup::{ArchiveBuilder, ArchiveConfig, SnapshotSync};
//! use wikisnap_core::ArchiveFormat;
//!
//! fn main() -> wikisnap_core::Result<()> {
//!     let report = SnapshotSync::default().sync(
//!         Path::new("/home/me/vimwiki"),
//!         Path::new("/backups/host"),
//!         Path::new("/tmp/wikisnap/20261017"),
//!     )?;
//!     println!("{} files staged", report.staged_count());
//!
//!     let config = ArchiveConfig::new("vimwiki_diff_backup", ArchiveFormat::Zip, "/tmp/wikisnap")?;
//!     let archive = ArchiveBuilder::new(config).build(Path::new("/tmp/wikisnap"), "20261017")?;
//!     println!("Archive created: {} bytes", archive.size_bytes);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod compression;
pub mod diff;
pub mod filters;
pub mod manifest;
pub mod progress;
pub mod report;
pub mod rotate;
pub mod sync;
pub mod walk;

// Re-export commonly used types
pub use archive::{archive_file_name, move_into, ArchiveBuilder, ArchiveConfig, BuiltArchive};
pub use compression::{calculate_checksum, DEFAULT_COMPRESSION_LEVEL};
pub use diff::{diff_artifact_name, ChangeDetector, ChangeOutcome};
pub use filters::{DeleteRules, ExtensionSet, IgnorePrefixes, DEFAULT_EXCLUDED_EXTENSIONS};
pub use manifest::{RunManifest, MANIFEST_SUFFIX, MANIFEST_VERSION};
pub use progress::BackupProgress;
pub use report::{ChangedFile, CleanseReport, FileFailure, SyncReport};
pub use rotate::{Rotation, VersionedNamer};
pub use sync::SnapshotSync;
pub use walk::{PathEnumerator, TraversalOptions};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
