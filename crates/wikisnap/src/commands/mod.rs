//! CLI command implementations

pub mod backup;
pub mod cleanse;
pub mod rotate;
pub mod rsync;
pub mod version;
