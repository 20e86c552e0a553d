//! External collaborators
//!
//! This module launches the commands a timer runs after it finishes.

pub mod launcher;

// Re-export main types
pub use launcher::{
    check_catalog_paths, parse_catalog_entry, CommandCatalog, CommandLauncher, ProcessLauncher,
};
