//! `memberhub` - navigation menus and local member sessions for community sites
//!
//! This library turns flat, parent-referencing menu records into ordered
//! navigation trees, and keeps a per-context "current member" in sync with a
//! shared persistent slot.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod menu;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use menu::{build_forest, MenuNode, MenuRecord, MenuSource, MenuTreeBuilder};
pub use session::{LocalSessionStore, MemberSession};
pub use storage::{Storage, StorageStats};
