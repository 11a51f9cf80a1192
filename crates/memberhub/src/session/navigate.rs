//! Top-level navigation requests.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

/// Performs a full top-level navigation.
pub trait Navigator: Send + Sync {
    /// Navigate to `path`.
    fn navigate(&self, path: &str);
}

/// Records every navigation; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct NavigationLog {
    visited: Arc<Mutex<Vec<String>>>,
}

impl NavigationLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path navigated to, oldest first.
    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent path, if any.
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, path: &str) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }
}

/// Emits navigations as log events, for hosts without a real location bar.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, path: &str) {
        info!(path, "navigating");
    }
}
