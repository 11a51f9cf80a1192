//! Local member sessions.
//!
//! The "current member" lives in a single persistent slot. Each execution
//! context keeps an in-memory copy through a [`LocalSessionStore`] and
//! refreshes it when a [`ChangeFeed`] reports that another context touched
//! the slot. Nothing here is a security boundary: the session is whatever the
//! slot says.

mod feed;
mod navigate;
mod slot;
mod store;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use feed::{ChangeEvent, ChangeFeed, ChangeStream, ContextId, InProcessFeed};
pub use navigate::{NavigationLog, Navigator, TracingNavigator};
pub use slot::{MemorySlotStore, SlotStore, SqliteSlotStore};
pub use store::LocalSessionStore;

/// Default slot key holding the serialized member session.
pub const SESSION_KEY: &str = "memberhub.session";

/// The member currently signed in on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSession {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
    /// Name shown in the interface.
    pub display_name: String,
    /// When the member joined, as an RFC 3339 timestamp.
    pub joined_at: String,
}

impl MemberSession {
    /// Start a session for a member joining now.
    ///
    /// The display name defaults to "first last" when not given.
    #[must_use]
    pub fn join(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        display_name: Option<String>,
    ) -> Self {
        let first_name = first_name.into();
        let last_name = last_name.into();
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{first_name} {last_name}").trim().to_string());
        Self {
            first_name,
            last_name,
            email: email.into(),
            display_name,
            joined_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
