//! The per-context member session cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{ChangeEvent, ChangeFeed, ChangeStream, ContextId, MemberSession, Navigator, SlotStore};
use crate::config::SessionConfig;
use crate::error::Result;

/// One context's view of the signed-in member.
///
/// The slot is the single source of truth. The in-memory value is either
/// absent or exactly the most recently parsed slot contents; it changes only
/// through [`load`](Self::load), [`save`](Self::save) and
/// [`sign_out`](Self::sign_out).
pub struct LocalSessionStore {
    context: ContextId,
    key: String,
    sign_out_path: String,
    slots: Arc<dyn SlotStore>,
    feed: Arc<dyn ChangeFeed>,
    navigator: Arc<dyn Navigator>,
    current: watch::Sender<Option<MemberSession>>,
    loading: AtomicBool,
}

impl std::fmt::Debug for LocalSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSessionStore")
            .field("context", &self.context)
            .field("key", &self.key)
            .field("channel", &self.feed.channel())
            .field("signed_in", &self.current.borrow().is_some())
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

impl LocalSessionStore {
    /// Create a store for a new context using the default session settings.
    ///
    /// Nothing is read until [`load`](Self::load) is called; until then the
    /// store reports itself as loading.
    #[must_use]
    pub fn new(
        slots: Arc<dyn SlotStore>,
        feed: Arc<dyn ChangeFeed>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::with_config(&SessionConfig::default(), slots, feed, navigator)
    }

    /// Create a store for a new context with explicit session settings.
    #[must_use]
    pub fn with_config(
        config: &SessionConfig,
        slots: Arc<dyn SlotStore>,
        feed: Arc<dyn ChangeFeed>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            context: ContextId::next(),
            key: config.key.clone(),
            sign_out_path: config.sign_out_path.clone(),
            slots,
            feed,
            navigator,
            current,
            loading: AtomicBool::new(true),
        }
    }

    /// This store's context id.
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// The slot key holding the session.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The in-memory session.
    #[must_use]
    pub fn current(&self) -> Option<MemberSession> {
        self.current.borrow().clone()
    }

    /// Whether a load has not yet resolved.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Observe changes to the in-memory session.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<MemberSession>> {
        self.current.subscribe()
    }

    /// Read the slot and replace the in-memory session with what it holds.
    ///
    /// An empty slot yields `None`. A slot that does not parse as a session
    /// also yields `None`, and is deleted. Backend read failures are logged
    /// and treated as an empty slot. Never fails.
    pub fn load(&self) -> Option<MemberSession> {
        self.loading.store(true, Ordering::SeqCst);

        let session = match self.slots.get(&self.key) {
            Ok(None) => None,
            Ok(Some(raw)) => match serde_json::from_str::<MemberSession>(&raw) {
                Ok(session) => Some(session),
                Err(err) => {
                    warn!(key = %self.key, error = %err, "discarding unreadable session");
                    self.purge_slot();
                    None
                }
            },
            Err(err) => {
                warn!(key = %self.key, error = %err, "session slot unreadable");
                None
            }
        };

        trace!(context = %self.context, signed_in = session.is_some(), "session loaded");
        self.current.send_replace(session.clone());
        self.loading.store(false, Ordering::SeqCst);
        session
    }

    /// Store `session` in the slot, adopt it in memory and notify other contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be serialized or the slot
    /// cannot be written; the in-memory session is left unchanged then.
    pub fn save(&self, session: &MemberSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        self.slots.set(&self.key, &raw)?;
        self.current.send_replace(Some(session.clone()));
        self.publish(Some(raw));
        debug!(context = %self.context, email = %session.email, "session saved");
        Ok(())
    }

    /// Forget the member: delete the slot, clear memory, notify other
    /// contexts and navigate to the sign-out path. Never fails.
    pub fn sign_out(&self) {
        self.purge_slot();
        self.current.send_replace(None);
        info!(context = %self.context, "signed out");
        self.navigator.navigate(&self.sign_out_path);
    }

    /// React to another context changing slot `key`.
    ///
    /// Only the session key matters; the slot is re-read rather than trusting
    /// `new_value`. Returns whether the session was reloaded.
    pub fn on_external_change(&self, key: &str, new_value: Option<&str>) -> bool {
        if key != self.key {
            trace!(context = %self.context, key, "ignoring change to unrelated slot");
            return false;
        }
        debug!(
            context = %self.context,
            deleted = new_value.is_none(),
            "session slot changed elsewhere, reloading"
        );
        self.load();
        true
    }

    /// Subscribe to the change feed as this context.
    #[must_use]
    pub fn subscribe(&self) -> ChangeStream {
        self.feed.subscribe(self.context)
    }

    /// Apply every event already waiting on `stream`. Returns how many
    /// triggered a reload.
    pub fn sync_pending(&self, stream: &mut ChangeStream) -> usize {
        let mut reloads = 0;
        while let Some(event) = stream.try_recv() {
            if self.on_external_change(&event.key, event.new_value.as_deref()) {
                reloads += 1;
            }
        }
        reloads
    }

    /// Apply change events in a background task.
    ///
    /// The subscription is made before this returns, so no later event is
    /// missed. The task ends when the feed closes or the store is dropped,
    /// even if no event arrives after the drop; abort the handle to stop it
    /// sooner.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let mut stream = self.subscribe();
        // Only used to learn that the store, which owns the sender, is gone.
        let mut store_alive = self.current.subscribe();
        let store: Weak<Self> = Arc::downgrade(self);
        let context = self.context;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = stream.recv() => {
                        let Some(event) = event else {
                            break;
                        };
                        let Some(store) = store.upgrade() else {
                            break;
                        };
                        store.on_external_change(&event.key, event.new_value.as_deref());
                    }
                    changed = store_alive.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(%context, "session listener stopped");
        })
    }

    fn purge_slot(&self) {
        if let Err(err) = self.slots.remove(&self.key) {
            warn!(key = %self.key, error = %err, "failed to delete session slot");
        }
        self.publish(None);
    }

    fn publish(&self, new_value: Option<String>) {
        self.feed.publish(ChangeEvent {
            origin: self.context,
            key: self.key.clone(),
            new_value,
        });
    }
}
