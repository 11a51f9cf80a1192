//! Holds the current menu forest for a menu type.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use super::{build_forest, FetchPolicy, ForestOptions, MenuNode, MenuSource};
use crate::error::{Error, Result};

/// A point-in-time copy of the builder's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MenuSnapshot {
    /// The most recently applied forest.
    pub forest: Vec<MenuNode>,
    /// The most recent fetch failure, cleared by the next success.
    pub error: Option<String>,
    /// Whether any fetch is still in flight.
    pub loading: bool,
}

#[derive(Debug, Default)]
struct MenuState {
    forest: Vec<MenuNode>,
    error: Option<String>,
    in_flight: usize,
    issued: u64,
    applied: u64,
    last_menu_type: Option<String>,
}

/// Counts one fetch as in flight until it completes or its future is dropped.
struct InFlight<'a> {
    state: &'a Mutex<MenuState>,
    armed: bool,
}

impl InFlight<'_> {
    /// Mark the fetch finished while the caller already holds the state lock.
    fn complete(mut self, state: &mut MenuState) {
        state.in_flight -= 1;
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.in_flight = state.in_flight.saturating_sub(1);
            debug!("menu fetch cancelled");
        }
    }
}

/// Fetches flat menu records and keeps the assembled forest.
///
/// Every successful fetch replaces the held forest wholesale and clears the
/// held error. A failed fetch keeps the previous forest and records the
/// failure message. Overlapping fetches are reconciled according to the
/// configured [`FetchPolicy`].
#[derive(Debug)]
pub struct MenuTreeBuilder<S> {
    source: S,
    options: ForestOptions,
    fetch_policy: FetchPolicy,
    state: Mutex<MenuState>,
}

impl<S: MenuSource> MenuTreeBuilder<S> {
    /// Create a builder with default options.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self::with_options(source, ForestOptions::default(), FetchPolicy::default())
    }

    /// Create a builder with explicit assembly options and fetch policy.
    #[must_use]
    pub fn with_options(source: S, options: ForestOptions, fetch_policy: FetchPolicy) -> Self {
        Self {
            source,
            options,
            fetch_policy,
            state: Mutex::new(MenuState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MenuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the records for `menu_type` and rebuild the forest.
    ///
    /// Dropping the returned future before it completes cancels the fetch;
    /// it then no longer counts towards [`is_loading`](Self::is_loading).
    ///
    /// Under [`FetchPolicy::LatestRequestWins`] a completion that is older than
    /// an already-applied fetch is discarded without touching the forest or
    /// the held error. It still returns the source's outcome, so `Ok(())`
    /// does not by itself mean the forest changed.
    ///
    /// # Errors
    ///
    /// Returns the source's error when the fetch fails. The same failure is
    /// also held and visible through [`MenuTreeBuilder::error`].
    pub async fn fetch(&self, menu_type: &str) -> Result<()> {
        let generation = {
            let mut state = self.state();
            state.in_flight += 1;
            state.issued += 1;
            state.last_menu_type = Some(menu_type.to_string());
            state.issued
        };
        let in_flight = InFlight {
            state: &self.state,
            armed: true,
        };
        debug!(menu_type, generation, source = self.source.name(), "fetching menu");

        let outcome = self
            .source
            .fetch_menu(menu_type)
            .await
            .map(|records| build_forest(records.unwrap_or_default(), &self.options));

        let mut state = self.state();
        in_flight.complete(&mut state);

        if self.fetch_policy == FetchPolicy::LatestRequestWins && generation < state.applied {
            debug!(
                menu_type,
                generation,
                applied = state.applied,
                "discarding superseded menu fetch"
            );
            return outcome.map(|_| ());
        }
        state.applied = state.applied.max(generation);

        match outcome {
            Ok(forest) => {
                debug!(menu_type, roots = forest.len(), "menu forest rebuilt");
                state.forest = forest;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                warn!(menu_type, error = %err, "menu fetch failed");
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Re-run the most recent fetch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoMenuRequested`] if nothing was fetched before, or
    /// the source's error when the fetch fails.
    pub async fn refetch(&self) -> Result<()> {
        let menu_type = self
            .state()
            .last_menu_type
            .clone()
            .ok_or(Error::NoMenuRequested)?;
        self.fetch(&menu_type).await
    }

    /// The currently held forest.
    #[must_use]
    pub fn forest(&self) -> Vec<MenuNode> {
        self.state().forest.clone()
    }

    /// The currently held error message, if the last applied fetch failed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// Whether a fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state().in_flight > 0
    }

    /// The menu type most recently requested.
    #[must_use]
    pub fn last_menu_type(&self) -> Option<String> {
        self.state().last_menu_type.clone()
    }

    /// Copy forest, error and loading flag in one consistent read.
    #[must_use]
    pub fn snapshot(&self) -> MenuSnapshot {
        let state = self.state();
        MenuSnapshot {
            forest: state.forest.clone(),
            error: state.error.clone(),
            loading: state.in_flight > 0,
        }
    }

    /// The fetch policy in effect.
    #[must_use]
    pub fn fetch_policy(&self) -> FetchPolicy {
        self.fetch_policy
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::menu::{MenuRecord, OrphanPolicy, StaticMenuSource};

    /// Fails while `failing` is set, otherwise serves a single "Home" record.
    #[derive(Debug, Default)]
    struct FlakySource {
        failing: AtomicBool,
    }

    #[async_trait]
    impl MenuSource for FlakySource {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn fetch_menu(&self, menu_type: &str) -> Result<Option<Vec<MenuRecord>>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::menu_source(menu_type, "upstream unavailable"));
            }
            Ok(Some(vec![MenuRecord::new(1, "Home")]))
        }
    }

    /// Answers each menu type only when its gate is opened.
    #[derive(Debug, Default)]
    struct GatedSource {
        gates: Mutex<HashMap<String, oneshot::Receiver<Vec<MenuRecord>>>>,
    }

    impl GatedSource {
        fn gate(&self, menu_type: &str) -> oneshot::Sender<Vec<MenuRecord>> {
            let (tx, rx) = oneshot::channel();
            self.gates
                .lock()
                .unwrap()
                .insert(menu_type.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl MenuSource for GatedSource {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn fetch_menu(&self, menu_type: &str) -> Result<Option<Vec<MenuRecord>>> {
            let rx = self.gates.lock().unwrap().remove(menu_type);
            match rx {
                Some(rx) => rx
                    .await
                    .map(Some)
                    .map_err(|_| Error::menu_source(menu_type, "gate dropped")),
                None => Ok(None),
            }
        }
    }

    async fn wait_until_loading<S: MenuSource>(builder: &MenuTreeBuilder<S>, expected: bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while builder.is_loading() != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("loading flag never settled");
    }

    #[tokio::test]
    async fn test_fetch_builds_forest() {
        let source = StaticMenuSource::new().with_menu(
            "main",
            vec![
                MenuRecord::new(2, "Venues").with_sort_order(1),
                MenuRecord::new(1, "Events").with_sort_order(0),
                MenuRecord::new(3, "Calendar").with_parent(1),
            ],
        );
        let builder = MenuTreeBuilder::new(source);

        builder.fetch("main").await.unwrap();

        let forest = builder.forest();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].name(), "Events");
        assert_eq!(forest[0].children[0].name(), "Calendar");
        assert!(builder.error().is_none());
        assert!(!builder.is_loading());
    }

    #[tokio::test]
    async fn test_fetch_empty_or_null_result() {
        let source = StaticMenuSource::new().with_menu("empty", Vec::new());
        let builder = MenuTreeBuilder::new(source);

        builder.fetch("empty").await.unwrap();
        assert!(builder.forest().is_empty());
        assert!(builder.error().is_none());

        builder.fetch("missing").await.unwrap();
        assert!(builder.forest().is_empty());
        assert!(builder.error().is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_forest() {
        let builder = MenuTreeBuilder::new(FlakySource::default());
        builder.fetch("main").await.unwrap();
        assert_eq!(builder.forest().len(), 1);

        builder.source.failing.store(true, Ordering::SeqCst);
        let err = builder.fetch("main").await.unwrap_err();
        assert!(err.is_menu_source());

        let snapshot = builder.snapshot();
        assert_eq!(snapshot.forest.len(), 1);
        assert!(snapshot
            .error
            .as_deref()
            .is_some_and(|e| e.contains("upstream unavailable")));
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_success_clears_error() {
        let builder = MenuTreeBuilder::new(FlakySource::default());
        builder.source.failing.store(true, Ordering::SeqCst);
        assert!(builder.fetch("main").await.is_err());
        assert!(builder.error().is_some());

        builder.source.failing.store(false, Ordering::SeqCst);
        builder.refetch().await.unwrap();
        assert!(builder.error().is_none());
        assert_eq!(builder.forest().len(), 1);
    }

    #[tokio::test]
    async fn test_refetch_without_request() {
        let builder = MenuTreeBuilder::new(StaticMenuSource::new());
        let err = builder.refetch().await.unwrap_err();
        assert!(matches!(err, Error::NoMenuRequested));
    }

    #[tokio::test]
    async fn test_refetch_uses_last_menu_type() {
        let source = StaticMenuSource::new()
            .with_menu("main", vec![MenuRecord::new(1, "Home")])
            .with_menu("footer", vec![MenuRecord::new(7, "Contact")]);
        let builder = MenuTreeBuilder::new(source);

        builder.fetch("main").await.unwrap();
        builder.fetch("footer").await.unwrap();
        builder.refetch().await.unwrap();

        assert_eq!(builder.last_menu_type().as_deref(), Some("footer"));
        assert_eq!(builder.forest()[0].id(), 7);
    }

    #[tokio::test]
    async fn test_orphan_policy_passed_through() {
        let source = StaticMenuSource::new().with_menu(
            "main",
            vec![MenuRecord::new(1, "Home"), MenuRecord::new(2, "Lost").with_parent(42)],
        );
        let options = ForestOptions {
            orphan_policy: OrphanPolicy::PromoteToRoot,
            ..ForestOptions::default()
        };
        let builder = MenuTreeBuilder::with_options(source, options, FetchPolicy::default());

        builder.fetch("main").await.unwrap();
        assert_eq!(builder.forest().len(), 2);
    }

    #[tokio::test]
    async fn test_last_write_wins_applies_late_completion() {
        let builder = Arc::new(MenuTreeBuilder::new(GatedSource::default()));
        let first_gate = builder.source.gate("first");
        let second_gate = builder.source.gate("second");

        let first = tokio::spawn({
            let builder = Arc::clone(&builder);
            async move { builder.fetch("first").await }
        });
        wait_until_loading(&builder, true).await;
        let second = tokio::spawn({
            let builder = Arc::clone(&builder);
            async move { builder.fetch("second").await }
        });

        second_gate.send(vec![MenuRecord::new(2, "Second")]).unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(builder.forest()[0].id(), 2);
        assert!(builder.is_loading());

        first_gate.send(vec![MenuRecord::new(1, "First")]).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(builder.forest()[0].id(), 1);
        wait_until_loading(&builder, false).await;
    }

    #[tokio::test]
    async fn test_cancelled_fetch_clears_loading() {
        let builder = MenuTreeBuilder::new(GatedSource::default());
        builder.fetch("main").await.unwrap();
        assert_eq!(builder.forest().len(), 0);

        // The gate is never opened, so the fetch can only end by cancellation.
        let _gate = builder.source.gate("main");
        let result = tokio::time::timeout(Duration::from_millis(20), builder.fetch("main")).await;
        assert!(result.is_err());

        assert!(!builder.is_loading());
        assert!(!builder.snapshot().loading);
        assert!(builder.error().is_none());
    }

    #[tokio::test]
    async fn test_aborted_fetch_task_clears_loading() {
        let builder = Arc::new(MenuTreeBuilder::new(GatedSource::default()));
        let _gate = builder.source.gate("main");

        let task = tokio::spawn({
            let builder = Arc::clone(&builder);
            async move { builder.fetch("main").await }
        });
        wait_until_loading(&builder, true).await;

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!builder.is_loading());
    }

    #[tokio::test]
    async fn test_latest_request_wins_discards_stale_completion() {
        let builder = Arc::new(MenuTreeBuilder::with_options(
            GatedSource::default(),
            ForestOptions::default(),
            FetchPolicy::LatestRequestWins,
        ));
        let first_gate = builder.source.gate("first");
        let second_gate = builder.source.gate("second");

        let first = tokio::spawn({
            let builder = Arc::clone(&builder);
            async move { builder.fetch("first").await }
        });
        wait_until_loading(&builder, true).await;
        let second = tokio::spawn({
            let builder = Arc::clone(&builder);
            async move { builder.fetch("second").await }
        });

        // Make sure the second fetch has been issued before it completes.
        tokio::time::timeout(Duration::from_secs(5), async {
            while builder.last_menu_type().as_deref() != Some("second") {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        second_gate.send(vec![MenuRecord::new(2, "Second")]).unwrap();
        second.await.unwrap().unwrap();
        first_gate.send(vec![MenuRecord::new(1, "First")]).unwrap();
        // A discarded completion still reports the source's success.
        assert!(first.await.unwrap().is_ok());

        assert_eq!(builder.forest()[0].id(), 2);
        assert!(builder.error().is_none());
        assert!(!builder.is_loading());
        assert_eq!(builder.fetch_policy(), FetchPolicy::LatestRequestWins);
    }
}
