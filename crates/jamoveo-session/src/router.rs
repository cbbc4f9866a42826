//! Authorization and validation of leader actions.

use std::sync::Arc;
use std::time::Duration;

use jamoveo_catalog::SongCatalog;
use jamoveo_core::{ActionKind, ActionMessage, Identity, SessionError, SongId, SongRef};
use tracing::{debug, info, instrument, warn};

use crate::machine::{self, Event};
use crate::store::{Commit, SessionStore};

/// Default upper bound on a single catalog lookup.
///
/// The lookup runs on the service loop, so this also bounds how long
/// admissions and evictions wait behind a slow catalog.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Turns authorized actions into committed states.
pub struct ActionRouter {
    store: Arc<SessionStore>,
    catalog: Arc<dyn SongCatalog>,
    lookup_timeout: Duration,
}

impl ActionRouter {
    /// Router committing into `store` and resolving songs via `catalog`.
    pub fn new(store: Arc<SessionStore>, catalog: Arc<dyn SongCatalog>) -> Self {
        Self {
            store,
            catalog,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Override the catalog lookup bound.
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Apply `action` on behalf of `identity`.
    ///
    /// `Ok(None)` means the action was accepted but changed nothing.
    #[instrument(skip_all, fields(user = %identity.username, action = %action.kind()))]
    pub async fn handle(
        &self,
        identity: &Identity,
        action: ActionMessage,
    ) -> Result<Option<Commit>, SessionError> {
        if !identity.is_admin() {
            return Err(SessionError::Unauthorized {
                action: action.kind(),
            });
        }

        let event = match action {
            ActionMessage::StartRehearsal => Event::Start,
            ActionMessage::SongNotChosen => Event::Clear,
            ActionMessage::StopRehearsal => Event::Stop,
            ActionMessage::SongChosen { song_id } => {
                machine::precheck(&self.store.read(), ActionKind::SongChosen)?;
                Event::Choose(self.lookup(&song_id).await?)
            }
        };

        let commit = self.store.transition(|state| machine::apply(state, event))?;
        match &commit {
            Some(c) => info!(phase = %c.state.phase(), revision = c.revision, "state committed"),
            None => debug!("action accepted without change"),
        }
        Ok(commit)
    }

    /// Implicit stop after an admin connection went away.
    pub fn leader_departed(&self) -> Option<Commit> {
        match self
            .store
            .transition(|state| machine::apply(state, Event::LeaderLeft))
        {
            Ok(commit) => commit,
            Err(e) => {
                warn!(error = %e, "leader departure rejected by state machine");
                None
            }
        }
    }

    async fn lookup(&self, song_id: &SongId) -> Result<SongRef, SessionError> {
        let failed = |reason: String| SessionError::LookupFailed {
            song_id: song_id.clone(),
            reason,
        };
        match tokio::time::timeout(self.lookup_timeout, self.catalog.get(song_id)).await {
            Ok(Ok(Some(song))) => Ok(song),
            Ok(Ok(None)) => Err(failed("no such song".into())),
            Ok(Err(e)) => Err(failed(e.to_string())),
            Err(_) => Err(failed(format!(
                "lookup timed out after {}ms",
                self.lookup_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use jamoveo_catalog::{CatalogError, InMemoryCatalog};
    use jamoveo_core::{Phase, SessionState, SongSummary};
    use serde_json::Map;

    use super::*;

    fn song(id: &str) -> SongRef {
        SongRef::new(SongId::from_raw(id), format!("Song {id}"), "Artist", Map::new())
    }

    fn router() -> (ActionRouter, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::new());
        let catalog = Arc::new(InMemoryCatalog::with_songs([song("s1"), song("s2")]));
        (ActionRouter::new(Arc::clone(&store), catalog), store)
    }

    fn choose(id: &str) -> ActionMessage {
        ActionMessage::SongChosen {
            song_id: SongId::from_raw(id),
        }
    }

    #[tokio::test]
    async fn members_are_refused_before_anything_else() {
        let (router, store) = router();
        let member = Identity::member("m", "drums");
        let err = router.handle(&member, choose("missing")).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Unauthorized {
                action: ActionKind::SongChosen
            }
        );
        assert_eq!(store.revision(), 0);
    }

    #[tokio::test]
    async fn admin_drives_the_machine() {
        let (router, store) = router();
        let lead = Identity::admin("lead");

        let c = router.handle(&lead, ActionMessage::StartRehearsal).await.unwrap();
        assert_eq!(c.unwrap().revision, 1);
        let c = router.handle(&lead, choose("s1")).await.unwrap().unwrap();
        assert_eq!(c.state.current_song().unwrap().id.as_str(), "s1");
        assert!(router.handle(&lead, ActionMessage::StartRehearsal).await.unwrap().is_none());
        let _ = router.handle(&lead, ActionMessage::StopRehearsal).await.unwrap();
        assert_eq!(*store.read(), SessionState::Idle);
        assert_eq!(store.revision(), 3);
    }

    #[tokio::test]
    async fn song_chosen_while_idle_skips_lookup() {
        let (router, _) = router();
        let err = router
            .handle(&Identity::admin("lead"), choose("s1"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                action: ActionKind::SongChosen,
                phase: Phase::Idle
            }
        );
    }

    #[tokio::test]
    async fn unknown_song_is_lookup_failure() {
        let (router, store) = router();
        let lead = Identity::admin("lead");
        let _ = router.handle(&lead, ActionMessage::StartRehearsal).await.unwrap();
        let err = router.handle(&lead, choose("nope")).await.unwrap_err();
        assert_eq!(err.code(), "SONG_NOT_FOUND");
        assert_eq!(*store.read(), SessionState::Waiting);
    }

    struct FailingCatalog;

    #[async_trait::async_trait]
    impl SongCatalog for FailingCatalog {
        async fn search(&self, _query: &str) -> jamoveo_catalog::Result<Vec<SongSummary>> {
            Err(CatalogError::Database("offline".into()))
        }

        async fn get(&self, _id: &SongId) -> jamoveo_catalog::Result<Option<SongRef>> {
            Err(CatalogError::Database("offline".into()))
        }
    }

    #[tokio::test]
    async fn catalog_errors_become_lookup_failures() {
        let store = Arc::new(SessionStore::with_state(SessionState::Waiting));
        let router = ActionRouter::new(Arc::clone(&store), Arc::new(FailingCatalog));
        let err = router
            .handle(&Identity::admin("lead"), choose("s1"))
            .await
            .unwrap_err();
        match err {
            SessionError::LookupFailed { reason, .. } => assert!(reason.contains("offline")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*store.read(), SessionState::Waiting);
    }

    struct SlowCatalog;

    #[async_trait::async_trait]
    impl SongCatalog for SlowCatalog {
        async fn search(&self, _query: &str) -> jamoveo_catalog::Result<Vec<SongSummary>> {
            Ok(Vec::new())
        }

        async fn get(&self, _id: &SongId) -> jamoveo_catalog::Result<Option<SongRef>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out() {
        let store = Arc::new(SessionStore::with_state(SessionState::Waiting));
        let router = ActionRouter::new(Arc::clone(&store), Arc::new(SlowCatalog));
        let err = router
            .handle(&Identity::admin("lead"), choose("s1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SONG_NOT_FOUND");
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn leader_departure_resets_once() {
        let store = Arc::new(SessionStore::with_state(SessionState::Live(song("s1"))));
        let router = ActionRouter::new(
            Arc::clone(&store),
            Arc::new(InMemoryCatalog::new()),
        );
        assert!(router.leader_departed().is_some());
        assert!(router.leader_departed().is_none());
        assert_eq!(*store.read(), SessionState::Idle);
    }
}
