//! Pulls authoritative state and rebuilds the view from it.
//!
//! Every `reconcile` call takes a ticket from a monotonically increasing
//! sequence. A response is applied only if its ticket is newer than the last
//! one applied, so a slow response can never overwrite a fresher render.
//! Starting or ending a session raises the floor past every ticket already
//! handed out, which discards late responses for the previous game.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::api::{ApiError, GameApi};
use crate::config::RenderMode;
use crate::domain::Session;
use crate::protocol::PushMessage;
use crate::view::{derive_view, GameContainer, ViewState};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("fetching game {game_id} failed: {source}")]
    Fetch {
        game_id: String,
        #[source]
        source: ApiError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// The response was newest and has been applied to the container.
    Applied {
        seq: u64,
        resolved_player: Option<String>,
        /// Derived view; `None` in fragment mode.
        view: Option<ViewState>,
    },
    /// A newer response was already applied, or the session moved on.
    Discarded { seq: u64, applied: u64 },
}

#[derive(Debug, Default)]
struct Applied {
    game_id: Option<String>,
    /// Highest ticket applied, or the ticket count when the session began.
    floor: u64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct StateReconciler<A: GameApi, V: GameContainer> {
    api: A,
    container: Mutex<V>,
    mode: RenderMode,
    issued: AtomicU64,
    applied: Mutex<Applied>,
    last_view: Mutex<Option<ViewState>>,
}

impl<A: GameApi, V: GameContainer> StateReconciler<A, V> {
    pub fn new(api: A, container: V, mode: RenderMode) -> Self {
        Self {
            api,
            container: Mutex::new(container),
            mode,
            issued: AtomicU64::new(0),
            applied: Mutex::new(Applied::default()),
            last_view: Mutex::new(None),
        }
    }

    /// Whether a push message should trigger a reconciliation.
    pub fn classify(message: &PushMessage) -> bool {
        message.kind.is_state_affecting()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn last_view(&self) -> Option<ViewState> {
        lock(&self.last_view).clone()
    }

    pub fn with_container<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&lock(&self.container))
    }

    /// Start accepting responses for `game_id` only. Anything already in
    /// flight is discarded when it lands.
    pub fn begin_session(&self, game_id: &str) {
        let mut applied = lock(&self.applied);
        applied.game_id = Some(game_id.to_string());
        applied.floor = self.issued.load(Ordering::SeqCst);
        *lock(&self.last_view) = None;
    }

    pub fn end_session(&self) {
        let mut applied = lock(&self.applied);
        applied.game_id = None;
        applied.floor = self.issued.load(Ordering::SeqCst);
    }

    pub async fn reconcile(&self, session: &Session) -> Result<Reconciled, ReconcileError> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let game_id = session.game_id.as_str();
        debug!(game_id, seq, mode = ?self.mode, "reconciling");
        let fetch_failed = |source| ReconcileError::Fetch {
            game_id: game_id.to_string(),
            source,
        };

        match self.mode {
            RenderMode::Snapshot => {
                let snapshot = self
                    .api
                    .fetch_snapshot(game_id)
                    .await
                    .map_err(fetch_failed)?;
                Ok(self.apply(session, seq, |container| {
                    let local = session
                        .local_player_id
                        .clone()
                        .or_else(|| container.declared_player_id())
                        .or_else(|| snapshot.player_id.clone());
                    let view = derive_view(&snapshot, local.as_deref());
                    container.apply_view(&view);
                    container.rebind();
                    (local, Some(view))
                }))
            }
            RenderMode::Fragment => {
                let html = self
                    .api
                    .fetch_fragment(game_id)
                    .await
                    .map_err(fetch_failed)?;
                Ok(self.apply(session, seq, |container| {
                    container.replace_fragment(&html);
                    container.rebind();
                    let local = session
                        .local_player_id
                        .clone()
                        .or_else(|| container.declared_player_id());
                    (local, None)
                }))
            }
        }
    }

    fn apply(
        &self,
        session: &Session,
        seq: u64,
        render: impl FnOnce(&mut V) -> (Option<String>, Option<ViewState>),
    ) -> Reconciled {
        let mut applied = lock(&self.applied);
        let other_game = applied
            .game_id
            .as_deref()
            .is_some_and(|current| current != session.game_id);
        if other_game || seq <= applied.floor {
            debug!(seq, applied = applied.floor, "discarding superseded response");
            return Reconciled::Discarded {
                seq,
                applied: applied.floor,
            };
        }
        applied.floor = seq;

        let (resolved_player, view) = render(&mut lock(&self.container));
        *lock(&self.last_view) = view.clone();
        Reconciled::Applied {
            seq,
            resolved_player,
            view,
        }
    }
}
