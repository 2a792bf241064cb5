//! Session manager: the action surface over every session.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, broadcast};

use super::{
    actor::{SessionActor, SessionHandle},
    config::SessionTiming,
    messages::{ChangeEvent, ChangeKind, SessionMessage},
};
use crate::{
    game::{
        betting::BetAction,
        config::SessionConfig,
        entities::{PlayerId, SessionId, SessionRecord},
        errors::{GameError, GameResult},
        outcome::{self, Standing},
    },
    questions::{self, QuestionSource},
    store::{SessionStore, StoreError},
};

/// Invite code collisions tolerated before giving up on session creation
const MAX_INVITE_CODE_ATTEMPTS: usize = 5;

/// Session manager spawning one actor per live session.
///
/// Actors are started lazily: the first action on a stored session that has
/// no running actor loads the record and spawns one.
pub struct SessionManager {
    /// Authoritative session storage
    store: Arc<dyn SessionStore>,

    /// Question bank for new and restarted games
    questions: Arc<dyn QuestionSource>,

    /// Runtime settings handed to every actor
    timing: SessionTiming,

    /// Running actors
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,

    /// Change feed
    feed: broadcast::Sender<ChangeEvent>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        store: Arc<dyn SessionStore>,
        questions: Arc<dyn QuestionSource>,
        timing: SessionTiming,
    ) -> Self {
        let (feed, _) = broadcast::channel(timing.feed_capacity);
        Self {
            store,
            questions,
            timing,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            feed,
        }
    }

    /// Subscribe to every stored change of every session
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Number of sessions with a running actor
    pub async fn active_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn spawn_actor(&self, record: SessionRecord) -> SessionHandle {
        let (actor, handle) = SessionActor::new(
            record,
            Arc::clone(&self.store),
            self.timing.clone(),
            self.feed.clone(),
        );
        tokio::spawn(actor.run());
        handle
    }

    /// Handle of the actor owning `id`, spawning one from the store if needed
    async fn handle(&self, id: SessionId) -> GameResult<SessionHandle> {
        if let Some(handle) = self.sessions.read().await.get(&id)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }

        let record = self.store.get(id).await?;

        let mut sessions = self.sessions.write().await;
        // Another caller may have spawned it while we were loading.
        if let Some(handle) = sessions.get(&id)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }

        let handle = self.spawn_actor(record);
        sessions.insert(id, handle.clone());
        log::info!("Spawned actor for stored session {}", id);
        Ok(handle)
    }

    /// Create a session with the creator seated
    pub async fn create_session(
        &self,
        name: &str,
        creator_id: PlayerId,
        creator_name: &str,
        config: SessionConfig,
    ) -> GameResult<SessionRecord> {
        if name.trim().is_empty() {
            return Err(GameError::InvalidInput(
                "Session name is required".to_string(),
            ));
        }
        if creator_name.trim().is_empty() {
            return Err(GameError::InvalidInput("Username is required".to_string()));
        }
        config.validate_with_min_guess(self.timing.min_guess_seconds)?;

        let question_set =
            questions::draw_questions(self.questions.as_ref(), config.num_questions).await;

        let mut last_err = None;
        for _ in 0..MAX_INVITE_CODE_ATTEMPTS {
            let code = questions::generate_invite_code(&mut rand::rng());
            let record = SessionRecord::new(
                name,
                code,
                creator_id,
                creator_name,
                config.clone(),
                question_set.clone(),
            );

            match self.store.insert(record).await {
                Ok(stored) => {
                    log::info!(
                        "Created session {} '{}' ({})",
                        stored.id,
                        stored.name,
                        stored.invite_code
                    );
                    let _ = self.feed.send(ChangeEvent {
                        kind: ChangeKind::Inserted,
                        record: stored.clone(),
                    });
                    let handle = self.spawn_actor(stored.clone());
                    self.sessions.write().await.insert(stored.id, handle);
                    return Ok(stored);
                }
                Err(StoreError::DuplicateInviteCode(code)) => {
                    log::debug!("Invite code {} taken, drawing another", code);
                    last_err = Some(StoreError::DuplicateInviteCode(code));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .map(GameError::from)
            .unwrap_or(GameError::StoreConflict))
    }

    /// Join a session by id
    pub async fn join_session(
        &self,
        id: SessionId,
        player_id: PlayerId,
        username: &str,
    ) -> GameResult<SessionRecord> {
        let username = username.to_string();
        self.handle(id)
            .await?
            .request(|response| SessionMessage::Join {
                player_id,
                username,
                response,
            })
            .await
    }

    /// Join a session by its invite code (case-insensitive)
    pub async fn join_by_invite_code(
        &self,
        code: &str,
        player_id: PlayerId,
        username: &str,
    ) -> GameResult<SessionRecord> {
        let code = questions::normalize_invite_code(code).ok_or_else(|| {
            GameError::InvalidInput("Invite code must be 6 characters".to_string())
        })?;

        let record = self
            .store
            .find_by_invite_code(&code)
            .await?
            .ok_or_else(|| GameError::InvalidInput(format!("No session with invite code {code}")))?;

        self.join_session(record.id, player_id, username).await
    }

    /// Leave a session that has not started
    pub async fn leave_session(
        &self,
        id: SessionId,
        player_id: PlayerId,
    ) -> GameResult<SessionRecord> {
        self.handle(id)
            .await?
            .request(|response| SessionMessage::Leave {
                player_id,
                response,
            })
            .await
    }

    /// Creator starts the game
    pub async fn start_session(
        &self,
        id: SessionId,
        player_id: PlayerId,
    ) -> GameResult<SessionRecord> {
        self.handle(id)
            .await?
            .request(|response| SessionMessage::Start {
                player_id,
                response,
            })
            .await
    }

    /// Submit a range estimate for the current question
    pub async fn submit_guess(
        &self,
        id: SessionId,
        player_id: PlayerId,
        lower_bound: f64,
        upper_bound: f64,
    ) -> GameResult<SessionRecord> {
        self.handle(id)
            .await?
            .request(|response| SessionMessage::SubmitGuess {
                player_id,
                lower_bound,
                upper_bound,
                response,
            })
            .await
    }

    /// Predict the current question's winner
    pub async fn submit_prediction(
        &self,
        id: SessionId,
        player_id: PlayerId,
        predicted_winner_id: PlayerId,
    ) -> GameResult<SessionRecord> {
        self.handle(id)
            .await?
            .request(|response| SessionMessage::SubmitPrediction {
                player_id,
                predicted_winner_id,
                response,
            })
            .await
    }

    /// Fold, call or raise as the current bettor
    pub async fn act(
        &self,
        id: SessionId,
        player_id: PlayerId,
        action: BetAction,
    ) -> GameResult<SessionRecord> {
        self.handle(id)
            .await?
            .request(|response| SessionMessage::Act {
                player_id,
                action,
                response,
            })
            .await
    }

    /// Creator moves on from the reveal
    pub async fn advance_question(
        &self,
        id: SessionId,
        player_id: PlayerId,
    ) -> GameResult<SessionRecord> {
        self.handle(id)
            .await?
            .request(|response| SessionMessage::AdvanceQuestion {
                player_id,
                response,
            })
            .await
    }

    /// Creator starts a new game with a fresh question set
    pub async fn reset_session(
        &self,
        id: SessionId,
        player_id: PlayerId,
    ) -> GameResult<SessionRecord> {
        let handle = self.handle(id).await?;
        let current = handle
            .request(|response| SessionMessage::GetState { response })
            .await?;
        let questions =
            questions::draw_questions(self.questions.as_ref(), current.config.num_questions).await;

        handle
            .request(|response| SessionMessage::Reset {
                player_id,
                questions,
                response,
            })
            .await
    }

    /// Current state of a session
    pub async fn get_session(&self, id: SessionId) -> GameResult<SessionRecord> {
        self.handle(id)
            .await?
            .request(|response| SessionMessage::GetState { response })
            .await
    }

    /// Leaderboard of a session
    pub async fn standings(&self, id: SessionId) -> GameResult<Vec<Standing>> {
        let record = self.get_session(id).await?;
        Ok(outcome::standings(&record))
    }

    /// Sessions still waiting for players
    pub async fn list_joinable(&self) -> GameResult<Vec<SessionRecord>> {
        Ok(self.store.list_joinable().await?)
    }

    /// Delete a session and stop its actor
    pub async fn close_session(&self, id: SessionId) -> GameResult<()> {
        let handle = self.handle(id).await?;
        handle
            .request(|response| SessionMessage::Close { response })
            .await?;

        self.sessions.write().await.remove(&id);
        log::info!("Closed session {}", id);
        Ok(())
    }
}
