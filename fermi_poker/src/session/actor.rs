//! Session actor implementation with async message handling.

use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::{
    config::SessionTiming,
    messages::{ChangeEvent, ChangeKind, SessionMessage},
};
use crate::{
    game::{
        entities::{SessionId, SessionRecord},
        errors::{GameError, GameResult},
        outcome,
        state_machine::{self, PhaseTimer, Transition},
    },
    store::{SessionStore, StoreError},
};

/// Session actor handle for sending messages
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    session_id: SessionId,
}

impl SessionHandle {
    /// Create a new session handle
    pub fn new(sender: mpsc::Sender<SessionMessage>, session_id: SessionId) -> Self {
        Self { sender, session_id }
    }

    /// Get session ID
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Whether the actor behind this handle has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the session
    pub async fn send(&self, message: SessionMessage) -> GameResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| GameError::SessionClosed)
    }

    /// Send a message built around a reply channel and wait for the reply
    pub async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<GameResult<T>>) -> SessionMessage,
    ) -> GameResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| GameError::SessionClosed)?
    }
}

/// Actor owning a single session.
///
/// Every mutation of the session goes through this actor's inbox, so actions
/// on one session are applied strictly one at a time.
pub struct SessionActor {
    /// Session ID
    id: SessionId,

    /// Last record written to (or read from) the store
    record: SessionRecord,

    /// Authoritative session storage
    store: Arc<dyn SessionStore>,

    /// Runtime settings
    timing: SessionTiming,

    /// Message inbox
    inbox: mpsc::Receiver<SessionMessage>,

    /// Handle timers use to reach the inbox without keeping the actor alive
    timer_sender: mpsc::WeakSender<SessionMessage>,

    /// Change feed shared with the manager
    feed: broadcast::Sender<ChangeEvent>,

    /// Randomness for first-bettor selection
    rng: StdRng,

    /// Is session closed
    is_closed: bool,
}

impl SessionActor {
    /// Create a new session actor for a stored record
    ///
    /// # Returns
    ///
    /// * `(SessionActor, SessionHandle)` - Actor and handle for sending messages
    pub fn new(
        record: SessionRecord,
        store: Arc<dyn SessionStore>,
        timing: SessionTiming,
        feed: broadcast::Sender<ChangeEvent>,
    ) -> (Self, SessionHandle) {
        let (sender, inbox) = mpsc::channel(timing.inbox_capacity);
        let id = record.id;

        let actor = Self {
            id,
            record,
            store,
            timing,
            inbox,
            timer_sender: sender.downgrade(),
            feed,
            rng: StdRng::from_rng(&mut rand::rng()),
            is_closed: false,
        };

        (actor, SessionHandle::new(sender, id))
    }

    /// Run the session actor event loop
    pub async fn run(mut self) {
        log::info!("Session {} '{}' starting", self.id, self.record.name);

        // Timers armed by a previous owner of this session did not survive.
        if let Some(timer) =
            state_machine::pending_timer(&self.record, Utc::now(), self.timing.hint_read_delay)
        {
            self.arm_timer(timer);
        }

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message).await;

            if self.is_closed {
                break;
            }
        }

        log::info!("Session {} '{}' stopped", self.id, self.record.name);
    }

    /// Handle a session message
    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Join {
                player_id,
                username,
                response,
            } => {
                let result = self
                    .commit(|record, _| {
                        state_machine::join(record, player_id, &username).map(Transition::from)
                    })
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::Leave {
                player_id,
                response,
            } => {
                let result = self
                    .commit(|record, _| {
                        state_machine::leave(record, player_id).map(Transition::from)
                    })
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::Start {
                player_id,
                response,
            } => {
                let result = self
                    .commit(|record, _| state_machine::start_session(record, player_id, Utc::now()))
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::SubmitGuess {
                player_id,
                lower_bound,
                upper_bound,
                response,
            } => {
                let result = self
                    .commit(|record, _| {
                        outcome::submit_guess(record, player_id, lower_bound, upper_bound)
                            .map(Transition::from)
                    })
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::SubmitPrediction {
                player_id,
                predicted_winner_id,
                response,
            } => {
                let result = self
                    .commit(|record, _| {
                        outcome::submit_prediction(record, player_id, predicted_winner_id)
                            .map(Transition::from)
                    })
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::Act {
                player_id,
                action,
                response,
            } => {
                let hint_delay = self.timing.hint_read_delay;
                let result = self
                    .commit(|record, _| state_machine::act(record, player_id, action, hint_delay))
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::AdvanceQuestion {
                player_id,
                response,
            } => {
                let result = self
                    .commit(|record, _| {
                        state_machine::advance_question(record, player_id, Utc::now())
                    })
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::Reset {
                player_id,
                questions,
                response,
            } => {
                let result = self
                    .commit(|record, _| {
                        state_machine::reset_session(record, player_id, questions.clone())
                            .map(Transition::from)
                    })
                    .await;
                let _ = response.send(result);
            }

            SessionMessage::GetState { response } => {
                let _ = response.send(Ok(self.record.clone()));
            }

            SessionMessage::TimerFired(timer) => {
                let result = self
                    .commit(|record, rng| state_machine::on_timer(record, timer, rng))
                    .await;

                match result {
                    Ok(record) => log::debug!(
                        "Session {}: {} timer moved session to {}",
                        self.id,
                        timer.phase,
                        record.phase_kind()
                    ),
                    Err(GameError::StaleTimer { epoch }) => log::warn!(
                        "Session {}: discarding stale {} timer (epoch {}, now {})",
                        self.id,
                        timer.phase,
                        epoch,
                        self.record.phase_epoch
                    ),
                    Err(e) => log::error!("Session {}: timer failed: {}", self.id, e),
                }
            }

            SessionMessage::Close { response } => {
                let result = match self.store.delete(self.id).await {
                    Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
                    Err(e) => Err(GameError::from(e)),
                };

                if result.is_ok() {
                    self.publish(ChangeKind::Deleted, self.record.clone());
                    self.is_closed = true;
                }
                let _ = response.send(result);
            }
        }
    }

    /// Compute a transition from the current record and write it with
    /// compare-and-swap.
    ///
    /// On a version conflict the record is reloaded and `apply` runs again
    /// against it, up to `max_write_attempts` times. Validation errors are
    /// returned before anything is written.
    async fn commit<F>(&mut self, mut apply: F) -> GameResult<SessionRecord>
    where
        F: FnMut(&SessionRecord, &mut StdRng) -> GameResult<Transition>,
    {
        for attempt in 1..=self.timing.max_write_attempts {
            let Transition { record, timer } = apply(&self.record, &mut self.rng)?;

            if record == self.record {
                return Ok(record);
            }

            match self
                .store
                .replace_if_version(self.id, self.record.version, record)
                .await
            {
                Ok(stored) => {
                    self.record = stored.clone();
                    if let Some(timer) = timer {
                        self.arm_timer(timer);
                    }
                    self.publish(ChangeKind::Updated, stored.clone());
                    return Ok(stored);
                }
                Err(StoreError::Conflict { expected, .. }) => {
                    log::warn!(
                        "Session {}: version {} is stale (attempt {}/{}), reloading",
                        self.id,
                        expected,
                        attempt,
                        self.timing.max_write_attempts
                    );
                    self.record = self.store.get(self.id).await?;
                }
                Err(e) => {
                    log::error!("Session {}: failed to write session: {}", self.id, e);
                    return Err(e.into());
                }
            }
        }

        Err(GameError::StoreConflict)
    }

    /// Deliver `timer` back to this actor after its delay.
    fn arm_timer(&self, timer: PhaseTimer) {
        let sender = self.timer_sender.clone();
        let id = self.id;
        log::debug!(
            "Session {}: arming {} timer for {:?} (epoch {})",
            id,
            timer.phase,
            timer.delay,
            timer.epoch
        );

        tokio::spawn(async move {
            tokio::time::sleep(timer.delay).await;
            if let Some(sender) = sender.upgrade()
                && sender.send(SessionMessage::TimerFired(timer)).await.is_err()
            {
                log::debug!("Session {}: actor gone before {} timer fired", id, timer.phase);
            }
        });
    }

    fn publish(&self, kind: ChangeKind, record: SessionRecord) {
        // No subscribers is fine.
        let _ = self.feed.send(ChangeEvent { kind, record });
    }
}
