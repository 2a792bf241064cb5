//! End-to-end session flows through the session manager and actors, with the
//! Tokio clock paused so phase timers fire deterministically.

use fermi_poker::{
    game::{
        BetAction, GameError, PhaseKind, PlayerState, SessionConfig, SessionRecord, SessionStatus,
        state_machine::PhaseTimer,
    },
    questions::BuiltinQuestions,
    session::{ChangeKind, SessionActor, SessionManager, SessionMessage, SessionTiming},
    store::{MemorySessionStore, SessionStore},
};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

const GUESS_SECS: u64 = 5;

fn config(num_questions: usize) -> SessionConfig {
    SessionConfig {
        guess_seconds: GUESS_SECS,
        num_questions,
        meta_game_enabled: true,
        ..SessionConfig::default()
    }
}

fn manager_with_store() -> (SessionManager, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::new(
        store.clone(),
        Arc::new(BuiltinQuestions),
        SessionTiming::fast(),
    );
    (manager, store)
}

async fn seated_session(manager: &SessionManager, num_questions: usize) -> SessionRecord {
    let session = manager
        .create_session("Trivia night", 1, "ada", config(num_questions))
        .await
        .unwrap();
    manager.join_session(session.id, 2, "grace").await.unwrap();
    manager.join_session(session.id, 3, "alan").await.unwrap()
}

/// Call until the current betting round is over.
async fn call_out_round(manager: &SessionManager, id: i64) -> SessionRecord {
    let mut record = manager.get_session(id).await.unwrap();
    let round = record.phase_kind();
    while record.phase_kind() == round {
        let bettor = record.current_bettor().unwrap();
        record = manager.act(id, bettor, BetAction::Call).await.unwrap();
    }
    record
}

#[tokio::test(start_paused = true)]
async fn test_full_game_from_lobby_to_reset() {
    let (manager, _) = manager_with_store();
    let session = manager
        .create_session("Trivia night", 1, "ada", config(1))
        .await
        .unwrap();
    assert_eq!(session.invite_code.len(), 6);
    assert_eq!(session.questions.len(), 1);

    let code = session.invite_code.to_lowercase();
    manager.join_by_invite_code(&code, 2, "grace").await.unwrap();
    manager.join_session(session.id, 3, "alan").await.unwrap();
    let id = session.id;

    let started = manager.start_session(id, 1).await.unwrap();
    assert_eq!(started.phase_kind(), PhaseKind::Question);
    assert_eq!(started.status, SessionStatus::InProgress);

    let answer = started.current_question().unwrap().answer;
    manager.submit_guess(id, 1, answer * 0.5, answer * 2.0).await.unwrap();
    manager.submit_guess(id, 2, answer * 0.1, answer * 10.0).await.unwrap();
    manager.submit_prediction(id, 3, 1).await.unwrap();

    // Guess timer.
    sleep(Duration::from_secs(GUESS_SECS + 1)).await;
    let record = manager.get_session(id).await.unwrap();
    assert_eq!(record.phase_kind(), PhaseKind::BettingRound1);

    let opener = record.current_bettor().unwrap();
    manager.act(id, opener, BetAction::Raise(10)).await.unwrap();
    let record = call_out_round(&manager, id).await;
    assert_eq!(record.phase_kind(), PhaseKind::Hint1);
    assert_eq!(record.pot, 30);

    // Hint read delay.
    sleep(Duration::from_secs(2)).await;
    let record = call_out_round(&manager, id).await;
    assert_eq!(record.phase_kind(), PhaseKind::Hint2);

    sleep(Duration::from_secs(2)).await;
    let record = call_out_round(&manager, id).await;
    assert_eq!(record.phase_kind(), PhaseKind::Reveal);

    let result = record.last_question_result.clone().unwrap();
    assert_eq!(result.winner_id, Some(1));
    assert_eq!(result.payout, 30);
    assert_eq!(record.players[&1].chips, 1020);
    assert_eq!(record.players[&3].correct_predictions, 1);

    let over = manager.advance_question(id, 1).await.unwrap();
    assert_eq!(over.phase_kind(), PhaseKind::GameOver);
    assert_eq!(over.status, SessionStatus::Completed);

    let standings = manager.standings(id).await.unwrap();
    let order: Vec<i64> = standings.iter().map(|s| s.player_id).collect();
    assert_eq!(order, vec![1, 2, 3]);

    let again = manager.reset_session(id, 1).await.unwrap();
    assert_eq!(again.status, SessionStatus::Waiting);
    assert!(again.players.values().all(|p| p.chips == 1000));
    assert!(again.players.values().all(|p| p.state == PlayerState::Active));
}

#[tokio::test(start_paused = true)]
async fn test_start_rules() {
    let (manager, _) = manager_with_store();
    let session = manager
        .create_session("Solo", 1, "ada", config(2))
        .await
        .unwrap();

    let err = manager.start_session(session.id, 1).await.unwrap_err();
    assert!(matches!(err, GameError::NotEnoughPlayers { needed: 2, current: 1 }));

    manager.join_session(session.id, 2, "grace").await.unwrap();
    let err = manager.start_session(session.id, 2).await.unwrap_err();
    assert!(matches!(err, GameError::NotAuthorized(_)));

    manager.start_session(session.id, 1).await.unwrap();
    let err = manager.join_session(session.id, 9, "late").await.unwrap_err();
    assert!(matches!(err, GameError::SessionNotJoinable));
    assert!(manager.list_joinable().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_racing_bettors_are_serialized() {
    let (manager, _) = manager_with_store();
    let id = seated_session(&manager, 1).await.id;
    manager.start_session(id, 1).await.unwrap();
    sleep(Duration::from_secs(GUESS_SECS + 1)).await;

    let bettor = manager.get_session(id).await.unwrap().current_bettor().unwrap();
    let (first, second) = tokio::join!(
        manager.act(id, bettor, BetAction::Raise(50)),
        manager.act(id, bettor, BetAction::Raise(60)),
    );

    let (ok, err) = match (first, second) {
        (Ok(record), Err(e)) | (Err(e), Ok(record)) => (record, e),
        other => panic!("expected exactly one accepted action, got {other:?}"),
    };
    assert!(matches!(err, GameError::NotYourTurn));
    assert!(ok.pot == 50 || ok.pot == 60);
    assert_ne!(ok.current_bettor(), Some(bettor));
}

#[tokio::test(start_paused = true)]
async fn test_external_write_is_retried_against_fresh_state() {
    let (manager, store) = manager_with_store();
    let id = seated_session(&manager, 1).await.id;
    manager.start_session(id, 1).await.unwrap();

    // Another writer renames the session behind the actor's back.
    let mut external = store.get(id).await.unwrap();
    external.name = "Renamed".to_string();
    store.put(id, external).await.unwrap();

    let record = manager.submit_guess(id, 2, 1.0, 10.0).await.unwrap();
    assert_eq!(record.name, "Renamed");
    assert!(record.guesses.contains_key(&2));
    assert_eq!(store.get(id).await.unwrap(), record);
}

#[tokio::test(start_paused = true)]
async fn test_stale_timer_leaves_session_untouched() {
    let (manager, store) = manager_with_store();
    let id = seated_session(&manager, 1).await.id;
    let started = manager.start_session(id, 1).await.unwrap();
    manager.close_session(id).await.unwrap();

    // Re-home the started session in a fresh actor and fire a timer from an
    // earlier phase epoch at it.
    let restored = store.insert(started.clone()).await.unwrap();
    let (feed, _) = tokio::sync::broadcast::channel(16);
    let (actor, handle) =
        SessionActor::new(restored.clone(), store.clone(), SessionTiming::fast(), feed);
    tokio::spawn(actor.run());

    handle
        .send(SessionMessage::TimerFired(PhaseTimer {
            epoch: restored.phase_epoch - 1,
            phase: PhaseKind::Question,
            delay: Duration::ZERO,
        }))
        .await
        .unwrap();

    let record = handle
        .request(|response| SessionMessage::GetState { response })
        .await
        .unwrap();
    assert_eq!(record, restored);

    // The real guess timer, re-armed on actor start, still fires.
    sleep(Duration::from_secs(GUESS_SECS + 1)).await;
    let record = handle
        .request(|response| SessionMessage::GetState { response })
        .await
        .unwrap();
    assert_eq!(record.phase_kind(), PhaseKind::BettingRound1);
}

#[tokio::test(start_paused = true)]
async fn test_change_feed_and_lobby() {
    let (manager, _) = manager_with_store();
    let mut feed = manager.subscribe();

    let session = manager
        .create_session("Lobby", 1, "ada", config(1))
        .await
        .unwrap();
    let event = feed.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Inserted);
    assert_eq!(event.record.id, session.id);
    assert_eq!(manager.active_session_count().await, 1);

    manager.join_session(session.id, 2, "grace").await.unwrap();
    let event = feed.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Updated);
    assert!(event.record.players.contains_key(&2));

    // Joining twice changes nothing and publishes nothing.
    manager.join_session(session.id, 2, "grace").await.unwrap();
    manager.leave_session(session.id, 2).await.unwrap();
    let event = feed.recv().await.unwrap();
    assert!(!event.record.players.contains_key(&2));

    let joinable = manager.list_joinable().await.unwrap();
    assert_eq!(joinable.len(), 1);

    let err = manager
        .join_by_invite_code("ZZZZZZ", 3, "alan")
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidInput(_)));

    manager.close_session(session.id).await.unwrap();
    let event = feed.recv().await.unwrap();
    assert_eq!(event.kind, ChangeKind::Deleted);
    assert_eq!(manager.active_session_count().await, 0);
    assert!(matches!(
        manager.get_session(session.id).await,
        Err(GameError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_is_rejected() {
    let (manager, _) = manager_with_store();
    let bad = SessionConfig {
        max_players: 1,
        ..config(1)
    };
    let err = manager.create_session("Bad", 1, "ada", bad).await.unwrap_err();
    assert!(matches!(err, GameError::InvalidInput(_)));

    let err = manager
        .create_session("   ", 1, "ada", config(1))
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidInput(_)));
}
