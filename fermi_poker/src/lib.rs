//! # Fermi Poker
//!
//! A multiplayer estimation game played like poker. Each question asks for a
//! quantity nobody knows exactly ("how many piano tuners are in Chicago?").
//! Players submit a range, bet through three rounds separated by two hints,
//! and the narrowest range that contains the answer takes the pot.
//!
//! ## Architecture
//!
//! A session moves through a fixed phase graph per question:
//!
//! - **Question**: players submit ranges until the guess timer expires
//! - **Betting round 1..3**: fold, call or raise in turn
//! - **Hint 1..2**: a short read delay between betting rounds
//! - **Reveal**: the pot is paid out and predictions are scored
//! - **Game over**: after the last question
//!
//! The rules live in [`game`] as pure functions. [`session`] runs one actor
//! per session that applies them, persists each result through a
//! [`store::SessionStore`] and schedules phase timers.
//!
//! ## Core Modules
//!
//! - [`game`]: Data model, betting and outcome rules, phase engine
//! - [`session`]: Actors, the session manager and the change feed
//! - [`store`]: In-memory and PostgreSQL session storage
//! - [`questions`]: Question bank and invite codes
//! - [`db`]: PostgreSQL pool and schema

/// Core game logic, entities, and phase engine.
pub mod game;
pub use game::{
    BetAction, GameError, GameResult, PhaseKind, PlayerId, SessionConfig, SessionId,
    SessionRecord, constants,
};

/// Session actors and the action surface.
pub mod session;
pub use session::{ChangeEvent, ChangeKind, SessionManager, SessionTiming};

/// Session persistence.
pub mod store;

/// Question supply.
pub mod questions;

/// Database connection management.
pub mod db;
