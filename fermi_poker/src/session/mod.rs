//! Session coordination with an async actor per session.
//!
//! This module implements:
//! - SessionActor: owns one session, applies actions one at a time, persists
//!   every change with compare-and-swap and arms phase timers
//! - SessionManager: the action surface, spawning actors on demand
//! - A change feed of every stored write
//!
//! ## Architecture
//!
//! Each session runs in a separate Tokio task with an mpsc message inbox.
//! Callers await a oneshot reply. Phase timers are sleeping tasks that post
//! a `TimerFired` message back into the inbox; the phase epoch carried by the
//! timer lets the actor drop timers that outlived their phase.
//!
//! ## Example
//!
//! ```no_run
//! use fermi_poker::{
//!     game::SessionConfig,
//!     questions::BuiltinQuestions,
//!     session::{SessionManager, SessionTiming},
//!     store::MemorySessionStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fermi_poker::GameError> {
//!     let manager = SessionManager::new(
//!         Arc::new(MemorySessionStore::new()),
//!         Arc::new(BuiltinQuestions),
//!         SessionTiming::default(),
//!     );
//!
//!     let session = manager
//!         .create_session("Friday night", 1, "ada", SessionConfig::default())
//!         .await?;
//!     manager.join_session(session.id, 2, "grace").await?;
//!     manager.start_session(session.id, 1).await?;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod config;
pub mod manager;
pub mod messages;

pub use actor::{SessionActor, SessionHandle};
pub use config::SessionTiming;
pub use manager::SessionManager;
pub use messages::{ChangeEvent, ChangeKind, SessionMessage};
