//! Game-wide defaults and limits.

use std::time::Duration;

pub const DEFAULT_STARTING_CHIPS: i64 = 1000;
pub const MIN_STARTING_CHIPS: i64 = 100;
pub const MAX_STARTING_CHIPS: i64 = 100_000;

pub const DEFAULT_MIN_PLAYERS: usize = 2;
pub const DEFAULT_MAX_PLAYERS: usize = 6;

pub const DEFAULT_GUESS_SECONDS: u64 = 60;
pub const MIN_GUESS_SECONDS: u64 = 30;
pub const MAX_GUESS_SECONDS: u64 = 86_400;

pub const DEFAULT_NUM_QUESTIONS: usize = 5;

/// Correct meta-game predictions a bankrupt player needs to rejoin.
pub const DEFAULT_MIN_REJOIN_PREDICTIONS: u32 = 3;

/// Chips granted to a player rejoining after bankruptcy.
pub const DEFAULT_MIN_REJOIN_CHIPS: i64 = 50;

/// Time players get to read a hint before the next betting round opens.
pub const HINT_READ_DELAY: Duration = Duration::from_secs(5);

pub const INVITE_CODE_LEN: usize = 6;

/// Invite code alphabet. 0/O and 1/I are left out since they are easy to confuse.
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const MAX_USERNAME_LENGTH: usize = 32;
pub const MAX_SESSION_NAME_LENGTH: usize = 64;
