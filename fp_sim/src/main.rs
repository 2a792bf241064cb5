//! Bot-driven Fermi poker simulator.
//!
//! Creates one session, seats a table of bots and plays it to game over,
//! reacting to the session manager's change feed the way a client would.

mod bot;
mod config;
mod logging;

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{Error, bail};
use ctrlc::set_handler;
use fermi_poker::{
    BetAction, PhaseKind, PlayerId, SessionConfig, SessionId, SessionManager, SessionRecord,
    SessionTiming,
    db::Database,
    game::Standing,
    questions::{BuiltinQuestions, PgQuestionSource, QuestionSource},
    session::ChangeKind,
    store::{MemorySessionStore, PgSessionStore, SessionStore},
};
use log::{info, warn};
use pico_args::Arguments;
use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::broadcast::error::RecvError;

use bot::{Bot, BotDecisionMaker};
use config::{SimConfig, SimOverrides};

const HELP: &str = "\
Play a Fermi poker session with bots

USAGE:
  fp_sim [OPTIONS]

OPTIONS:
  --players     N          Bots at the table           [default: env SIM_PLAYERS or 4]
  --questions   N          Questions in the game       [default: env SIM_QUESTIONS or 3]
  --guess-secs  N          Guessing phase length       [default: env SIM_GUESS_SECS or 2]

FLAGS:
  --meta-game              Bots predict each question's winner
  --pg                     Store sessions in PostgreSQL (needs DATABASE_URL)
  -h, --help               Print help information

ENVIRONMENT:
  SIM_STARTING_CHIPS       Starting stack per bot
  DATABASE_URL             PostgreSQL connection string
  RUST_LOG                 Log filter (e.g. info,fermi_poker=debug)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = SimOverrides {
        players: pargs.opt_value_from_str("--players")?,
        questions: pargs.opt_value_from_str("--questions")?,
        guess_secs: pargs.opt_value_from_str("--guess-secs")?,
        meta_game: pargs.contains("--meta-game"),
        use_postgres: pargs.contains("--pg"),
    };
    let config = SimConfig::from_env(overrides)?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();

    let db = match &config.database {
        Some(db_config) => {
            let db = Database::new(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            db.migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to apply schema: {}", e))?;
            db.health_check().await?;
            info!("Database connected successfully");
            Some(db)
        }
        None => None,
    };

    let (store, questions): (Arc<dyn SessionStore>, Arc<dyn QuestionSource>) = match &db {
        Some(db) => {
            let bank = PgQuestionSource::new(db.pool().clone());
            bank.seed_builtin().await?;
            (Arc::new(PgSessionStore::new(db.pool().clone())), Arc::new(bank))
        }
        None => (Arc::new(MemorySessionStore::new()), Arc::new(BuiltinQuestions)),
    };

    let manager = SessionManager::new(store, questions, SessionTiming::fast());
    let standings = play(&manager, &config).await?;

    println!("\nFinal standings");
    for s in standings {
        println!(
            "  {:>2}. {:<10} {:>6} chips  ({})",
            s.rank, s.username, s.chips, s.state
        );
    }

    if let Some(db) = db {
        db.close().await;
    }
    Ok(())
}

/// Drives one session from lobby to game over.
struct Simulation<'a> {
    manager: &'a SessionManager,
    session_id: SessionId,
    creator_id: PlayerId,
    bots: BTreeMap<PlayerId, Bot>,
    maker: BotDecisionMaker,
    rng: StdRng,
    /// Question index the bots already guessed on
    guessed: Option<usize>,
}

impl Simulation<'_> {
    async fn submit_estimates(&mut self, record: &SessionRecord) {
        if self.guessed == Some(record.current_question_index) {
            return;
        }
        self.guessed = Some(record.current_question_index);

        let Some(question) = record.current_question() else {
            return;
        };
        info!("Question {}: {}", record.current_question_index + 1, question.text);

        for bot in self.bots.values() {
            let (lower, upper) = bot.guess(question.answer, &mut self.rng);
            if let Err(e) = self
                .manager
                .submit_guess(self.session_id, bot.id, lower, upper)
                .await
            {
                warn!("{} could not guess: {}", bot.name, e);
                continue;
            }
            info!("{} guesses {:.1} to {:.1}", bot.name, lower, upper);

            if record.config.meta_game_enabled
                && let Some(target) = bot.predict(record, &mut self.rng)
                && let Err(e) = self
                    .manager
                    .submit_prediction(self.session_id, bot.id, target)
                    .await
            {
                warn!("{} could not predict: {}", bot.name, e);
            }
        }
    }

    async fn take_turn(&mut self, record: &SessionRecord) {
        let Some(bettor) = record.current_bettor() else {
            return;
        };
        let Some(bot) = self.bots.get(&bettor) else {
            return;
        };

        let action = self.maker.decide(bot, record, &mut self.rng);
        info!("{} ({}): {}", bot.name, record.phase_kind(), action);
        let mut result = self.manager.act(self.session_id, bettor, action).await;
        if let Err(e) = &result
            && e.is_retryable()
        {
            warn!("{} hit a write conflict, retrying {}", bot.name, action);
            result = self.manager.act(self.session_id, bettor, action).await;
        }

        if let Err(e) = result {
            warn!("{} could not {}: {}; folding", bot.name, action, e);
            if let Err(e) = self
                .manager
                .act(self.session_id, bettor, BetAction::Fold)
                .await
            {
                warn!("{} could not fold: {}", bot.name, e);
            }
        }
    }

    async fn advance(&self, record: &SessionRecord) -> Result<(), Error> {
        if let Some(result) = &record.last_question_result {
            match result.winner_id.and_then(|id| record.player(id)) {
                Some(winner) => info!(
                    "Answer was {}; {} wins {} chips",
                    result.correct_answer, winner.username, result.payout
                ),
                None => info!("Answer was {}; nobody wins", result.correct_answer),
            }
        }
        self.manager
            .advance_question(self.session_id, self.creator_id)
            .await?;
        Ok(())
    }
}

async fn play(manager: &SessionManager, config: &SimConfig) -> Result<Vec<Standing>, Error> {
    let mut rng = StdRng::from_rng(&mut rand::rng());
    let bots: BTreeMap<PlayerId, Bot> = (1..=config.players as PlayerId)
        .map(|id| (id, Bot::new(id, &mut rng)))
        .collect();
    let creator_id = 1;
    let creator_name = bots
        .get(&creator_id)
        .map_or_else(|| format!("bot{creator_id}"), |b| b.name.clone());

    let session_config = SessionConfig {
        starting_chips: config.starting_chips,
        max_players: config.players,
        guess_seconds: config.guess_secs,
        num_questions: config.questions,
        meta_game_enabled: config.meta_game,
        ..SessionConfig::default()
    };

    let mut feed = manager.subscribe();
    let session = manager
        .create_session("Simulation", creator_id, &creator_name, session_config)
        .await?;
    info!("Session {} created, invite code {}", session.id, session.invite_code);

    for bot in bots.values().filter(|b| b.id != creator_id) {
        manager
            .join_by_invite_code(&session.invite_code, bot.id, &bot.name)
            .await?;
    }
    manager.start_session(session.id, creator_id).await?;

    let mut sim = Simulation {
        manager,
        session_id: session.id,
        creator_id,
        bots,
        maker: BotDecisionMaker::default(),
        rng,
        guessed: None,
    };
    let mut last_version = 0;

    loop {
        let record = match feed.recv().await {
            Ok(event) if event.record.id != session.id => continue,
            Ok(event) if event.kind == ChangeKind::Deleted => bail!("Session was closed"),
            Ok(event) => event.record,
            Err(RecvError::Lagged(skipped)) => {
                warn!("Change feed lagged by {} events; reloading", skipped);
                manager.get_session(session.id).await?
            }
            Err(RecvError::Closed) => bail!("Change feed closed"),
        };

        if record.version <= last_version {
            continue;
        }
        last_version = record.version;

        match record.phase_kind() {
            PhaseKind::Question => sim.submit_estimates(&record).await,
            kind if kind.is_betting() => sim.take_turn(&record).await,
            PhaseKind::Reveal => sim.advance(&record).await?,
            PhaseKind::GameOver => break,
            _ => {}
        }
    }

    Ok(manager.standings(session.id).await?)
}
