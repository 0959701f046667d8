//! Response resolution engine
//!
//! The ChatEngine is the core of the bot. For each utterance it:
//! 1. Ignores blank input and honours the exit command
//! 2. Runs the intent recognizers (mode switch, joke, topic, translation)
//! 3. Looks the utterance up in the knowledge store, exactly then fuzzily
//! 4. Asks to be taught when nothing matched, and stores the next input as
//!    the answer

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;

use crate::config::messages::MESSAGES_FILE;
use crate::config::{Config, Messages};
use crate::conversation::{Session, SessionState};

use super::intents::{Intent, IntentRecognizer};
use super::jokes::{JokeBook, JOKES_FILE};
use super::knowledge::{KnowledgeStore, StoreError, KNOWLEDGE_FILE};
use super::matcher::{Match, Matcher};
use super::normalize::{is_blank, normalize};

/// Command that ends a session, compared after normalization
pub const EXIT_COMMAND: &str = "exit";

/// Outcome of a single turn
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing but whitespace was entered
    Blank,
    Exit,
    ModeSwitched {
        mode: String,
    },
    UnknownMode {
        requested: String,
        available: Vec<String>,
    },
    /// `None` when the mode has no jokes
    Joke {
        joke: Option<String>,
    },
    /// `None` when no key mentions the topic
    Topic {
        topic: String,
        response: Option<String>,
    },
    Translate,
    Answer {
        found: Match,
    },
    /// Nothing matched; the next input on the session teaches `key`
    NeedsTeaching {
        key: String,
    },
    Taught {
        key: String,
    },
    TeachSkipped,
}

impl Reply {
    /// Text shown to the user, `None` for blank input
    pub fn text(&self, messages: &Messages) -> Option<String> {
        let text = match self {
            Reply::Blank => return None,
            Reply::Exit => messages.farewell.clone(),
            Reply::ModeSwitched { mode } => messages.mode_switched(mode),
            Reply::UnknownMode {
                requested,
                available,
            } => messages.unknown_mode(requested, available),
            Reply::Joke { joke } => joke.clone().unwrap_or_else(|| messages.no_jokes.clone()),
            Reply::Topic { topic, response } => response
                .clone()
                .unwrap_or_else(|| messages.no_topic(topic)),
            Reply::Translate => messages.translate.clone(),
            Reply::Answer { found } => found.value().to_string(),
            Reply::NeedsTeaching { .. } => messages.unknown.clone(),
            Reply::Taught { .. } => messages.taught.clone(),
            Reply::TeachSkipped => messages.teach_skipped.clone(),
        };
        Some(text)
    }

    /// Normalized utterance a teach prompt or confirmation refers to
    pub fn teach_key(&self) -> Option<&str> {
        match self {
            Reply::NeedsTeaching { key } | Reply::Taught { key } => Some(key),
            _ => None,
        }
    }

    /// Stable name of the branch taken
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Blank => "blank",
            Reply::Exit => "exit",
            Reply::ModeSwitched { .. } => "mode_switched",
            Reply::UnknownMode { .. } => "unknown_mode",
            Reply::Joke { .. } => "joke",
            Reply::Topic { .. } => "topic",
            Reply::Translate => "translate",
            Reply::Answer { .. } => "answer",
            Reply::NeedsTeaching { .. } => "needs_teaching",
            Reply::Taught { .. } => "taught",
            Reply::TeachSkipped => "teach_skipped",
        }
    }
}

/// Errors from the chat engine
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Invalid intent pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Everything loaded for one language mode
#[derive(Debug)]
struct ModeData {
    store: KnowledgeStore,
    jokes: JokeBook,
    messages: Messages,
}

impl ModeData {
    fn load(config: &Config, mode: &str) -> Self {
        let dir = config.mode_dir(mode);
        let data = Self {
            store: KnowledgeStore::load(dir.join(KNOWLEDGE_FILE)),
            jokes: JokeBook::load(&dir.join(JOKES_FILE)),
            messages: Messages::load(&dir.join(MESSAGES_FILE)),
        };
        if data.store.is_empty() && data.jokes.is_empty() {
            tracing::info!("Activated mode '{}' with no data yet", mode);
        } else {
            tracing::info!(
                "Activated mode '{}': {} entries, {} jokes",
                mode,
                data.store.len(),
                data.jokes.len()
            );
        }
        data
    }
}

/// The core chat engine
pub struct ChatEngine {
    config: Config,
    recognizer: IntentRecognizer,
    matcher: Matcher,
    modes: HashMap<String, ModeData>,
    fallback_messages: Messages,
    rng: StdRng,
}

impl ChatEngine {
    /// Create a new chat engine. Modes are loaded lazily on first use.
    pub fn new(config: Config) -> Result<Self, ChatError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    /// Create a chat engine drawing joke and topic picks from `rng`
    pub fn with_rng(config: Config, rng: StdRng) -> Result<Self, ChatError> {
        Ok(Self {
            matcher: Matcher::new(config.fuzzy_threshold),
            recognizer: IntentRecognizer::new()?,
            modes: HashMap::new(),
            fallback_messages: Messages::default(),
            config,
            rng,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a session on the default mode, loading it if no session has yet
    pub fn start_session(&mut self) -> Session {
        let mode = self.config.default_mode.clone();
        if !self.modes.contains_key(&mode) {
            self.activate(&mode);
        }
        Session::new(mode)
    }

    /// (Re)load the knowledge, jokes and messages of a configured mode
    fn activate(&mut self, mode: &str) {
        let data = ModeData::load(&self.config, mode);
        self.modes.insert(mode.to_string(), data);
    }

    /// Message catalog of a mode, built-ins when the mode is not loaded
    pub fn messages(&self, mode: &str) -> &Messages {
        self.modes
            .get(mode)
            .map(|data| &data.messages)
            .unwrap_or(&self.fallback_messages)
    }

    /// Knowledge store of a loaded mode
    pub fn knowledge(&self, mode: &str) -> Option<&KnowledgeStore> {
        self.modes.get(mode).map(|data| &data.store)
    }

    /// Process one input on a session and return the reply.
    ///
    /// On a teach prompt the input is taken as the answer to teach. A failed
    /// save is returned as an error and the session goes back to awaiting
    /// input without having learned anything.
    pub fn respond(&mut self, session: &mut Session, input: &str) -> Result<Reply, ChatError> {
        match std::mem::replace(&mut session.state, SessionState::AwaitingInput) {
            SessionState::Exit => {
                session.state = SessionState::Exit;
                return Ok(Reply::Exit);
            }
            SessionState::TeachPrompt { key } => return self.teach(session, key, input),
            SessionState::AwaitingInput => {}
        }

        if is_blank(input) {
            return Ok(Reply::Blank);
        }

        if normalize(input) == EXIT_COMMAND {
            tracing::debug!("Session {} exiting", session.id);
            session.state = SessionState::Exit;
            return Ok(Reply::Exit);
        }

        if let Some(intent) = self.recognizer.recognize(input) {
            tracing::debug!("Recognized intent {:?}", intent);
            return self.handle_intent(session, intent);
        }

        let data = mode_data(&mut self.modes, &self.config, &session.mode)?;
        match self.matcher.resolve(input, &data.store) {
            Some(found) => {
                if let Match::Fuzzy { key, ratio, .. } = &found {
                    tracing::info!("Answering with closest key '{}' ({:.2})", key, ratio);
                }
                Ok(Reply::Answer { found })
            }
            None => {
                let key = normalize(input);
                session.state = SessionState::TeachPrompt { key: key.clone() };
                Ok(Reply::NeedsTeaching { key })
            }
        }
    }

    fn handle_intent(&mut self, session: &mut Session, intent: Intent) -> Result<Reply, ChatError> {
        match intent {
            Intent::ModeSwitch(mode) => {
                if !self.config.has_mode(&mode) {
                    tracing::warn!("Unknown mode '{}' requested", mode);
                    return Ok(Reply::UnknownMode {
                        requested: mode,
                        available: self.config.modes.clone(),
                    });
                }
                self.activate(&mode);
                session.mode = mode.clone();
                Ok(Reply::ModeSwitched { mode })
            }
            Intent::Joke => {
                let data = mode_data(&mut self.modes, &self.config, &session.mode)?;
                let joke = data.jokes.pick(&mut self.rng).map(String::from);
                Ok(Reply::Joke { joke })
            }
            Intent::Topic(topic) => {
                let data = mode_data(&mut self.modes, &self.config, &session.mode)?;
                let response = data
                    .store
                    .values_for_topic(&topic)
                    .choose(&mut self.rng)
                    .map(|value| value.to_string());
                Ok(Reply::Topic { topic, response })
            }
            Intent::Translate => Ok(Reply::Translate),
        }
    }

    fn teach(&mut self, session: &Session, key: String, input: &str) -> Result<Reply, ChatError> {
        if is_blank(input) {
            tracing::debug!("Teaching skipped for '{}'", key);
            return Ok(Reply::TeachSkipped);
        }

        let data = mode_data(&mut self.modes, &self.config, &session.mode)?;
        data.store.put(&key, input.trim())?;
        Ok(Reply::Taught { key })
    }
}

/// Loaded data of a configured mode, loading it on first use
fn mode_data<'a>(
    modes: &'a mut HashMap<String, ModeData>,
    config: &Config,
    mode: &str,
) -> Result<&'a mut ModeData, ChatError> {
    if !config.has_mode(mode) {
        return Err(ChatError::UnknownMode(mode.to_string()));
    }
    Ok(modes
        .entry(mode.to_string())
        .or_insert_with(|| ModeData::load(config, mode)))
}
