//! User-facing message catalog per language mode
//!
//! Every mode can override any subset of the built-in English strings with a
//! `messages.toml` file in its data directory.
//!
//! # Example Message File
//!
//! ```toml
//! greeting = "Asistente (escribe 'exit' para salir)"
//! unknown = "No sé cómo responder a eso. ¿Cómo debería contestar?"
//! no_topic = "No tengo información sobre {topic}."
//! ```
//!
//! `{topic}` and `{mode}` are substituted where the message supports them.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

/// File name of the message catalog inside a mode directory
pub const MESSAGES_FILE: &str = "messages.toml";

/// Catalog of replies the bot can give outside of learned knowledge
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub greeting: String,
    pub farewell: String,
    pub unknown: String,
    pub teach_prompt: String,
    pub taught: String,
    pub teach_skipped: String,
    pub teach_failed: String,
    pub no_jokes: String,
    pub no_topic: String,
    pub translate: String,
    pub mode_switched: String,
    pub unknown_mode: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            greeting: builtin::GREETING.to_string(),
            farewell: builtin::FAREWELL.to_string(),
            unknown: builtin::UNKNOWN.to_string(),
            teach_prompt: builtin::TEACH_PROMPT.to_string(),
            taught: builtin::TAUGHT.to_string(),
            teach_skipped: builtin::TEACH_SKIPPED.to_string(),
            teach_failed: builtin::TEACH_FAILED.to_string(),
            no_jokes: builtin::NO_JOKES.to_string(),
            no_topic: builtin::NO_TOPIC.to_string(),
            translate: builtin::TRANSLATE.to_string(),
            mode_switched: builtin::MODE_SWITCHED.to_string(),
            unknown_mode: builtin::UNKNOWN_MODE.to_string(),
        }
    }
}

impl Messages {
    /// Load the catalog at `path`, falling back to built-ins.
    ///
    /// Missing fields keep their built-in value. A missing or malformed file
    /// yields the built-in catalog.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Could not read {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match Self::from_str(&content) {
            Ok(messages) => {
                tracing::debug!("Loaded message catalog from {}", path.display());
                messages
            }
            Err(e) => {
                tracing::warn!("Malformed message catalog {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse a catalog from a TOML string
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn no_topic(&self, topic: &str) -> String {
        self.no_topic.replace("{topic}", topic)
    }

    pub fn mode_switched(&self, mode: &str) -> String {
        self.mode_switched.replace("{mode}", mode)
    }

    pub fn unknown_mode(&self, mode: &str, available: &[String]) -> String {
        self.unknown_mode
            .replace("{mode}", mode)
            .replace("{available}", &available.join(", "))
    }
}

/// Built-in English messages that don't require files
pub mod builtin {
    pub const GREETING: &str = "AI Assistant (type 'exit' to quit)";

    pub const FAREWELL: &str = "Goodbye!";

    pub const UNKNOWN: &str = "I don't know how to respond to that. How should I reply?";

    pub const TEACH_PROMPT: &str = "Teach me: ";

    pub const TAUGHT: &str = "Got it! I'll remember that. Thank you!";

    pub const TEACH_SKIPPED: &str = "Okay, I'll skip that one.";

    pub const TEACH_FAILED: &str = "Sorry, I couldn't save that. Please try again later.";

    pub const NO_JOKES: &str = "I don't know any jokes yet.";

    pub const NO_TOPIC: &str = "I don't have any information about {topic}.";

    pub const TRANSLATE: &str = "Please translate at https://translate.google.com";

    pub const MODE_SWITCHED: &str = "Switched to mode '{mode}'.";

    pub const UNKNOWN_MODE: &str = "Unknown mode '{mode}'. Available modes: {available}";
}
