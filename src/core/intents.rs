//! Pattern-based intent recognition
//!
//! Intents are checked before any knowledge lookup, in a fixed order:
//!
//! 1. mode switch (`mode: <id>`)
//! 2. joke request (`tell me a joke`)
//! 3. topic redirection (see [`TOPIC_TEMPLATES`])
//! 4. translation request (`translate` and `in` anywhere in the input)
//!
//! The first recognizer that fires decides the intent.

use regex::Regex;

use super::normalize::normalize;

/// Phrase that asks for a joke, compared after normalization
pub const JOKE_PHRASE: &str = "tell me a joke";

/// Topic templates in priority order: (regex, capture group holding the topic).
///
/// The order is part of the behavior. Templates are anchored at the start of
/// the trimmed input and stop before an optional trailing question mark.
pub const TOPIC_TEMPLATES: &[(&str, usize)] = &[
    (r"(?i)^tell me about\s+([^?\s].*?)\s*\??$", 1),
    (r"(?i)^what about\s+([^?\s].*?)\s*\??$", 1),
    (r"(?i)^speaking of\s+([^?\s].*?)\s*\??$", 1),
    (r"(?i)^how about\s+([^?\s].*?)\s*\??$", 1),
    (r"(?i)^do you know about\s+([^?\s].*?)\s*\??$", 1),
    (r"(?i)^do you know anything about\s+([^?\s].*?)\s*\??$", 1),
];

const MODE_SWITCH: &str = r"(?i)^mode\s*:\s*(.*)$";

/// A recognized intent and its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Requested mode id, normalized; may name an unconfigured mode
    ModeSwitch(String),
    Joke,
    /// Normalized topic
    Topic(String),
    Translate,
}

/// A compiled template with the capture group that holds its payload
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    group: usize,
}

impl Pattern {
    pub fn new(pattern: &str, group: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            group,
        })
    }

    /// The captured payload when the template matches
    pub fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(self.group))
            .map(|m| m.as_str())
    }
}

/// First template in `patterns` that matches wins
pub fn first_match<'t>(patterns: &[Pattern], text: &'t str) -> Option<&'t str> {
    patterns.iter().find_map(|pattern| pattern.capture(text))
}

/// Recognizes intents from raw utterances
#[derive(Debug, Clone)]
pub struct IntentRecognizer {
    mode_switch: Pattern,
    topics: Vec<Pattern>,
}

impl IntentRecognizer {
    pub fn new() -> Result<Self, regex::Error> {
        let topics = TOPIC_TEMPLATES
            .iter()
            .map(|(pattern, group)| Pattern::new(pattern, *group))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mode_switch: Pattern::new(MODE_SWITCH, 1)?,
            topics,
        })
    }

    /// Run every recognizer in priority order
    pub fn recognize(&self, text: &str) -> Option<Intent> {
        let text = text.trim();

        self.mode_switch(text)
            .or_else(|| is_joke_request(text).then_some(Intent::Joke))
            .or_else(|| self.topic(text))
            .or_else(|| is_translation_request(text).then_some(Intent::Translate))
    }

    fn mode_switch(&self, text: &str) -> Option<Intent> {
        self.mode_switch
            .capture(text)
            .map(|mode| Intent::ModeSwitch(normalize(mode)))
    }

    fn topic(&self, text: &str) -> Option<Intent> {
        first_match(&self.topics, text).map(|topic| Intent::Topic(normalize(topic)))
    }
}

pub fn is_joke_request(text: &str) -> bool {
    normalize(text) == JOKE_PHRASE
}

/// Both `translate` and `in` appear as words, in any order.
///
/// This is a loose heuristic: "translate this in five minutes" also matches.
pub fn is_translation_request(text: &str) -> bool {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    words.contains(&"translate") && words.contains(&"in")
}
