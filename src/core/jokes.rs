//! Read-only joke lists, one newline-delimited file per language mode

use std::fs;
use std::io;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

/// File name of the joke list inside a mode directory
pub const JOKES_FILE: &str = "jokes.txt";

#[derive(Debug, Clone, Default)]
pub struct JokeBook {
    jokes: Vec<String>,
}

impl JokeBook {
    /// Load jokes from `path`; a missing or unreadable file is an empty book
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => {
                let book = Self::parse(&content);
                tracing::debug!("Loaded {} jokes from {}", book.len(), path.display());
                book
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No joke file at {}", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse newline-delimited jokes, skipping blank lines
    pub fn parse(content: &str) -> Self {
        Self {
            jokes: content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Pick a joke uniformly at random, `None` when the book is empty
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.jokes.choose(rng).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.jokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jokes.is_empty()
    }
}
