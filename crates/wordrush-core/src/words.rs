//! The immutable word pool races draw from.
//!
//! Loaded once at startup (one word per line, blanks skipped) and shared
//! read-only afterwards. Sampling is uniform **with replacement**, so a race
//! sequence may repeat words. The pool is handed to the session registry as a
//! value rather than living in a global, so tests inject deterministic lists.

use std::path::Path;

use rand::Rng;

/// Word list loading errors.
#[derive(Debug, thiserror::Error)]
pub enum WordListError {
    /// Failed to read the word file.
    #[error("failed to read word list at {path}: {source}")]
    Read {
        /// Word file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file contained no usable words.
    #[error("word list at {path} is empty")]
    Empty {
        /// Word file path.
        path: String,
    },
}

/// Immutable pool of candidate words.
#[derive(Debug, Clone)]
pub struct WordPool {
    words: Vec<String>,
}

impl WordPool {
    /// Build a pool from an in-memory list. Blank entries are dropped and
    /// surrounding whitespace trimmed.
    pub fn new(words: Vec<String>) -> Self {
        let words = words
            .into_iter()
            .map(|word| word.trim().to_string())
            .filter(|word| !word.is_empty())
            .collect();
        Self { words }
    }

    /// Load a pool from a file with one word per line.
    pub fn load(path: &Path) -> Result<Self, WordListError> {
        let raw = std::fs::read_to_string(path).map_err(|source| WordListError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let pool = Self::new(raw.lines().map(String::from).collect());
        if pool.is_empty() {
            return Err(WordListError::Empty {
                path: path.display().to_string(),
            });
        }
        tracing::info!(path = %path.display(), words = pool.len(), "word list loaded");
        Ok(pool)
    }

    /// Number of candidate words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the pool holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Sample `n` words uniformly with replacement. Returns an empty sequence
    /// when the pool is empty.
    pub fn chunk<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<String> {
        if self.words.is_empty() {
            return Vec::new();
        }
        (0..n)
            .map(|_| self.words[rng.random_range(0..self.words.len())].clone())
            .collect()
    }
}
