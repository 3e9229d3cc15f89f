//! Words-per-minute scoring.
//!
//! Computed fresh on every correct word from the session's canonical start
//! time and the handler's local progress, never accumulated incrementally.

use std::time::Duration;

/// Elapsed-time floor: avoids a division blow-up on the first word.
const MIN_ELAPSED_SECS: f64 = 1e-3;

/// Characters per "word" in the standard typing metric.
const CHARS_PER_WORD: f64 = 5.0;

/// Compute the current words-per-minute value.
///
/// `completed` is the count of correctly typed words so far (capped at the
/// sequence length). Characters counted are the lengths of the completed
/// prefix plus one inter-word space between each adjacent pair. Returns 0
/// when nothing has been completed.
pub fn words_per_minute(words: &[String], completed: usize, elapsed: Duration) -> u32 {
    let n = completed.min(words.len());
    if n == 0 {
        return 0;
    }

    let mut chars: usize = words[..n].iter().map(String::len).sum();
    if n > 1 {
        chars += n - 1;
    }

    let elapsed_secs = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
    let value = (chars as f64 / CHARS_PER_WORD) / (elapsed_secs / 60.0);
    value.max(0.0).round() as u32
}
