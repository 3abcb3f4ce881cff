//! Monotonic counter for negotiation rounds and connection generations.
//!
//! # What is a negotiation round? (for beginners)
//!
//! Every offer a client sends starts a new *round* of offer/answer.  The
//! answering side copies the round number into its answer, so the offerer
//! can tell which offer an answer belongs to when a renegotiation overlaps
//! with an earlier one.
//!
//! The same counter also numbers peer-connection *generations*: each new
//! connection object gets the next value, and callbacks from an older,
//! already-closed connection carry a stale number that the controller drops.
//!
//! The counter uses `AtomicU64` so observer callbacks running on the WebRTC
//! stack's own tasks can read it without a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe counter that hands out 1, 2, 3, ...
///
/// Zero is never handed out, so it can stand for "nothing issued yet".
///
/// # Examples
///
/// ```rust
/// use deskshare_core::protocol::RoundCounter;
///
/// let rounds = RoundCounter::new();
/// assert_eq!(rounds.current(), 0);
/// assert_eq!(rounds.next(), 1);
/// assert_eq!(rounds.next(), 2);
/// assert_eq!(rounds.current(), 2);
/// ```
#[derive(Debug)]
pub struct RoundCounter {
    last: AtomicU64,
}

impl RoundCounter {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Issues the next number.
    ///
    /// `Relaxed` is enough: the value only labels messages, it does not
    /// publish other memory.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// The most recently issued number, or 0 if none was issued.
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for RoundCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_round_counter_starts_at_one() {
        // Arrange
        let counter = RoundCounter::new();

        // Act
        let first = counter.next();

        // Assert
        assert_eq!(first, 1);
    }

    #[test]
    fn test_current_reports_last_issued_without_advancing() {
        // Arrange
        let counter = RoundCounter::default();
        counter.next();
        counter.next();

        // Act
        let current = counter.current();

        // Assert
        assert_eq!(current, 2);
        assert_eq!(counter.next(), 3);
    }

    #[test]
    fn test_round_counter_is_unique_across_threads() {
        // Arrange
        let counter = Arc::new(RoundCounter::new());

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&counter);
                thread::spawn(move || (0..250).map(|_| c.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.last(), Some(&1000));
    }
}
