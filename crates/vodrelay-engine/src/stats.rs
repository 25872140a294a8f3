use std::fmt;

use crate::engine::Outcome;

/// Per-batch tally, logged after every video and printed at the end of a
/// run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchStats {
    /// Fold one video's outcome into the running totals. A cancelled video
    /// was not processed and counts nowhere.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Done => self.success += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Cancelled => {}
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.success, self.failed, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_fold_into_running_totals() {
        let mut stats = BatchStats::default();
        stats.record(Outcome::Done);
        stats.record(Outcome::Skipped);
        stats.record(Outcome::Failed);
        stats.record(Outcome::Done);
        stats.record(Outcome::Cancelled);

        assert_eq!(
            stats,
            BatchStats {
                success: 2,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(stats.total(), 4);
        assert_eq!(stats.to_string(), "2 succeeded, 1 failed, 1 skipped");
    }
}
