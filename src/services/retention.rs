use crate::models::FileEntry;
use std::fmt;
use std::time::{Duration, SystemTime};

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Move,
    Skip,
}

impl Verdict {
    /// Tag written to the scan log.
    pub fn tag(self) -> &'static str {
        match self {
            Verdict::Move => "[MOVE]",
            Verdict::Skip => "[SKIP]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    Eligible,
    CategoryMismatch,
    TooNew,
}

/// Outcome of evaluating one file entry. Computed once, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionDecision {
    pub verdict: Verdict,
    pub reason: DecisionReason,
    pub age_days: u64,
}

impl fmt::Display for RetentionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            DecisionReason::Eligible => write!(f, "eligible ({} days old)", self.age_days),
            DecisionReason::CategoryMismatch => write!(f, "category mismatch"),
            DecisionReason::TooNew => write!(f, "too new ({} days old)", self.age_days),
        }
    }
}

/// Age-based retention rule, evaluated against a fixed scan-start instant.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    retention_days: u64,
    now: SystemTime,
}

impl RetentionPolicy {
    /// # Arguments
    /// * `retention_days` - Minimum age in whole days; `0` makes every matching file eligible
    /// * `now` - Reference instant, normally the scan start
    pub fn new(retention_days: u64, now: SystemTime) -> Self {
        Self {
            retention_days,
            now,
        }
    }

    /// MOVE iff the entry matched a selected category and is at least
    /// `retention_days` old. Category is checked first, so a mismatch is
    /// reported regardless of age.
    pub fn classify(&self, entry: &FileEntry) -> RetentionDecision {
        let age_days = age_in_days(self.now, entry.modified);

        let (verdict, reason) = if entry.category.is_none() {
            (Verdict::Skip, DecisionReason::CategoryMismatch)
        } else if age_days >= self.retention_days {
            (Verdict::Move, DecisionReason::Eligible)
        } else {
            (Verdict::Skip, DecisionReason::TooNew)
        };

        RetentionDecision {
            verdict,
            reason,
            age_days,
        }
    }
}

/// Whole days between `modified` and `now`, floor-truncated. Timestamps in
/// the future count as zero days old.
pub fn age_in_days(now: SystemTime, modified: SystemTime) -> u64 {
    now.duration_since(modified)
        .unwrap_or(Duration::ZERO)
        .as_secs()
        / SECONDS_PER_DAY
}
