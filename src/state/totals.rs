use serde::Serialize;
use std::ops::AddAssign;

/// Running counters of a crawl session
///
/// Every candidate a task yields lands in exactly one of `new`, `duplicate`,
/// `updated` or `errors`, and a task that fails outright counts once as found
/// and once as an error, so `found == new + duplicate + updated + errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionTotals {
    pub found: u64,
    pub new: u64,
    pub duplicate: u64,
    pub updated: u64,
    pub errors: u64,
}

impl SessionTotals {
    /// Delta for one candidate classified as new
    pub fn new_record() -> Self {
        Self { found: 1, new: 1, ..Default::default() }
    }

    pub fn duplicate_record() -> Self {
        Self { found: 1, duplicate: 1, ..Default::default() }
    }

    pub fn updated_record() -> Self {
        Self { found: 1, updated: 1, ..Default::default() }
    }

    /// Delta for one rejected candidate or one failed task
    pub fn error() -> Self {
        Self { found: 1, errors: 1, ..Default::default() }
    }

    /// Returns true if the accounting identity holds
    pub fn is_balanced(&self) -> bool {
        self.found == self.new + self.duplicate + self.updated + self.errors
    }

    /// Records that reached the store (new or updated)
    pub fn committed(&self) -> u64 {
        self.new + self.updated
    }
}

impl AddAssign for SessionTotals {
    fn add_assign(&mut self, other: Self) {
        self.found += other.found;
        self.new += other.new;
        self.duplicate += other.duplicate;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}
