use std::fmt;

/// Represents the state of one source task inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Queued, waiting for a worker slot
    Pending,

    /// Holding a worker slot
    Running,

    /// Extraction finished and produced candidates (possibly zero)
    Succeeded,

    /// Extraction failed terminally
    Failed,
}

impl TaskStatus {
    /// Returns true if no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
    }
}
