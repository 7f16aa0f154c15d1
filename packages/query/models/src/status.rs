//! Job status codes reported by the query-job endpoint.
//!
//! The numeric `statusCode` is the authoritative field; the human-readable
//! `status` string is rebuilt locally from this table.

use std::fmt;

use strum_macros::AsRefStr;

/// Synthetic status code recorded when the status request itself failed
/// before any response arrived.
pub const UNSPECIFIED_ERROR_CODE: i64 = -999;

/// State of a submitted query job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
pub enum QueryStatus {
    /// Accepted, waiting for resources.
    Queued,
    /// Being set up.
    Initializing,
    /// Executing.
    Running,
    /// Writing output.
    Writing,
    /// Packaging the result archive.
    Packaging,
    /// Finished with data.
    Succeeded,
    /// Finished without matching data.
    NoDataFound,
    /// Stopped by a user or administrator.
    Killed,
    /// Removed from the server.
    Deleted,
    /// Execution failed.
    Failed,
    /// Output conversion failed.
    FailedConversion,
    /// A code outside the documented enumeration.
    Unknown(i64),
}

impl QueryStatus {
    /// Maps a server status code to its status.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Queued,
            1 => Self::Initializing,
            10 => Self::Running,
            11 => Self::Writing,
            12 => Self::Packaging,
            20 => Self::Succeeded,
            21 => Self::NoDataFound,
            30 => Self::Killed,
            31 => Self::Deleted,
            40 => Self::Failed,
            41 => Self::FailedConversion,
            other => Self::Unknown(other),
        }
    }

    /// Returns the server status code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Queued => 0,
            Self::Initializing => 1,
            Self::Running => 10,
            Self::Writing => 11,
            Self::Packaging => 12,
            Self::Succeeded => 20,
            Self::NoDataFound => 21,
            Self::Killed => 30,
            Self::Deleted => 31,
            Self::Failed => 40,
            Self::FailedConversion => 41,
            Self::Unknown(code) => code,
        }
    }

    /// Returns the status name without its code.
    #[must_use]
    pub fn label(&self) -> &str {
        self.as_ref()
    }

    /// Returns `true` while the job has not reached a terminal state.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::Queued | Self::Initializing | Self::Running | Self::Writing | Self::Packaging
        )
    }

    /// Returns `true` for terminal states that a plain status check treats
    /// as a normal outcome rather than an error.
    #[must_use]
    pub const fn is_quiet_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::NoDataFound | Self::Killed | Self::Deleted
        )
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENTED: &[i64] = &[0, 1, 10, 11, 12, 20, 21, 30, 31, 40, 41];

    #[test]
    fn documented_codes_round_trip() {
        for &code in DOCUMENTED {
            let status = QueryStatus::from_code(code);
            assert!(!matches!(status, QueryStatus::Unknown(_)), "{code}");
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(QueryStatus::Succeeded.to_string(), "Succeeded(20)");
        assert_eq!(QueryStatus::Failed.to_string(), "Failed(40)");
        assert_eq!(QueryStatus::from_code(99).to_string(), "Unknown(99)");
    }

    #[test]
    fn in_progress_codes() {
        let in_progress: Vec<i64> = DOCUMENTED
            .iter()
            .copied()
            .filter(|&c| QueryStatus::from_code(c).is_in_progress())
            .collect();
        assert_eq!(in_progress, vec![0, 1, 10, 11, 12]);
    }

    #[test]
    fn failures_are_not_quiet() {
        assert!(!QueryStatus::Failed.is_quiet_terminal());
        assert!(!QueryStatus::FailedConversion.is_quiet_terminal());
        assert!(!QueryStatus::Unknown(7).is_quiet_terminal());
        assert!(QueryStatus::NoDataFound.is_quiet_terminal());
    }
}
