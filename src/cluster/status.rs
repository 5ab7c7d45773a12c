use std::fmt;

/// Lifecycle state of a Spark application as reported by the operator.
///
/// The operator reports an empty state for applications it has not picked up
/// yet; that and the literal `NEW` both map to [`ApplicationState::New`].
/// Anything else we do not recognize is carried verbatim in
/// [`ApplicationState::Unknown`] rather than silently misclassified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationState {
    New,
    Submitted,
    Running,
    Completed,
    Failed,
    Unknown(String),
}

impl ApplicationState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" | "NEW" => ApplicationState::New,
            "SUBMITTED" => ApplicationState::Submitted,
            "RUNNING" => ApplicationState::Running,
            "COMPLETED" => ApplicationState::Completed,
            "FAILED" => ApplicationState::Failed,
            other => ApplicationState::Unknown(other.to_string()),
        }
    }

    /// States counted into the `jobs_running` gauge.
    pub fn counts_as_running(&self) -> bool {
        matches!(
            self,
            ApplicationState::Submitted | ApplicationState::Running
        )
    }

    /// States counted into the `jobs_pending` gauge. Unknown states are
    /// counted like `New`: not yet confirmed scheduled.
    pub fn counts_as_pending(&self) -> bool {
        matches!(
            self,
            ApplicationState::New | ApplicationState::Submitted | ApplicationState::Unknown(_)
        )
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationState::New => write!(f, "new"),
            ApplicationState::Submitted => write!(f, "submitted"),
            ApplicationState::Running => write!(f, "running"),
            ApplicationState::Completed => write!(f, "completed"),
            ApplicationState::Failed => write!(f, "failed"),
            ApplicationState::Unknown(raw) => write!(f, "unknown({})", raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_states() {
        assert_eq!(ApplicationState::parse("RUNNING"), ApplicationState::Running);
        assert_eq!(
            ApplicationState::parse("SUBMITTED"),
            ApplicationState::Submitted
        );
        assert_eq!(
            ApplicationState::parse("COMPLETED"),
            ApplicationState::Completed
        );
        assert_eq!(ApplicationState::parse("FAILED"), ApplicationState::Failed);
    }

    #[test]
    fn empty_and_new_both_map_to_new() {
        assert_eq!(ApplicationState::parse(""), ApplicationState::New);
        assert_eq!(ApplicationState::parse("NEW"), ApplicationState::New);
    }

    #[test]
    fn unrecognized_state_is_preserved() {
        let state = ApplicationState::parse("PENDING_RERUN");
        assert_eq!(
            state,
            ApplicationState::Unknown("PENDING_RERUN".to_string())
        );
        assert_eq!(state.to_string(), "unknown(PENDING_RERUN)");
    }

    #[test]
    fn unknown_counts_as_pending_not_running() {
        let state = ApplicationState::parse("INVALIDATING");
        assert!(state.counts_as_pending());
        assert!(!state.counts_as_running());
    }

    #[test]
    fn submitted_counts_as_both_running_and_pending() {
        let state = ApplicationState::Submitted;
        assert!(state.counts_as_running());
        assert!(state.counts_as_pending());
    }

    #[test]
    fn terminal_states_count_as_neither() {
        for state in [ApplicationState::Completed, ApplicationState::Failed] {
            assert!(!state.counts_as_running());
            assert!(!state.counts_as_pending());
        }
    }
}
