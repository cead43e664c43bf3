//! Exit code logic for the harvester process.
//!
//! Single responsibility: map the run outcome to the process exit status.

use std::process::ExitCode;

use harvester_core::RunStatus;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every adapter succeeded.
    Success,
    /// Some adapters failed but the catalog was written.
    Partial,
    /// Run-fatal error, or no adapter succeeded.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(2),
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

/// Determines the process exit outcome from the run status.
pub(crate) fn determine_exit_outcome(status: RunStatus) -> ProcessExit {
    match status {
        RunStatus::Success => ProcessExit::Success,
        RunStatus::Partial => ProcessExit::Partial,
        RunStatus::AllFailed => ProcessExit::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(RunStatus::Success), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(RunStatus::Partial), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(RunStatus::AllFailed), ProcessExit::Failure);
    }
}
