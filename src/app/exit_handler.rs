use harvester_core::RunOutcome;

use crate::ProcessExit;

/// Maps how a run ended to the process exit status.
pub(crate) fn determine_exit_outcome(outcome: &RunOutcome) -> ProcessExit {
    if outcome.is_complete() {
        ProcessExit::Success
    } else {
        ProcessExit::Stopped
    }
}
