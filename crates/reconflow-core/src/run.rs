//! Run-level outcome and notification gating

use crate::error_registry::ErrorRegistry;

/// Output mode that enables per-event notifications
pub const EVENTS_OUTPUT: &str = "events";

/// How a reconciliation run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All units reconciled
    Completed,
    /// Dry run finished after a clean plan/diff
    DryRunCompleted,
    /// Configuration artifacts were written and nothing else happened
    PrintOnly,
    /// The source of truth declared nothing for this selector
    NoDesiredRecords,
    /// Desired records exist but no live target could be reached
    NoTargets,
    /// Deletions were planned while deletions are disabled
    DisabledDeletions,
    /// At least one unit registered an error
    ErrorsRegistered(usize),
}

impl RunOutcome {
    /// Success unless something was registered; fall back to `success`
    pub fn from_registry(errors: &ErrorRegistry, success: RunOutcome) -> RunOutcome {
        match errors.len() {
            0 => success,
            n => RunOutcome::ErrorsRegistered(n),
        }
    }

    /// Clean finish for the run's mode
    pub fn finished(dry_run: bool) -> RunOutcome {
        if dry_run {
            RunOutcome::DryRunCompleted
        } else {
            RunOutcome::Completed
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed | RunOutcome::DryRunCompleted | RunOutcome::PrintOnly => 0,
            _ => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }

    pub fn reason(&self) -> String {
        match self {
            RunOutcome::Completed => "reconciliation completed".to_string(),
            RunOutcome::DryRunCompleted => "dry run completed".to_string(),
            RunOutcome::PrintOnly => "configuration written".to_string(),
            RunOutcome::NoDesiredRecords => "no declarative records found".to_string(),
            RunOutcome::NoTargets => "no live targets found".to_string(),
            RunOutcome::DisabledDeletions => {
                "deletions planned while deletion is disabled".to_string()
            }
            RunOutcome::ErrorsRegistered(n) => format!("execution error ({} registered)", n),
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Whether per-event notifications may be posted for a finished run
///
/// All of: not a dry run, exactly one top-level unit processed, output mode
/// `events`, and nothing registered as an error.
pub fn should_notify(
    dry_run: bool,
    units_processed: usize,
    output: Option<&str>,
    errors: &ErrorRegistry,
) -> bool {
    !dry_run && units_processed == 1 && output == Some(EVENTS_OUTPUT) && !errors.has_errors()
}
