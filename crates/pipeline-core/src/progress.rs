// crates/pipeline-core/src/progress.rs
// ============================================================================
// Module: Progress Tracker
// Description: Pure progress-percentage calculation.
// ============================================================================

//! A pure function with no I/O, called by the orchestrator at every step
//! transition. Kept side-effect free so it is trivially unit-testable and so
//! the orchestrator can compute progress without touching the store.

use serde::Deserialize;
use serde::Serialize;

/// A point-in-time progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Steps completed so far (promoted, skipped, or degraded — anything
    /// terminal for that step).
    pub steps_completed: u32,
    /// Total steps in the registry for this run.
    pub total_steps: u32,
    /// Percentage complete, `0..=100`, rounded down.
    pub percent: u8,
}

/// Computes a [`Progress`] snapshot.
///
/// `total_steps == 0` returns `100%` (an empty pipeline is vacuously done),
/// matching the original implementation's guard against division by zero.
#[must_use]
pub fn calculate_progress(steps_completed: u32, total_steps: u32) -> Progress {
    let percent = if total_steps == 0 {
        100
    } else {
        let completed = u64::from(steps_completed.min(total_steps));
        let total = u64::from(total_steps);
        u8::try_from((completed * 100) / total).unwrap_or(100)
    };
    Progress {
        steps_completed: steps_completed.min(total_steps),
        total_steps,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::calculate_progress;

    #[test]
    fn zero_of_zero_is_complete() {
        assert_eq!(calculate_progress(0, 0).percent, 100);
    }

    #[test]
    fn zero_of_n_is_zero_percent() {
        assert_eq!(calculate_progress(0, 5).percent, 0);
    }

    #[test]
    fn all_of_n_is_complete() {
        assert_eq!(calculate_progress(5, 5).percent, 100);
    }

    #[test]
    fn partial_progress_rounds_down() {
        // 1 of 3 is 33.33...%, must round down to 33, never up.
        assert_eq!(calculate_progress(1, 3).percent, 33);
    }

    #[test]
    fn completed_never_exceeds_total_in_percent() {
        let progress = calculate_progress(9, 5);
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn completed_never_exceeds_total_in_the_field_itself() {
        let progress = calculate_progress(9, 5);
        assert_eq!(progress.steps_completed, 5);
    }
}
