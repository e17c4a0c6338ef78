//! Effort figures: estimated hours vs. time actually logged.

use serde::{Deserialize, Serialize};
use trellis_core::{tree, Task};

/// Estimate vs. logged time across a forest.
///
/// Open time entries contribute nothing until closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffortSummary {
    /// Sum of task estimates, where present
    pub estimated_hours: f64,

    /// Sum of closed entry durations
    pub logged_minutes: u32,
}

impl EffortSummary {
    /// Logged time expressed in hours.
    pub fn logged_hours(&self) -> f64 {
        f64::from(self.logged_minutes) / 60.0
    }
}

/// Compute the effort summary for a whole forest.
pub(crate) fn compute(forest: &[Task]) -> EffortSummary {
    let mut summary = EffortSummary::default();
    tree::for_each(forest, &mut |task| {
        if let Some(hours) = task.estimated_hours {
            summary.estimated_hours += hours;
        }
        summary.logged_minutes += task
            .time_entries
            .iter()
            .map(|e| e.minutes)
            .sum::<u32>();
    });
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_hours_is_minutes_over_sixty() {
        let summary = EffortSummary {
            estimated_hours: 8.0,
            logged_minutes: 90,
        };
        assert!((summary.logged_hours() - 1.5).abs() < f64::EPSILON);
    }
}
