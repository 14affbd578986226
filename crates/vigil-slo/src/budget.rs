//! Error budget tracking in event counts.
//!
//! Budgets are computed from raw good/total event counts, never from
//! averaged ratios: averaging window ratios weights a quiet minute the
//! same as a busy one and misstates the budget. With counts, an objective
//! allowing 0.1% failures over 1M events has a budget of exactly 1000 bad
//! events regardless of how traffic was distributed.

use tracing::debug;

use crate::types::{ErrorBudget, SliSample, SloObjective};

/// Derives error budget state from observed event counts.
#[derive(Debug, Clone, Copy)]
pub struct BudgetTracker;

impl BudgetTracker {
    /// Computes the budget for an objective from period samples.
    ///
    /// Callers typically pass a single sample covering the whole
    /// compliance period; bucketed series from `query_range` work the
    /// same way since the math only sums counts.
    ///
    /// A period with no events has no budget to spend: `remaining_ratio`
    /// is reported as 0 so a silent service is never read as healthy.
    #[must_use]
    pub fn track(objective: &SloObjective, samples: &[SliSample]) -> ErrorBudget {
        let total_events: f64 = samples.iter().map(|s| s.total.max(0.0)).sum();
        let consumed_bad_events: f64 = samples.iter().map(SliSample::bad).sum();
        let allowed_bad_events = objective.budget_fraction() * total_events;

        let budget = if allowed_bad_events <= 0.0 {
            ErrorBudget {
                allowed_bad_events: 0.0,
                consumed_bad_events,
                total_events,
                remaining_ratio: 0.0,
                burn_rate: 0.0,
            }
        } else {
            // Over the whole period the burn rate and the consumed
            // fraction coincide: burning at exactly 1.0 spends the budget.
            let burn_rate = consumed_bad_events / allowed_bad_events;
            ErrorBudget {
                allowed_bad_events,
                consumed_bad_events,
                total_events,
                remaining_ratio: (1.0 - burn_rate).max(0.0),
                burn_rate,
            }
        };

        debug!(
            objective = %objective.name,
            allowed = %budget.allowed_bad_events,
            consumed = %budget.consumed_bad_events,
            remaining = %budget.remaining_ratio,
            "tracked error budget"
        );
        budget
    }
}
