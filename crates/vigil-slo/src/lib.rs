//! SLI evaluation, error budgets, and burn-rate alerting rules.
//!
//! The evaluation pipeline for one objective each tick: query the SLI's
//! good/total ratio over each burn window, compute burn rates against the
//! objective's target, and decide per rule whether its condition holds.
//! Budget state is derived separately over the whole compliance period.
//!
//! # Example
//!
//! ```
//! use vigil_slo::{BurnRateEvaluator, BurnRateRule};
//!
//! let rule = BurnRateRule::fast_burn();
//! let target = 0.999;
//!
//! // 2% of requests failing in both windows: 20x burn, well past 14.4.
//! let decision = BurnRateEvaluator::evaluate(&rule, target, Some(0.98), Some(0.98));
//! assert!(decision.fire);
//!
//! // The hour-long window disagrees, so this was only a spike.
//! let decision = BurnRateEvaluator::evaluate(&rule, target, Some(0.98), Some(0.9995));
//! assert!(!decision.fire);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod budget;
pub mod burn;
pub mod error;
pub mod sli;
pub mod types;

pub use budget::BudgetTracker;
pub use burn::{burn_rate, BurnDecision, BurnRateEvaluator};
pub use error::{Result, SloError};
pub use sli::{expand_window, window_literal, SliEvaluator, WINDOW_TOKEN};
pub use types::{
    BurnRateRule, ErrorBudget, SliDefinition, SliSample, SloObjective, SloObjectiveBuilder,
    DEFAULT_COMPLIANCE_PERIOD,
};
