//! Multi-window burn-rate evaluation.
//!
//! A burn rate of 1.0 means the service is failing at exactly the rate
//! its objective tolerates; 14.4 means a 30-day budget is gone in about
//! two days. A rule fires only when both its short and long windows
//! exceed the threshold: the long window proves the problem is real, the
//! short window proves it is still happening, so alerts both trigger and
//! clear quickly without flapping on brief spikes.

use crate::types::BurnRateRule;

/// How fast the error budget is being consumed relative to the target.
///
/// `(1 - observed) / (1 - target)`. A target at or above 1 leaves no
/// tolerable failure rate, so any observation burns infinitely fast;
/// validation rejects such targets before they get here.
#[must_use]
pub fn burn_rate(observed_ratio: f64, target: f64) -> f64 {
    let budget_fraction = 1.0 - target;
    if budget_fraction <= 0.0 {
        return f64::INFINITY;
    }
    ((1.0 - observed_ratio) / budget_fraction).max(0.0)
}

/// The outcome of evaluating one burn-rate rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnDecision {
    /// Whether the rule's condition holds.
    pub fire: bool,
    /// The short-window burn rate, the number worth paging on.
    pub value: f64,
}

/// Evaluates burn-rate rules over short/long window ratio pairs.
#[derive(Debug, Clone, Copy)]
pub struct BurnRateEvaluator;

impl BurnRateEvaluator {
    /// Decides whether a rule fires given both window ratios.
    ///
    /// A `None` ratio means the window had insufficient data; the rule
    /// then does not fire. Both windows must exceed the rule's factor.
    #[must_use]
    pub fn evaluate(
        rule: &BurnRateRule,
        target: f64,
        short_ratio: Option<f64>,
        long_ratio: Option<f64>,
    ) -> BurnDecision {
        let (Some(short), Some(long)) = (short_ratio, long_ratio) else {
            return BurnDecision {
                fire: false,
                value: 0.0,
            };
        };

        let short_burn = burn_rate(short, target);
        let long_burn = burn_rate(long, target);
        BurnDecision {
            fire: short_burn > rule.factor && long_burn > rule.factor,
            value: short_burn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The observed ratio that burns at `multiple` times the budget rate.
    fn ratio_burning_at(multiple: f64, target: f64) -> f64 {
        1.0 - multiple * (1.0 - target)
    }

    mod burn_rate_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(1.0, 0.999, 0.0; "perfect service burns nothing")]
        #[test_case(0.999, 0.999, 1.0; "failing exactly at target burns at one")]
        #[test_case(0.9856, 0.999, 14.4; "page threshold")]
        #[test_case(0.0, 0.999, 1000.0; "total outage burns the full inverse")]
        fn burn_rate_formula(observed: f64, target: f64, expected: f64) {
            assert!((burn_rate(observed, target) - expected).abs() < 1e-6);
        }

        #[test]
        fn ratio_above_one_burns_nothing() {
            assert!(burn_rate(1.2, 0.999).abs() < f64::EPSILON);
        }

        #[test]
        fn degenerate_target_burns_infinitely() {
            assert!(burn_rate(0.9999, 1.0).is_infinite());
        }
    }

    mod decision_tests {
        use super::*;
        use test_case::test_case;

        const TARGET: f64 = 0.999;

        #[test]
        fn both_windows_over_threshold_fires() {
            let rule = BurnRateRule::fast_burn();
            let short = ratio_burning_at(20.0, TARGET);
            let long = ratio_burning_at(16.0, TARGET);

            let decision = BurnRateEvaluator::evaluate(&rule, TARGET, Some(short), Some(long));
            assert!(decision.fire);
            assert!((decision.value - 20.0).abs() < 1e-9);
        }

        #[test]
        fn long_window_below_threshold_blocks_firing() {
            // Short window burns at 20x but the hour only at 2x: a spike,
            // not a sustained burn.
            let rule = BurnRateRule::fast_burn();
            let short = ratio_burning_at(20.0, TARGET);
            let long = ratio_burning_at(2.0, TARGET);

            let decision = BurnRateEvaluator::evaluate(&rule, TARGET, Some(short), Some(long));
            assert!(!decision.fire);
            assert!((decision.value - 20.0).abs() < 1e-9);
        }

        #[test]
        fn short_window_below_threshold_blocks_firing() {
            // Problem already over: long window still elevated, short clean.
            let rule = BurnRateRule::fast_burn();
            let short = ratio_burning_at(1.0, TARGET);
            let long = ratio_burning_at(16.0, TARGET);

            let decision = BurnRateEvaluator::evaluate(&rule, TARGET, Some(short), Some(long));
            assert!(!decision.fire);
        }

        #[test]
        fn burn_just_below_factor_does_not_fire() {
            let rule = BurnRateRule::fast_burn();
            let below = ratio_burning_at(14.0, TARGET);

            let decision = BurnRateEvaluator::evaluate(&rule, TARGET, Some(below), Some(below));
            assert!(!decision.fire);
        }

        #[test_case(None, Some(0.9); "short missing")]
        #[test_case(Some(0.9), None; "long missing")]
        #[test_case(None, None; "both missing")]
        fn insufficient_data_never_fires(short: Option<f64>, long: Option<f64>) {
            let rule = BurnRateRule::fast_burn();
            let decision = BurnRateEvaluator::evaluate(&rule, TARGET, short, long);
            assert!(!decision.fire);
            assert!(decision.value.abs() < f64::EPSILON);
        }

        #[test]
        fn slow_burn_rule_uses_its_own_factor() {
            let rule = BurnRateRule::slow_burn();
            let at_eight = ratio_burning_at(8.0, TARGET);

            let decision = BurnRateEvaluator::evaluate(&rule, TARGET, Some(at_eight), Some(at_eight));
            assert!(decision.fire);

            let at_five = ratio_burning_at(5.0, TARGET);
            let decision = BurnRateEvaluator::evaluate(&rule, TARGET, Some(at_five), Some(at_five));
            assert!(!decision.fire);
        }
    }
}
