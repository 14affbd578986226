//! SLI, SLO, and burn-rate rule definitions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_alerts::Severity;

use crate::error::{Result, SloError};

/// Default compliance period for an objective: 30 days.
pub const DEFAULT_COMPLIANCE_PERIOD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A service-level indicator: the good/total event ratio for one service.
///
/// The query strings are opaque to this crate and resolved by the
/// configured `MetricSource`. They may contain the `{{window}}` token,
/// which the evaluator replaces with the window literal (`5m`, `1h`, ...)
/// of whatever window it is evaluating, so one definition serves the
/// short and long burn windows as well as the compliance period.
#[derive(Debug, Clone, PartialEq)]
pub struct SliDefinition {
    /// The service this indicator measures.
    pub service: String,
    /// Indicator name, unique per service.
    pub name: String,
    /// Query counting good events over a window.
    pub good_query: String,
    /// Query counting total events over a window.
    pub total_query: String,
    /// Default evaluation window.
    pub window: Duration,
}

impl SliDefinition {
    /// Creates a validated SLI definition.
    ///
    /// # Errors
    ///
    /// Returns `SloError::InvalidDefinition` if any field is empty or the
    /// window is zero.
    pub fn new(
        service: impl Into<String>,
        name: impl Into<String>,
        good_query: impl Into<String>,
        total_query: impl Into<String>,
        window: Duration,
    ) -> Result<Self> {
        let service = service.into();
        let name = name.into();
        let good_query = good_query.into();
        let total_query = total_query.into();

        if service.is_empty() {
            return Err(SloError::InvalidDefinition {
                reason: "service cannot be empty".to_string(),
            });
        }
        if name.is_empty() {
            return Err(SloError::InvalidDefinition {
                reason: "SLI name cannot be empty".to_string(),
            });
        }
        if good_query.is_empty() || total_query.is_empty() {
            return Err(SloError::InvalidDefinition {
                reason: format!("SLI {name} queries cannot be empty"),
            });
        }
        if window.is_zero() {
            return Err(SloError::InvalidDefinition {
                reason: format!("SLI {name} window must be positive"),
            });
        }

        Ok(Self {
            service,
            name,
            good_query,
            total_query,
            window,
        })
    }
}

/// A multi-window burn-rate alerting rule attached to an objective.
#[derive(Debug, Clone, PartialEq)]
pub struct BurnRateRule {
    /// Fast-reacting window.
    pub short_window: Duration,
    /// Confirmation window; must be longer than `short_window`.
    pub long_window: Duration,
    /// Burn-rate threshold both windows must exceed.
    pub factor: f64,
    /// Severity of the alert this rule raises.
    pub severity: Severity,
    /// How long the condition must hold before the alert fires.
    pub for_duration: Duration,
}

impl BurnRateRule {
    /// Creates a validated burn-rate rule with no hold duration.
    ///
    /// # Errors
    ///
    /// Returns `SloError::InvalidDefinition` if the windows are not
    /// ordered `0 < short < long` or the factor is not a positive finite
    /// number.
    pub fn new(
        short_window: Duration,
        long_window: Duration,
        factor: f64,
        severity: Severity,
    ) -> Result<Self> {
        if short_window.is_zero() {
            return Err(SloError::InvalidDefinition {
                reason: "short window must be positive".to_string(),
            });
        }
        if long_window <= short_window {
            return Err(SloError::InvalidDefinition {
                reason: format!(
                    "long window ({long_window:?}) must exceed short window ({short_window:?})"
                ),
            });
        }
        if !factor.is_finite() || factor <= 0.0 {
            return Err(SloError::InvalidDefinition {
                reason: format!("burn-rate factor must be positive, got {factor}"),
            });
        }

        Ok(Self {
            short_window,
            long_window,
            factor,
            severity,
            for_duration: Duration::ZERO,
        })
    }

    /// Sets how long the condition must hold before firing.
    #[must_use]
    pub const fn hold_for(mut self, for_duration: Duration) -> Self {
        self.for_duration = for_duration;
        self
    }

    /// The fast-burn page rule: 5m/1h windows at 14.4x.
    ///
    /// At 14.4x burn a 30-day budget is gone in about two days.
    #[must_use]
    pub fn fast_burn() -> Self {
        Self {
            short_window: Duration::from_secs(5 * 60),
            long_window: Duration::from_secs(60 * 60),
            factor: 14.4,
            severity: Severity::Critical,
            for_duration: Duration::ZERO,
        }
    }

    /// The slow-burn ticket rule: 30m/6h windows at 6x.
    #[must_use]
    pub fn slow_burn() -> Self {
        Self {
            short_window: Duration::from_secs(30 * 60),
            long_window: Duration::from_secs(6 * 60 * 60),
            factor: 6.0,
            severity: Severity::Warning,
            for_duration: Duration::ZERO,
        }
    }

    /// The standard multi-window rule pair.
    #[must_use]
    pub fn default_rules() -> Vec<Self> {
        vec![Self::fast_burn(), Self::slow_burn()]
    }
}

/// A service-level objective over one SLI.
#[derive(Debug, Clone, PartialEq)]
pub struct SloObjective {
    /// Objective name, used in alert labels.
    pub name: String,
    /// Name of the SLI this objective targets.
    pub sli: String,
    /// Target good-event ratio, exclusive on both ends: 0 < target < 1.
    pub target: f64,
    /// Rolling window the error budget is computed over.
    pub compliance_period: Duration,
    /// Burn-rate rules evaluated against this objective.
    pub burn_rules: Vec<BurnRateRule>,
}

impl SloObjective {
    /// Creates a new objective builder.
    pub fn builder(name: impl Into<String>, sli: impl Into<String>) -> SloObjectiveBuilder {
        SloObjectiveBuilder::new(name, sli)
    }

    /// The fraction of events the objective allows to fail.
    #[must_use]
    pub fn budget_fraction(&self) -> f64 {
        1.0 - self.target
    }
}

/// Builder for [`SloObjective`].
#[derive(Debug)]
pub struct SloObjectiveBuilder {
    name: String,
    sli: String,
    target: f64,
    compliance_period: Duration,
    burn_rules: Vec<BurnRateRule>,
}

impl SloObjectiveBuilder {
    fn new(name: impl Into<String>, sli: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sli: sli.into(),
            target: 0.999,
            compliance_period: DEFAULT_COMPLIANCE_PERIOD,
            burn_rules: Vec::new(),
        }
    }

    /// Sets the target ratio.
    #[must_use]
    pub const fn target(mut self, target: f64) -> Self {
        self.target = target;
        self
    }

    /// Sets the compliance period.
    #[must_use]
    pub const fn compliance_period(mut self, period: Duration) -> Self {
        self.compliance_period = period;
        self
    }

    /// Adds a burn-rate rule.
    #[must_use]
    pub fn rule(mut self, rule: BurnRateRule) -> Self {
        self.burn_rules.push(rule);
        self
    }

    /// Replaces the burn-rate rules.
    #[must_use]
    pub fn rules(mut self, rules: Vec<BurnRateRule>) -> Self {
        self.burn_rules = rules;
        self
    }

    /// Builds the objective.
    ///
    /// When no burn rules were added, the standard fast/slow pair is
    /// installed.
    ///
    /// # Errors
    ///
    /// Returns `SloError::InvalidDefinition` if the name or SLI reference
    /// is empty, the target is outside (0, 1), or the compliance period is
    /// zero.
    pub fn build(self) -> Result<SloObjective> {
        if self.name.is_empty() {
            return Err(SloError::InvalidDefinition {
                reason: "objective name cannot be empty".to_string(),
            });
        }
        if self.sli.is_empty() {
            return Err(SloError::InvalidDefinition {
                reason: format!("objective {} must reference an SLI", self.name),
            });
        }
        if !self.target.is_finite() || self.target <= 0.0 || self.target >= 1.0 {
            return Err(SloError::InvalidDefinition {
                reason: format!(
                    "objective {} target must be within (0, 1), got {}",
                    self.name, self.target
                ),
            });
        }
        if self.compliance_period.is_zero() {
            return Err(SloError::InvalidDefinition {
                reason: format!("objective {} compliance period must be positive", self.name),
            });
        }

        let burn_rules = if self.burn_rules.is_empty() {
            BurnRateRule::default_rules()
        } else {
            self.burn_rules
        };

        Ok(SloObjective {
            name: self.name,
            sli: self.sli,
            target: self.target,
            compliance_period: self.compliance_period,
            burn_rules,
        })
    }
}

/// Good/total event counts observed over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliSample {
    /// The end of the window the counts cover.
    pub at: DateTime<Utc>,
    /// Good events in the window.
    pub good: f64,
    /// Total events in the window.
    pub total: f64,
}

impl SliSample {
    /// Creates a sample.
    #[must_use]
    pub const fn new(at: DateTime<Utc>, good: f64, total: f64) -> Self {
        Self { at, good, total }
    }

    /// The good-event ratio, clamped to [0, 1] against counter jitter.
    ///
    /// Returns `None` when the window saw no events.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        if self.total <= 0.0 {
            None
        } else {
            Some((self.good / self.total).clamp(0.0, 1.0))
        }
    }

    /// The bad-event count, never negative.
    #[must_use]
    pub fn bad(&self) -> f64 {
        (self.total - self.good).max(0.0)
    }
}

/// The state of an objective's error budget, derived each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorBudget {
    /// Bad events the objective tolerates over the period.
    pub allowed_bad_events: f64,
    /// Bad events observed so far.
    pub consumed_bad_events: f64,
    /// Total events observed over the period.
    pub total_events: f64,
    /// Fraction of the budget still available, in [0, 1].
    pub remaining_ratio: f64,
    /// Consumption rate over the period; 1.0 spends the budget exactly.
    pub burn_rate: f64,
}

impl ErrorBudget {
    /// Whether the budget is spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining_ratio <= 0.0
    }
}
