//! SLI evaluation against a metric source.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use vigil_metrics::MetricSource;

use crate::error::{Result, SloError};
use crate::types::{SliDefinition, SliSample};

/// The token in SLI queries replaced with the evaluation window literal.
pub const WINDOW_TOKEN: &str = "{{window}}";

/// Renders a window as the literal used in queries: `30s`, `5m`, `1h`, `30d`.
///
/// The largest unit that divides the window evenly is chosen.
#[must_use]
pub fn window_literal(window: Duration) -> String {
    let secs = window.as_secs();
    if secs >= 86_400 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs >= 3_600 && secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Substitutes the window token in a query expression.
#[must_use]
pub fn expand_window(expr: &str, window: Duration) -> String {
    expr.replace(WINDOW_TOKEN, &window_literal(window))
}

/// Evaluates SLI ratios by issuing good/total query pairs.
#[derive(Debug, Clone, Copy)]
pub struct SliEvaluator;

impl SliEvaluator {
    /// Evaluates the SLI over its own default window ending at `at`.
    ///
    /// # Errors
    ///
    /// Returns `SloError::InsufficientData` if the window saw no events,
    /// or `SloError::Query` if either query failed.
    pub fn evaluate(source: &dyn MetricSource, sli: &SliDefinition, at: DateTime<Utc>) -> Result<f64> {
        Self::evaluate_window(source, sli, sli.window, at)
    }

    /// Evaluates the SLI over an explicit window ending at `at`.
    ///
    /// Burn-rate rules call this with their short and long windows; the
    /// same definition answers all of them through window substitution.
    ///
    /// # Errors
    ///
    /// Returns `SloError::InsufficientData` if the window saw no events,
    /// or `SloError::Query` if either query failed.
    pub fn evaluate_window(
        source: &dyn MetricSource,
        sli: &SliDefinition,
        window: Duration,
        at: DateTime<Utc>,
    ) -> Result<f64> {
        let sample = Self::counts(source, sli, window, at)?;
        sample.ratio().ok_or_else(|| SloError::InsufficientData {
            sli: sli.name.clone(),
        })
    }

    /// Queries raw good/total counts over a window ending at `at`.
    ///
    /// Budget tracking uses this directly: it needs event counts, not the
    /// derived ratio.
    ///
    /// # Errors
    ///
    /// Returns `SloError::Query` if either query failed.
    pub fn counts(
        source: &dyn MetricSource,
        sli: &SliDefinition,
        window: Duration,
        at: DateTime<Utc>,
    ) -> Result<SliSample> {
        let good = source.query(&expand_window(&sli.good_query, window), at)?;
        let total = source.query(&expand_window(&sli.total_query, window), at)?;

        debug!(
            service = %sli.service,
            sli = %sli.name,
            window = %window_literal(window),
            good = %good,
            total = %total,
            "evaluated SLI counts"
        );
        Ok(SliSample::new(at, good, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vigil_metrics::{InMemoryMetricSource, QueryError, Sample};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().unwrap()
    }

    fn availability_sli() -> SliDefinition {
        SliDefinition::new(
            "checkout",
            "availability",
            "good_events[{{window}}]",
            "total_events[{{window}}]",
            Duration::from_secs(300),
        )
        .unwrap()
    }

    /// Seeds per-minute samples so any window up to `minutes` has data.
    fn seeded_source(minutes: i64, good_per_minute: f64, total_per_minute: f64) -> InMemoryMetricSource {
        let source = InMemoryMetricSource::new();
        for minute in 0..minutes {
            let at = t0() - chrono::Duration::minutes(minute);
            source.record("good_events", Sample::new(at, good_per_minute));
            source.record("total_events", Sample::new(at, total_per_minute));
        }
        source
    }

    mod window_rendering_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(30, "30s"; "seconds")]
        #[test_case(90, "90s"; "uneven seconds stay seconds")]
        #[test_case(300, "5m"; "minutes")]
        #[test_case(3600, "1h"; "hours")]
        #[test_case(21_600, "6h"; "six hours")]
        #[test_case(86_400, "1d"; "one day")]
        #[test_case(2_592_000, "30d"; "thirty days")]
        fn renders_largest_even_unit(secs: u64, expected: &str) {
            assert_eq!(window_literal(Duration::from_secs(secs)), expected);
        }

        #[test]
        fn expand_replaces_every_token() {
            let expanded = expand_window(
                "rate(good[{{window}}]) / rate(total[{{window}}])",
                Duration::from_secs(300),
            );
            assert_eq!(expanded, "rate(good[5m]) / rate(total[5m])");
        }

        #[test]
        fn expand_leaves_tokenless_queries_alone() {
            assert_eq!(
                expand_window("up{job=\"api\"}", Duration::from_secs(300)),
                "up{job=\"api\"}"
            );
        }
    }

    mod evaluation_tests {
        use super::*;

        #[test]
        fn healthy_service_evaluates_to_its_ratio() {
            let source = seeded_source(10, 99.0, 100.0);
            let ratio = SliEvaluator::evaluate(&source, &availability_sli(), t0()).unwrap();
            assert!((ratio - 0.99).abs() < 1e-9);
        }

        #[test]
        fn explicit_window_overrides_the_default() {
            // Healthy hour except for the most recent 5 minutes.
            let source = InMemoryMetricSource::new();
            for minute in 0..60 {
                let at = t0() - chrono::Duration::minutes(minute);
                let good = if minute < 5 { 50.0 } else { 100.0 };
                source.record("good_events", Sample::new(at, good));
                source.record("total_events", Sample::new(at, 100.0));
            }

            let short =
                SliEvaluator::evaluate_window(&source, &availability_sli(), Duration::from_secs(300), t0())
                    .unwrap();
            let long =
                SliEvaluator::evaluate_window(&source, &availability_sli(), Duration::from_secs(3600), t0())
                    .unwrap();

            assert!((short - 0.5).abs() < 1e-9);
            // 55 healthy minutes dilute the long window.
            assert!(long > 0.9);
        }

        #[test]
        fn zero_total_is_insufficient_data() {
            let source = InMemoryMetricSource::new();
            let err = SliEvaluator::evaluate(&source, &availability_sli(), t0()).unwrap_err();
            assert!(matches!(err, SloError::InsufficientData { .. }));
        }

        #[test]
        fn query_failure_propagates_as_query_error() {
            let source = seeded_source(10, 99.0, 100.0);
            source.fail_with("connection refused");

            let err = SliEvaluator::evaluate(&source, &availability_sli(), t0()).unwrap_err();
            assert!(matches!(err, SloError::Query(QueryError::Unreachable { .. })));
        }

        #[test]
        fn counter_jitter_clamps_to_one() {
            let source = seeded_source(10, 101.0, 100.0);
            let ratio = SliEvaluator::evaluate(&source, &availability_sli(), t0()).unwrap();
            assert!((ratio - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn counts_returns_raw_events() {
            let source = seeded_source(10, 99.0, 100.0);
            let sample =
                SliEvaluator::counts(&source, &availability_sli(), Duration::from_secs(300), t0())
                    .unwrap();
            assert!((sample.good - 495.0).abs() < 1e-9);
            assert!((sample.total - 500.0).abs() < 1e-9);
            assert_eq!(sample.at, t0());
        }
    }
}
