//! The metric source boundary and an in-memory reference implementation.
//!
//! The evaluation engine depends only on [`MetricSource`]; any time-series
//! backend implementing it is interchangeable. [`InMemoryMetricSource`]
//! backs tests and local runs without an external store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{QueryError, Result};
use crate::types::Sample;

/// A queryable source of scalar metrics.
///
/// Query expressions are opaque strings resolved by the implementation.
/// `query` evaluates an expression to a single scalar as of `at`;
/// `query_range` evaluates it at each `step` boundary across a window.
pub trait MetricSource: Send + Sync {
    /// Evaluates `expr` to a scalar as of `at`.
    fn query(&self, expr: &str, at: DateTime<Utc>) -> Result<f64>;

    /// Evaluates `expr` at each `step` boundary in `[start, end]`.
    fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Sample>>;
}

/// In-memory metric source backed by per-series sample vectors.
///
/// Expressions take the form `series` (latest value at or before the query
/// instant) or `series[window]` (sum of values recorded in
/// `(at - window, at]`, the shape counter-increase queries take). Absent
/// series read as `0.0`. The series key is matched verbatim, so keys may
/// carry label selectors, e.g. `http_requests_total{code="5xx"}[5m]`.
#[derive(Debug)]
pub struct InMemoryMetricSource {
    series: Arc<RwLock<HashMap<String, Vec<Sample>>>>,
    outage: Arc<RwLock<Option<String>>>,
}

impl InMemoryMetricSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            series: Arc::new(RwLock::new(HashMap::new())),
            outage: Arc::new(RwLock::new(None)),
        }
    }

    /// Records a sample for a series, keeping the series timestamp-ordered.
    pub fn record(&self, series: &str, sample: Sample) {
        let mut data = self.series.write();
        let samples = data.entry(series.to_string()).or_default();

        let insert_pos = samples
            .binary_search_by_key(&sample.at, |s| s.at)
            .unwrap_or_else(|pos| pos);
        samples.insert(insert_pos, sample);

        debug!(series = %series, samples = samples.len(), "recorded sample");
    }

    /// Simulates a source outage: every query fails until [`Self::recover`].
    pub fn fail_with(&self, reason: &str) {
        *self.outage.write() = Some(reason.to_string());
    }

    /// Clears a simulated outage.
    pub fn recover(&self) {
        *self.outage.write() = None;
    }

    /// Removes all recorded samples.
    pub fn clear(&self) {
        self.series.write().clear();
    }

    /// Returns the number of samples recorded for a series.
    #[must_use]
    pub fn sample_count(&self, series: &str) -> usize {
        self.series.read().get(series).map_or(0, Vec::len)
    }

    fn check_outage(&self) -> Result<()> {
        match self.outage.read().as_ref() {
            Some(reason) => Err(QueryError::Unreachable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn eval(&self, expr: &str, at: DateTime<Utc>) -> Result<f64> {
        let data = self.series.read();
        match split_window(expr)? {
            Some((key, window)) => {
                let from = at - window;
                let sum = data
                    .get(key)
                    .map(|samples| {
                        samples
                            .iter()
                            .filter(|s| s.at > from && s.at <= at)
                            .map(|s| s.value)
                            .sum()
                    })
                    .unwrap_or(0.0);
                Ok(sum)
            }
            None => {
                let last = data.get(expr).and_then(|samples| {
                    samples.iter().rev().find(|s| s.at <= at).map(|s| s.value)
                });
                Ok(last.unwrap_or(0.0))
            }
        }
    }
}

impl MetricSource for InMemoryMetricSource {
    fn query(&self, expr: &str, at: DateTime<Utc>) -> Result<f64> {
        self.check_outage()?;
        self.eval(expr, at)
    }

    fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<Vec<Sample>> {
        self.check_outage()?;

        if start > end {
            return Err(QueryError::BadExpression {
                expr: expr.to_string(),
                reason: "range start is after end".to_string(),
            });
        }
        let step = chrono::Duration::from_std(step).map_err(|_| QueryError::BadExpression {
            expr: expr.to_string(),
            reason: "step out of range".to_string(),
        })?;
        if step.is_zero() {
            return Err(QueryError::BadExpression {
                expr: expr.to_string(),
                reason: "step must be positive".to_string(),
            });
        }

        let mut samples = Vec::new();
        let mut at = start;
        while at <= end {
            samples.push(Sample::new(at, self.eval(expr, at)?));
            at += step;
        }
        Ok(samples)
    }
}

impl Clone for InMemoryMetricSource {
    fn clone(&self) -> Self {
        Self {
            series: Arc::clone(&self.series),
            outage: Arc::clone(&self.outage),
        }
    }
}

impl Default for InMemoryMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `series[window]` into its key and parsed window.
///
/// Returns `None` for instant expressions (no trailing `]`).
fn split_window(expr: &str) -> Result<Option<(&str, chrono::Duration)>> {
    if !expr.ends_with(']') {
        return Ok(None);
    }
    let open = expr.rfind('[').ok_or_else(|| QueryError::BadExpression {
        expr: expr.to_string(),
        reason: "unmatched ']'".to_string(),
    })?;
    let literal = &expr[open + 1..expr.len() - 1];
    let seconds = parse_window_seconds(literal).ok_or_else(|| QueryError::BadExpression {
        expr: expr.to_string(),
        reason: format!("invalid window {literal:?}"),
    })?;
    Ok(Some((&expr[..open], chrono::Duration::seconds(seconds))))
}

/// Parses a window literal like `30s`, `5m`, `1h`, or `30d` into seconds.
fn parse_window_seconds(literal: &str) -> Option<i64> {
    if literal.len() < 2 {
        return None;
    }
    let (digits, unit) = literal.split_at(literal.len() - 1);
    let count: i64 = digits.parse().ok()?;
    if count <= 0 {
        return None;
    }
    let unit_seconds = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return None,
    };
    Some(count * unit_seconds)
}
