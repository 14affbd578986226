//! Inhibition rules and the pre-notification suppression filter.
//!
//! Inhibition drops an alert when a "bigger" alert about the same failure
//! is already firing, e.g. a critical burn-rate alert suppresses its
//! warning-severity counterpart for the same service. Silences and
//! inhibition are independent mechanisms; both run here, just before
//! notification, and neither touches alert lifecycle state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::matcher::{compile_all, matches_all, CompiledMatcher, Matcher};
use crate::silence::SilenceStore;
use crate::types::Alert;

/// A rule suppressing target alerts while a matching source alert fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InhibitRule {
    /// Matchers selecting the suppressing (source) alerts.
    pub source_matchers: Vec<Matcher>,
    /// Matchers selecting the suppressed (target) alerts.
    pub target_matchers: Vec<Matcher>,
    /// Label names whose values must coincide between source and target.
    #[serde(default)]
    pub equal: Vec<String>,
}

impl InhibitRule {
    /// Compiles the rule's matchers for evaluation.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidMatcher` if any matcher fails to
    /// compile.
    pub fn compile(&self) -> Result<CompiledInhibitRule> {
        Ok(CompiledInhibitRule {
            source: compile_all(&self.source_matchers)?,
            target: compile_all(&self.target_matchers)?,
            equal: self.equal.clone(),
        })
    }
}

/// An inhibition rule with compiled matchers.
#[derive(Debug, Clone)]
pub struct CompiledInhibitRule {
    source: Vec<CompiledMatcher>,
    target: Vec<CompiledMatcher>,
    equal: Vec<String>,
}

impl CompiledInhibitRule {
    /// Tests whether a label set matches the source side.
    #[must_use]
    pub fn source_matches(&self, labels: &HashMap<String, String>) -> bool {
        matches_all(&self.source, labels)
    }

    /// Tests whether a label set matches the target side.
    #[must_use]
    pub fn target_matches(&self, labels: &HashMap<String, String>) -> bool {
        matches_all(&self.target, labels)
    }

    /// Tests whether source and target agree on all `equal` labels.
    ///
    /// A label absent from both sides counts as agreeing.
    #[must_use]
    pub fn labels_agree(
        &self,
        source: &HashMap<String, String>,
        target: &HashMap<String, String>,
    ) -> bool {
        self.equal.iter().all(|name| source.get(name) == target.get(name))
    }
}

/// Compiles a list of inhibition rules, failing on the first invalid one.
///
/// # Errors
///
/// Returns `AlertError::InvalidMatcher` for the first rule whose matchers
/// fail to compile.
pub fn compile_rules(rules: &[InhibitRule]) -> Result<Vec<CompiledInhibitRule>> {
    rules.iter().map(InhibitRule::compile).collect()
}

/// Applies silences then inhibition to notification candidates.
///
/// Returns the candidates that survive both filters. An alert never
/// inhibits itself, even when it matches a rule's source and target
/// matchers simultaneously.
#[must_use]
pub fn filter_notifiable(
    candidates: Vec<Alert>,
    firing: &[Alert],
    silences: &SilenceStore,
    rules: &[CompiledInhibitRule],
    now: DateTime<Utc>,
) -> Vec<Alert> {
    candidates
        .into_iter()
        .filter(|candidate| {
            if let Some(silence_id) = silences.suppressing(&candidate.labels, now) {
                debug!(
                    fingerprint = %candidate.fingerprint,
                    alertname = %candidate.name(),
                    silence_id = %silence_id,
                    "alert silenced"
                );
                return false;
            }

            let inhibited = rules.iter().any(|rule| {
                rule.target_matches(&candidate.labels)
                    && firing.iter().any(|source| {
                        source.fingerprint != candidate.fingerprint
                            && rule.source_matches(&source.labels)
                            && rule.labels_agree(&source.labels, &candidate.labels)
                    })
            });
            if inhibited {
                debug!(
                    fingerprint = %candidate.fingerprint,
                    alertname = %candidate.name(),
                    "alert inhibited"
                );
                return false;
            }

            true
        })
        .collect()
}
