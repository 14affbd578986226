//! Validation of the parsed document into its runtime form.

use std::collections::{HashMap, HashSet};

use tracing::info;

use vigil_alerts::{compile_rules, CompiledInhibitRule};
use vigil_notify::Receiver;
use vigil_routing::RouteTree;
use vigil_slo::{BurnRateRule, SliDefinition, SloObjective};

use crate::error::{ConfigError, Result};
use crate::schema::{ConfigDocument, EngineConfig};

/// A fully validated configuration, ready for the engine.
///
/// Produced by [`ConfigDocument::validate`]. Compilation is
/// all-or-nothing; on any error the currently installed configuration
/// is left untouched.
#[derive(Debug)]
pub struct CompiledConfig {
    /// SLI definitions by name.
    pub slis: HashMap<String, SliDefinition>,
    /// Validated objectives, in document order.
    pub objectives: Vec<SloObjective>,
    /// The compiled routing tree.
    pub route: RouteTree,
    /// Compiled inhibition rules.
    pub inhibit_rules: Vec<CompiledInhibitRule>,
    /// Built receivers by name.
    pub receivers: HashMap<String, Receiver>,
    /// Engine loop settings.
    pub engine: EngineConfig,
}

impl CompiledConfig {
    /// Looks up the SLI definition an objective references.
    ///
    /// Validation guarantees the reference resolves, so `None` only
    /// means the objective belongs to a different snapshot.
    #[must_use]
    pub fn sli_for(&self, objective: &SloObjective) -> Option<&SliDefinition> {
        self.slis.get(&objective.sli)
    }
}

impl ConfigDocument {
    /// Validates the document and compiles it into runtime form.
    pub fn validate(&self) -> Result<CompiledConfig> {
        let receivers = self.build_receivers()?;
        let slis = self.build_slis()?;
        let objectives = self.build_objectives(&slis)?;

        let known: HashSet<String> = receivers.keys().cloned().collect();
        let route = RouteTree::compile(&self.route.to_route(), &known)?;
        let inhibit_rules = compile_rules(&self.inhibit_rules)?;
        let engine = self.validated_engine()?;

        info!(
            slis = slis.len(),
            slos = objectives.len(),
            receivers = receivers.len(),
            inhibit_rules = inhibit_rules.len(),
            "config validated"
        );

        Ok(CompiledConfig {
            slis,
            objectives,
            route,
            inhibit_rules,
            receivers,
            engine,
        })
    }

    fn build_receivers(&self) -> Result<HashMap<String, Receiver>> {
        let mut receivers = HashMap::with_capacity(self.receivers.len());
        for config in &self.receivers {
            let receiver = config.build()?;
            if receivers.insert(config.name.clone(), receiver).is_some() {
                return Err(ConfigError::DuplicateReceiver {
                    name: config.name.clone(),
                });
            }
        }
        Ok(receivers)
    }

    fn build_slis(&self) -> Result<HashMap<String, SliDefinition>> {
        let mut slis = HashMap::with_capacity(self.slis.len());
        for config in &self.slis {
            let sli = SliDefinition::new(
                &config.service,
                &config.name,
                &config.good_query,
                &config.total_query,
                config.window,
            )
            .map_err(|e| ConfigError::InvalidSli {
                name: config.name.clone(),
                reason: e.to_string(),
            })?;
            if slis.insert(config.name.clone(), sli).is_some() {
                return Err(ConfigError::DuplicateSli {
                    name: config.name.clone(),
                });
            }
        }
        Ok(slis)
    }

    fn build_objectives(
        &self,
        slis: &HashMap<String, SliDefinition>,
    ) -> Result<Vec<SloObjective>> {
        let mut seen = HashSet::with_capacity(self.slos.len());
        let mut objectives = Vec::with_capacity(self.slos.len());

        for config in &self.slos {
            if !seen.insert(config.name.clone()) {
                return Err(ConfigError::DuplicateSlo {
                    name: config.name.clone(),
                });
            }
            if !slis.contains_key(&config.sli) {
                return Err(ConfigError::UnknownSli {
                    slo: config.name.clone(),
                    sli: config.sli.clone(),
                });
            }

            let invalid = |e: vigil_slo::SloError| ConfigError::InvalidSlo {
                name: config.name.clone(),
                reason: e.to_string(),
            };

            let mut rules = Vec::with_capacity(config.burn_rules.len());
            for rule in &config.burn_rules {
                let mut compiled = BurnRateRule::new(
                    rule.short_window,
                    rule.long_window,
                    rule.factor,
                    rule.severity,
                )
                .map_err(invalid)?;
                if let Some(hold) = rule.hold_for {
                    compiled = compiled.hold_for(hold);
                }
                rules.push(compiled);
            }

            let objective = SloObjective::builder(&config.name, &config.sli)
                .target(config.target)
                .compliance_period(config.compliance_period)
                .rules(rules)
                .build()
                .map_err(invalid)?;
            objectives.push(objective);
        }
        Ok(objectives)
    }

    fn validated_engine(&self) -> Result<EngineConfig> {
        let engine = self.engine.clone();
        if engine.tick_interval.is_zero() {
            return Err(ConfigError::InvalidEngine {
                reason: "tick_interval must be positive".to_string(),
            });
        }
        if engine.max_concurrent_evaluations == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "max_concurrent_evaluations must be at least 1".to_string(),
            });
        }
        if engine.query_timeout.is_zero() {
            return Err(ConfigError::InvalidEngine {
                reason: "query_timeout must be positive".to_string(),
            });
        }
        Ok(engine)
    }
}
