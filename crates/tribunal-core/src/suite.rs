//! Suite definitions, assembled through builders before a run starts.
//!
//! A [`SuiteDefinition`] is only obtainable from [`SuiteBuilder::build`], so
//! every value the runner sees has already passed validation.

use crate::errors::ConfigError;
use crate::judge::is_reserved_name;
use crate::model::{Candidate, Scenario, MAX_SCORE, MAX_TEMPERATURE, MIN_SCORE, MIN_TEMPERATURE};
use crate::rubric::RubricRegistry;
use crate::variants::VariantConfig;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct SuiteDefinition {
    candidates: Vec<Candidate>,
    scenarios: Vec<Scenario>,
    variants: VariantConfig,
    temperatures: Vec<Option<f64>>,
    threshold: Option<f64>,
}

impl SuiteDefinition {
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn variants(&self) -> &VariantConfig {
        &self.variants
    }

    /// Never empty; `None` entries mean "provider default".
    pub fn temperatures(&self) -> &[Option<f64>] {
        &self.temperatures
    }

    /// Suite-wide pass mark, used when a scenario does not set its own.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    pub fn threshold_for(&self, scenario: &Scenario) -> Option<f64> {
        scenario.threshold.or(self.threshold)
    }
}

/// A scenario whose rubric references are still unresolved.
#[derive(Debug, Clone, Default)]
pub struct ScenarioBuilder {
    name: String,
    prompt: String,
    system_prompt: Option<String>,
    context: Option<String>,
    criteria: Vec<String>,
    rubrics: Vec<String>,
    threshold: Option<f64>,
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn criterion(mut self, criterion: impl Into<String>) -> Self {
        self.criteria.push(criterion.into());
        self
    }

    pub fn criteria<I, S>(mut self, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.extend(criteria.into_iter().map(Into::into));
        self
    }

    /// Rubric criteria are appended after the inline ones, in reference order.
    pub fn rubric(mut self, name: impl Into<String>) -> Self {
        self.rubrics.push(name.into());
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    fn resolve(self, registry: &RubricRegistry) -> Result<Scenario, ConfigError> {
        let mut criteria = self.criteria;
        for rubric in &self.rubrics {
            criteria.extend(registry.resolve(rubric)?.iter().cloned());
        }
        Ok(Scenario {
            name: self.name,
            prompt: self.prompt,
            system_prompt: self.system_prompt,
            context: self.context,
            criteria,
            threshold: self.threshold,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SuiteBuilder {
    registry: RubricRegistry,
    candidates: Vec<Candidate>,
    scenarios: Vec<ScenarioBuilder>,
    variants: VariantConfig,
    temperatures: Vec<Option<f64>>,
    threshold: Option<f64>,
}

impl SuiteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rubrics(mut self, registry: RubricRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn candidate(mut self, candidate: Candidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn scenario(mut self, scenario: ScenarioBuilder) -> Self {
        self.scenarios.push(scenario);
        self
    }

    pub fn variants(mut self, variants: VariantConfig) -> Self {
        self.variants = variants;
        self
    }

    pub fn temperatures<I>(mut self, temperatures: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        self.temperatures = temperatures.into_iter().collect();
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn build(self) -> Result<SuiteDefinition, ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        if self.scenarios.is_empty() {
            return Err(ConfigError::NoScenarios);
        }

        let mut names = HashSet::new();
        for c in &self.candidates {
            if is_reserved_name(&c.name) {
                return Err(ConfigError::ReservedCandidateName {
                    name: c.name.clone(),
                });
            }
            if !names.insert(c.name.as_str()) {
                return Err(ConfigError::DuplicateCandidate {
                    name: c.name.clone(),
                });
            }
        }

        let mut names = HashSet::new();
        for s in &self.scenarios {
            if !names.insert(s.name.as_str()) {
                return Err(ConfigError::DuplicateScenario {
                    name: s.name.clone(),
                });
            }
        }

        for t in self.temperatures.iter().flatten() {
            validate_temperature(*t)?;
        }
        for t in self.candidates.iter().filter_map(|c| c.options.max_temperature) {
            validate_temperature(t)?;
        }
        for t in self.variants.explicit.iter().filter_map(|v| v.attributes.temperature) {
            validate_temperature(t)?;
        }
        if let Some(matrix) = &self.variants.matrix {
            matrix.validate()?;
        }

        if let Some(t) = self.threshold {
            validate_threshold(t)?;
        }
        for t in self.scenarios.iter().filter_map(|s| s.threshold) {
            validate_threshold(t)?;
        }

        let scenarios = self
            .scenarios
            .into_iter()
            .map(|s| s.resolve(&self.registry))
            .collect::<Result<Vec<_>, _>>()?;

        let temperatures = if self.temperatures.is_empty() {
            vec![None]
        } else {
            self.temperatures
        };

        Ok(SuiteDefinition {
            candidates: self.candidates,
            scenarios,
            variants: self.variants,
            temperatures,
            threshold: self.threshold,
        })
    }
}

pub(crate) fn validate_temperature(value: f64) -> Result<(), ConfigError> {
    if (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::TemperatureOutOfRange { value })
    }
}

pub(crate) fn validate_threshold(value: f64) -> Result<(), ConfigError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderOptions;
    use crate::variants::{ExplicitVariant, TraitMatrix, VariantAttributes};

    fn base() -> SuiteBuilder {
        SuiteBuilder::new()
            .candidate(Candidate::new("a", "model-a"))
            .scenario(ScenarioBuilder::new("s1", "Say hi").criterion("is friendly"))
    }

    #[test]
    fn temperatures_default_to_provider_sentinel() {
        let suite = base().build().unwrap();
        assert_eq!(suite.temperatures(), [None]);
        assert!(suite.variants().is_empty());
    }

    #[test]
    fn rubric_criteria_follow_inline_criteria() {
        let registry = RubricRegistry::new().with_rubric("tone", ["polite", "brief"]);
        let suite = SuiteBuilder::new()
            .rubrics(registry)
            .candidate(Candidate::new("a", "m"))
            .scenario(
                ScenarioBuilder::new("s", "p")
                    .criterion("accurate")
                    .rubric("tone"),
            )
            .build()
            .unwrap();
        assert_eq!(suite.scenarios()[0].criteria, ["accurate", "polite", "brief"]);
    }

    #[test]
    fn unknown_rubric_is_rejected() {
        let err = base()
            .scenario(ScenarioBuilder::new("s2", "p").rubric("nope"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRubric { name } if name == "nope"));
    }

    #[test]
    fn out_of_range_temperatures_are_rejected() {
        let err = base().temperatures([Some(0.5), Some(2.5)]).build().unwrap_err();
        assert!(matches!(err, ConfigError::TemperatureOutOfRange { value } if value == 2.5));

        assert!(base().temperatures([Some(-0.1)]).build().is_err());
        assert!(base().temperatures([Some(f64::NAN)]).build().is_err());
        assert!(base().temperatures([None, Some(0.0), Some(2.0)]).build().is_ok());

        let hot = ExplicitVariant::new("hot").with_attributes(VariantAttributes {
            temperature: Some(3.0),
            ..Default::default()
        });
        assert!(base()
            .variants(VariantConfig::new().with_variant(hot))
            .build()
            .is_err());
    }

    #[test]
    fn duplicate_names_and_empty_lists_are_rejected() {
        assert!(matches!(
            base().candidate(Candidate::new("a", "other")).build(),
            Err(ConfigError::DuplicateCandidate { .. })
        ));
        assert!(matches!(
            base().scenario(ScenarioBuilder::new("s1", "again")).build(),
            Err(ConfigError::DuplicateScenario { .. })
        ));
        assert!(matches!(
            SuiteBuilder::new().build(),
            Err(ConfigError::NoCandidates)
        ));
        assert!(matches!(
            SuiteBuilder::new().candidate(Candidate::new("a", "m")).build(),
            Err(ConfigError::NoScenarios)
        ));
    }

    #[test]
    fn candidate_max_temperature_must_be_in_range() {
        let capped = |max: f64| {
            Candidate::new("b", "model-b").with_options(ProviderOptions {
                max_temperature: Some(max),
                ..Default::default()
            })
        };
        assert!(matches!(
            base().candidate(capped(f64::NAN)).build(),
            Err(ConfigError::TemperatureOutOfRange { .. })
        ));
        assert!(base().candidate(capped(f64::INFINITY)).build().is_err());
        assert!(base().candidate(capped(-1.0)).build().is_err());
        assert!(base().candidate(capped(1.0)).build().is_ok());
    }

    #[test]
    fn names_used_by_the_judge_reply_are_reserved() {
        for name in ["winner", "tie", "Tie", " TIE "] {
            let err = base().candidate(Candidate::new(name, "m")).build().unwrap_err();
            assert!(
                matches!(&err, ConfigError::ReservedCandidateName { name: n } if n == name),
                "{name}: {err}"
            );
        }
        assert!(base().candidate(Candidate::new("winner-2", "m")).build().is_ok());
    }

    #[test]
    fn empty_matrix_dimension_fails_at_build() {
        let matrix = TraitMatrix::new(vec![vec!["x"], vec![]]);
        let err = base()
            .variants(VariantConfig::new().with_matrix(matrix))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyTraitDimension { index: 1 }));
    }

    #[test]
    fn scenario_threshold_overrides_suite_threshold() {
        let suite = base()
            .threshold(6.0)
            .scenario(ScenarioBuilder::new("strict", "p").threshold(9.0))
            .build()
            .unwrap();
        assert_eq!(suite.threshold_for(&suite.scenarios()[0]), Some(6.0));
        assert_eq!(suite.threshold_for(&suite.scenarios()[1]), Some(9.0));
        assert!(base().threshold(11.0).build().is_err());
    }
}
