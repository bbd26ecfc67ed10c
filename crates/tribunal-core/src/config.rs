//! YAML suite files.

use crate::engine::runner::RunPolicy;
use crate::errors::ConfigError;
use crate::judge::JudgeConfig;
use crate::model::Candidate;
use crate::rubric::RubricRegistry;
use crate::suite::{ScenarioBuilder, SuiteBuilder, SuiteDefinition};
use crate::variants::{ExplicitVariant, TraitMatrix, VariantConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteFile {
    pub version: u32,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub settings: Settings,
    /// Suite-wide pass mark; the judge's threshold applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub rubrics: BTreeMap<String, Vec<String>>,
    pub candidates: Vec<Candidate>,
    pub scenarios: Vec<ScenarioEntry>,
    #[serde(default)]
    pub variants: Vec<ExplicitVariant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trait_matrix: Option<TraitMatrix>,
    /// `null` entries mean "provider default".
    #[serde(default)]
    pub temperatures: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub parallel_generation: bool,
    pub timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel_generation: false,
            timeout_seconds: 60,
        }
    }
}

impl Settings {
    pub fn run_policy(&self) -> RunPolicy {
        RunPolicy {
            parallel_generation: self.parallel_generation,
            timeout: Duration::from_secs(self.timeout_seconds.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioEntry {
    pub name: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default)]
    pub rubrics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl ScenarioEntry {
    fn into_builder(self) -> ScenarioBuilder {
        let mut builder = ScenarioBuilder::new(self.name, self.prompt).criteria(self.criteria);
        for rubric in self.rubrics {
            builder = builder.rubric(rubric);
        }
        if let Some(system_prompt) = self.system_prompt {
            builder = builder.system_prompt(system_prompt);
        }
        if let Some(context) = self.context {
            builder = builder.context(context);
        }
        if let Some(threshold) = self.threshold {
            builder = builder.threshold(threshold);
        }
        builder
    }
}

/// A validated suite plus the run settings that came with it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSuite {
    pub definition: SuiteDefinition,
    pub judge: JudgeConfig,
    pub settings: Settings,
}

pub fn load_suite(path: &Path) -> Result<LoadedSuite, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_suite(&raw)
}

pub fn parse_suite(raw: &str) -> Result<LoadedSuite, ConfigError> {
    let file: SuiteFile = serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse {
        message: e.to_string(),
    })?;
    if file.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: file.version,
            supported: SUPPORTED_CONFIG_VERSION,
        });
    }
    file.into_loaded()
}

impl SuiteFile {
    pub fn into_loaded(self) -> Result<LoadedSuite, ConfigError> {
        self.judge.validate()?;

        let mut registry = RubricRegistry::new();
        for (name, criteria) in self.rubrics {
            registry.register(name, criteria);
        }

        let mut variants = VariantConfig::new();
        variants.explicit = self.variants;
        variants.matrix = self.trait_matrix;

        let mut builder = SuiteBuilder::new()
            .rubrics(registry)
            .variants(variants)
            .temperatures(self.temperatures);
        if let Some(threshold) = self.threshold {
            builder = builder.threshold(threshold);
        }
        for candidate in self.candidates {
            builder = builder.candidate(candidate);
        }
        for scenario in self.scenarios {
            builder = builder.scenario(scenario.into_builder());
        }

        Ok(LoadedSuite {
            definition: builder.build()?,
            judge: self.judge,
            settings: self.settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SUITE: &str = r#"
version: 1
judge:
  model: gpt-4o-mini
  threshold: 6
settings:
  parallel_generation: true
  timeout_seconds: 30
rubrics:
  tone: ["is polite", "is concise"]
candidates:
  - name: gpt
    model: openai/gpt-4o
  - name: claude
    model: anthropic/claude-3.5-sonnet
    system_prompt: Be brief.
    options:
      max_temperature: 1.0
scenarios:
  - name: greeting
    prompt: Say hello to a new customer.
    criteria: ["mentions the company"]
    rubrics: [tone]
variants:
  - name: formal
    traits: [formal]
    credential: You are a concierge.
trait_matrix:
  - [x, y]
  - [p, q]
temperatures: [0.2, null]
"#;

    #[test]
    fn parses_full_suite() {
        let loaded = parse_suite(SUITE).unwrap();
        let def = &loaded.definition;
        assert_eq!(def.candidates().len(), 2);
        assert_eq!(def.candidates()[1].options.max_temperature, Some(1.0));
        assert_eq!(
            def.scenarios()[0].criteria,
            ["mentions the company", "is polite", "is concise"]
        );
        assert_eq!(def.temperatures(), [Some(0.2), None]);
        assert_eq!(def.variants().explicit[0].attributes.credential.as_deref(), Some("You are a concierge."));
        assert_eq!(def.variants().matrix.as_ref().unwrap().expected_len(), 4);

        assert_eq!(loaded.judge.model, "gpt-4o-mini");
        assert_eq!(loaded.judge.threshold, 6.0);
        assert!(loaded.judge.hijack_defense);
        let policy = loaded.settings.run_policy();
        assert!(policy.parallel_generation);
        assert_eq!(policy.timeout, Duration::from_secs(30));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SUITE.as_bytes()).unwrap();
        let loaded = load_suite(file.path()).unwrap();
        assert_eq!(loaded.definition.scenarios()[0].name, "greeting");
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_suite(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn rejects_wrong_version() {
        let raw = SUITE.replace("version: 1", "version: 2");
        assert!(matches!(
            parse_suite(&raw),
            Err(ConfigError::UnsupportedVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn validation_errors_surface() {
        let raw = SUITE.replace("temperatures: [0.2, null]", "temperatures: [0.2, 2.5]");
        assert!(matches!(
            parse_suite(&raw),
            Err(ConfigError::TemperatureOutOfRange { .. })
        ));

        let raw = SUITE.replace("rubrics: [tone]", "rubrics: [style]");
        assert!(matches!(parse_suite(&raw), Err(ConfigError::UnknownRubric { .. })));

        let raw = SUITE.replace("  threshold: 6\n", "  threshold: 50\n");
        assert!(matches!(
            parse_suite(&raw),
            Err(ConfigError::InvalidThreshold { value }) if value == 50.0
        ));

        let raw = SUITE.replace("  model: gpt-4o-mini\n", "  model: gpt-4o-mini\n  temperature: 3.0\n");
        assert!(matches!(
            parse_suite(&raw),
            Err(ConfigError::TemperatureOutOfRange { value }) if value == 3.0
        ));

        let raw = SUITE.replace("max_temperature: 1.0", "max_temperature: .nan");
        assert!(matches!(
            parse_suite(&raw),
            Err(ConfigError::TemperatureOutOfRange { .. })
        ));

        let raw = SUITE.replace("  - name: gpt\n", "  - name: winner\n");
        assert!(matches!(
            parse_suite(&raw),
            Err(ConfigError::ReservedCandidateName { .. })
        ));

        let raw = SUITE.replace("  - [p, q]", "  - []");
        assert!(matches!(
            parse_suite(&raw),
            Err(ConfigError::EmptyTraitDimension { index: 1 })
        ));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let raw = SUITE.replace("version: 1", "version: 1\nrubric_typo: {}");
        assert!(matches!(parse_suite(&raw), Err(ConfigError::Parse { .. })));
    }
}
