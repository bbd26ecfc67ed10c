//! Prompt variants: explicit definitions plus the cross-product of a trait matrix.
//!
//! Variants are value objects built before a run starts. The only later change
//! is attaching the composed prompt for a scenario, which produces a new value.

use crate::errors::ConfigError;
use crate::model::{ChatMessage, Scenario};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_VARIANT_NAME: &str = "default";

/// Separator between trait identifiers in a generated variant name.
pub const TRAIT_NAME_SEPARATOR: &str = "_";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantAttributes {
    /// Credential or persona text prepended to the scenario prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Prior turns sent ahead of the prompt.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,
    /// Replaces the scenario prompt when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<String>,
    #[serde(flatten)]
    pub attributes: VariantAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composed_prompt: Option<String>,
}

impl Variant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traits: Vec::new(),
            attributes: VariantAttributes::default(),
            composed_prompt: None,
        }
    }

    pub fn default_variant() -> Self {
        Self::new(DEFAULT_VARIANT_NAME)
    }

    pub fn from_attributes(
        name: impl Into<String>,
        traits: Vec<String>,
        attributes: VariantAttributes,
    ) -> Self {
        Self {
            name: name.into(),
            traits,
            attributes,
            composed_prompt: None,
        }
    }

    pub fn with_composed_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.composed_prompt = Some(prompt.into());
        self
    }

    /// Final user prompt for `scenario`: composed prompt, else the variant's own
    /// prompt, else credential followed by the scenario prompt.
    pub fn final_prompt(&self, scenario: &Scenario) -> String {
        if let Some(composed) = &self.composed_prompt {
            return composed.clone();
        }
        if let Some(own) = &self.attributes.prompt {
            return own.clone();
        }
        match self.attributes.credential.as_deref() {
            Some(credential) if !credential.is_empty() => {
                format!("{}\n\n{}", credential, scenario.prompt)
            }
            _ => scenario.prompt.clone(),
        }
    }
}

/// A named variant with an explicit trait list and literal overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExplicitVariant {
    pub name: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(flatten)]
    pub attributes: VariantAttributes,
}

impl ExplicitVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attributes(mut self, attributes: VariantAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// N dimensions of trait identifiers; expands to their Cartesian product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraitMatrix {
    pub dimensions: Vec<Vec<String>>,
}

impl TraitMatrix {
    pub fn new<D, I, S>(dimensions: D) -> Self
    where
        D: IntoIterator<Item = I>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dimensions: dimensions
                .into_iter()
                .map(|d| d.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.dimensions.iter().position(Vec::is_empty) {
            Some(index) => Err(ConfigError::EmptyTraitDimension { index }),
            None => Ok(()),
        }
    }

    /// Lexicographic product: the first dimension varies slowest.
    pub fn combinations(&self) -> Result<Vec<Vec<String>>, ConfigError> {
        self.validate()?;
        if self.dimensions.is_empty() {
            return Ok(Vec::new());
        }
        let mut combos: Vec<Vec<String>> = vec![Vec::new()];
        for dimension in &self.dimensions {
            let mut next = Vec::with_capacity(combos.len() * dimension.len());
            for prefix in &combos {
                for trait_id in dimension {
                    let mut combo = prefix.clone();
                    combo.push(trait_id.clone());
                    next.push(combo);
                }
            }
            combos = next;
        }
        Ok(combos)
    }

    pub fn expected_len(&self) -> usize {
        if self.dimensions.is_empty() {
            0
        } else {
            self.dimensions.iter().map(Vec::len).product()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VariantConfig {
    #[serde(default)]
    pub explicit: Vec<ExplicitVariant>,
    #[serde(default)]
    pub matrix: Option<TraitMatrix>,
}

impl VariantConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variant(mut self, variant: ExplicitVariant) -> Self {
        self.explicit.push(variant);
        self
    }

    pub fn with_matrix(mut self, matrix: TraitMatrix) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty() && self.matrix.is_none()
    }
}

/// External trait-composition engine. Optional; without one, attributes are
/// applied directly.
pub trait TraitComposer: Send + Sync {
    fn compose(
        &self,
        name: &str,
        traits: &[String],
        overrides: &VariantAttributes,
    ) -> anyhow::Result<Variant>;

    /// Fully composed prompt for one scenario, if the engine builds one.
    fn compose_prompt(&self, _variant: &Variant, _scenario: &Scenario) -> Option<String> {
        None
    }
}

#[derive(Clone, Default)]
pub struct VariantGenerator {
    composer: Option<Arc<dyn TraitComposer>>,
}

impl std::fmt::Debug for VariantGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantGenerator")
            .field("composer", &self.composer.is_some())
            .finish()
    }
}

impl VariantGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_composer(composer: Arc<dyn TraitComposer>) -> Self {
        Self {
            composer: Some(composer),
        }
    }

    pub fn has_composer(&self) -> bool {
        self.composer.is_some()
    }

    /// Expand `config` into an ordered list with unique names. The first
    /// definition of a name wins; later duplicates are dropped.
    pub fn build_variants(&self, config: &VariantConfig) -> Result<Vec<Variant>, ConfigError> {
        let combos = match &config.matrix {
            Some(matrix) => matrix.combinations()?,
            None => Vec::new(),
        };

        if config.explicit.is_empty() && config.matrix.is_none() {
            return Ok(vec![Variant::default_variant()]);
        }

        let mut variants = Vec::with_capacity(config.explicit.len() + combos.len());
        let mut seen = HashSet::new();

        for explicit in &config.explicit {
            if !seen.insert(explicit.name.clone()) {
                tracing::debug!(variant = %explicit.name, "dropping duplicate variant");
                continue;
            }
            variants.push(self.build_one(&explicit.name, &explicit.traits, &explicit.attributes)?);
        }

        let no_overrides = VariantAttributes::default();
        for combo in combos {
            let name = combo.join(TRAIT_NAME_SEPARATOR);
            if !seen.insert(name.clone()) {
                tracing::debug!(variant = %name, "dropping duplicate variant");
                continue;
            }
            variants.push(self.build_one(&name, &combo, &no_overrides)?);
        }

        Ok(variants)
    }

    fn build_one(
        &self,
        name: &str,
        traits: &[String],
        attributes: &VariantAttributes,
    ) -> Result<Variant, ConfigError> {
        match &self.composer {
            Some(composer) => {
                let mut variant =
                    composer
                        .compose(name, traits, attributes)
                        .map_err(|e| ConfigError::Composer {
                            variant: name.to_string(),
                            message: e.to_string(),
                        })?;
                variant.name = name.to_string();
                Ok(variant)
            }
            None => Ok(Variant::from_attributes(
                name,
                traits.to_vec(),
                attributes.clone(),
            )),
        }
    }

    /// Variant as used for `scenario`, with the composed prompt attached when
    /// the composition engine provides one.
    pub fn for_scenario(&self, variant: &Variant, scenario: &Scenario) -> Variant {
        let composed = self
            .composer
            .as_ref()
            .and_then(|c| c.compose_prompt(variant, scenario));
        match composed {
            Some(prompt) => variant.clone().with_composed_prompt(prompt),
            None => variant.clone(),
        }
    }
}

/// [`VariantGenerator::build_variants`] without a composition engine.
pub fn build_variants(config: &VariantConfig) -> Result<Vec<Variant>, ConfigError> {
    VariantGenerator::new().build_variants(config)
}
