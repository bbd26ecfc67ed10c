use crate::errors::ConfigError;
use std::collections::BTreeMap;

/// Named, ordered criteria lists. Populated once before a run and read-only after.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RubricRegistry {
    rubrics: BTreeMap<String, Vec<String>>,
}

impl RubricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rubric<I, S>(mut self, name: impl Into<String>, criteria: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(name, criteria);
        self
    }

    /// Registering an existing name replaces its criteria.
    pub fn register<I, S>(&mut self, name: impl Into<String>, criteria: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rubrics
            .insert(name.into(), criteria.into_iter().map(Into::into).collect());
    }

    pub fn resolve(&self, name: &str) -> Result<&[String], ConfigError> {
        self.rubrics
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownRubric {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rubrics.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rubrics.is_empty()
    }
}
