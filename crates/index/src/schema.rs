use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{IndexError, PRIMARY_FIELD, SECONDARY_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

impl Distance {
    pub fn as_str(self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
            Distance::Manhattan => "Manhattan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorFieldSpec {
    pub size: usize,
    #[serde(default)]
    pub distance: Distance,
}

/// What a collection is supposed to look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    /// Named vector fields keyed by field name. A field named `""` stands for
    /// a collection with a single unnamed vector.
    pub fields: BTreeMap<String, VectorFieldSpec>,
}

/// Result of comparing a live collection against the expected schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaCheck {
    Matches,
    /// Human-readable reasons the live collection must be recreated.
    Drift(Vec<String>),
}

impl SchemaCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, SchemaCheck::Matches)
    }
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, size: usize, distance: Distance) -> Self {
        self.fields
            .insert(name.into(), VectorFieldSpec { size, distance });
        self
    }

    /// The two-field cosine layout used for translation memory.
    pub fn translation_memory(name: impl Into<String>, dimension: usize) -> Self {
        Self::new(name)
            .with_field(PRIMARY_FIELD, dimension, Distance::Cosine)
            .with_field(SECONDARY_FIELD, dimension, Distance::Cosine)
    }

    pub fn field(&self, name: &str) -> Option<&VectorFieldSpec> {
        self.fields.get(name)
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.name.trim().is_empty() {
            return Err(IndexError::InvalidSchema("collection name is empty".into()));
        }
        if self.fields.is_empty() {
            return Err(IndexError::InvalidSchema(
                "at least one vector field is required".into(),
            ));
        }
        if let Some((name, _)) = self.fields.iter().find(|(_, spec)| spec.size == 0) {
            return Err(IndexError::InvalidSchema(format!(
                "vector field `{name}` has zero dimension"
            )));
        }
        Ok(())
    }

    /// Compare against a live field layout. Only field names and dimensions
    /// participate; distance is fixed at creation and not reconciled.
    pub fn check(&self, live: &BTreeMap<String, VectorFieldSpec>) -> SchemaCheck {
        let mut reasons = Vec::new();

        for (name, expected) in &self.fields {
            match live.get(name) {
                None => reasons.push(format!("missing vector field `{name}`")),
                Some(actual) if actual.size != expected.size => reasons.push(format!(
                    "vector field `{name}` has dimension {} (expected {})",
                    actual.size, expected.size
                )),
                Some(_) => {}
            }
        }
        for name in live.keys().filter(|n| !self.fields.contains_key(*n)) {
            if name.is_empty() {
                reasons.push("collection uses a single unnamed vector".into());
            } else {
                reasons.push(format!("unexpected vector field `{name}`"));
            }
        }

        if reasons.is_empty() {
            SchemaCheck::Matches
        } else {
            SchemaCheck::Drift(reasons)
        }
    }
}
