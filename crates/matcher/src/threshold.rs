//! Similarity cutoffs and score classification.
//!
//! Raw cosine scores between texts in different languages run far lower than
//! scores between texts in the same language, even for exact translations
//! (roughly 0.35-0.45 against 0.70-0.90). Two separate tier tables exist for
//! that reason and cross-language scores are only ever judged against the
//! cross-language one.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use index::Language;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::MatchError;

/// Cutoff used when a level string cannot be parsed.
pub const BASELINE_THRESHOLD: f32 = 0.70;
/// Unrelated floor for languages without a dedicated entry.
pub const DEFAULT_UNRELATED_FLOOR: f32 = 0.60;

static DEFAULT_TABLE: Lazy<ThresholdTable> = Lazy::new(ThresholdTable::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    #[default]
    Translation,
    Recommendation,
    Search,
}

/// How a score relates a candidate to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLabel {
    /// Translation-memory quality; safe to reuse.
    Strong,
    Related,
    /// Plausibly on the same topic.
    Broad,
    Unrelated,
}

impl FromStr for SimilarityLevel {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(SimilarityLevel::High),
            "medium" => Ok(SimilarityLevel::Medium),
            "low" => Ok(SimilarityLevel::Low),
            other => Err(MatchError::InvalidRequest(format!(
                "unknown similarity level `{other}`"
            ))),
        }
    }
}

impl FromStr for UseCase {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "translation" => Ok(UseCase::Translation),
            "recommendation" => Ok(UseCase::Recommendation),
            "search" => Ok(UseCase::Search),
            other => Err(MatchError::InvalidRequest(format!(
                "unknown use case `{other}`"
            ))),
        }
    }
}

impl fmt::Display for MatchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchLabel::Strong => "strong",
            MatchLabel::Related => "related",
            MatchLabel::Broad => "broad",
            MatchLabel::Unrelated => "unrelated",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierCutoffs {
    pub high: f32,
    pub medium: f32,
    pub low: f32,
}

impl TierCutoffs {
    pub fn get(&self, level: SimilarityLevel) -> f32 {
        match level {
            SimilarityLevel::High => self.high,
            SimilarityLevel::Medium => self.medium,
            SimilarityLevel::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UseCaseCutoffs {
    /// Floor: translation reuse never accepts less.
    pub translation: f32,
    /// Ceiling for recommendations.
    pub recommendation: f32,
    /// Ceiling for exploratory search.
    pub search: f32,
}

/// All cutoffs in one serializable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdTable {
    pub same_language: TierCutoffs,
    pub cross_language: TierCutoffs,
    pub use_case: UseCaseCutoffs,
    pub unrelated_floors: BTreeMap<Language, f32>,
    pub default_unrelated_floor: f32,
    pub baseline: f32,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            same_language: TierCutoffs {
                high: 0.90,
                medium: 0.80,
                low: 0.70,
            },
            cross_language: TierCutoffs {
                high: 0.45,
                medium: 0.40,
                low: 0.35,
            },
            use_case: UseCaseCutoffs {
                translation: 0.85,
                recommendation: 0.75,
                search: 0.60,
            },
            // CJK embedding spaces are dense, so unrelated pairs score higher.
            unrelated_floors: BTreeMap::from([
                (Language::Chinese, 0.65),
                (Language::English, 0.60),
                (Language::Japanese, 0.65),
                (Language::Korean, 0.65),
            ]),
            default_unrelated_floor: DEFAULT_UNRELATED_FLOOR,
            baseline: BASELINE_THRESHOLD,
        }
    }
}

impl ThresholdTable {
    /// Shared instance with the built-in values.
    pub fn global() -> &'static ThresholdTable {
        &DEFAULT_TABLE
    }

    pub fn tiers(&self, cross_language: bool) -> &TierCutoffs {
        if cross_language {
            &self.cross_language
        } else {
            &self.same_language
        }
    }

    pub fn recommended_threshold(
        &self,
        cross_language: bool,
        level: SimilarityLevel,
        use_case: UseCase,
    ) -> f32 {
        self.adjust(self.tiers(cross_language).get(level), use_case)
    }

    /// String-level variant: an unrecognized `level` falls back to the baseline.
    pub fn recommended_threshold_for(
        &self,
        cross_language: bool,
        level: &str,
        use_case: UseCase,
    ) -> f32 {
        let base = match level.parse::<SimilarityLevel>() {
            Ok(level) => self.tiers(cross_language).get(level),
            Err(_) => {
                tracing::debug!(level, baseline = self.baseline, "unknown similarity level");
                self.baseline
            }
        };
        self.adjust(base, use_case)
    }

    fn adjust(&self, base: f32, use_case: UseCase) -> f32 {
        match use_case {
            UseCase::Translation => base.max(self.use_case.translation),
            UseCase::Recommendation => base.min(self.use_case.recommendation),
            UseCase::Search => base.min(self.use_case.search),
        }
    }

    pub fn unrelated_floor(&self, language: Language) -> f32 {
        self.unrelated_floors
            .get(&language)
            .copied()
            .unwrap_or(self.default_unrelated_floor)
    }

    pub fn classify(&self, score: f32, cross_language: bool, language: Language) -> MatchLabel {
        if cross_language {
            let cross = &self.cross_language;
            if score >= cross.medium {
                MatchLabel::Related
            } else if score >= cross.low {
                MatchLabel::Broad
            } else {
                MatchLabel::Unrelated
            }
        } else {
            let same = &self.same_language;
            if score >= same.high {
                MatchLabel::Strong
            } else if score >= same.medium {
                MatchLabel::Related
            } else if score >= self.unrelated_floor(language) {
                MatchLabel::Broad
            } else {
                MatchLabel::Unrelated
            }
        }
    }

    /// Tiers must be ordered and every cross-language cutoff must sit below
    /// its same-language counterpart.
    pub fn validate(&self) -> Result<(), MatchError> {
        for (name, tiers) in [("same_language", &self.same_language), ("cross_language", &self.cross_language)] {
            if !(tiers.high >= tiers.medium && tiers.medium >= tiers.low) {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} tiers must satisfy high >= medium >= low"
                )));
            }
            for v in [tiers.high, tiers.medium, tiers.low] {
                check_unit(name, v)?;
            }
        }
        for level in [SimilarityLevel::High, SimilarityLevel::Medium, SimilarityLevel::Low] {
            if self.cross_language.get(level) >= self.same_language.get(level) {
                return Err(MatchError::InvalidConfig(format!(
                    "cross_language {level:?} cutoff must be below same_language"
                )));
            }
        }
        for (lang, floor) in &self.unrelated_floors {
            check_unit(lang.payload_key(), *floor)?;
        }
        check_unit("default_unrelated_floor", self.default_unrelated_floor)?;
        check_unit("baseline", self.baseline)?;
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<(), MatchError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MatchError::InvalidConfig(format!(
            "{name} cutoff {value} is outside [0, 1]"
        )))
    }
}

/// [`ThresholdTable::recommended_threshold`] on the built-in table.
pub fn recommended_threshold(cross_language: bool, level: SimilarityLevel, use_case: UseCase) -> f32 {
    ThresholdTable::global().recommended_threshold(cross_language, level, use_case)
}

/// [`ThresholdTable::classify`] on the built-in table.
pub fn classify(score: f32, cross_language: bool, language: Language) -> MatchLabel {
    ThresholdTable::global().classify(score, cross_language, language)
}
