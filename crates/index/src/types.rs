use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use semantic::Embedding;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::IndexError;

/// Identifier of a stored record. Remote backends mint UUIDs.
pub type RecordId = String;

/// Record id in a form the vector service accepts: an unsigned integer or a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointId {
    Num(u64),
    Uuid(uuid::Uuid),
}

impl PointId {
    pub fn parse(id: &str) -> Result<Self, IndexError> {
        let id = id.trim();
        if let Ok(n) = id.parse::<u64>() {
            return Ok(PointId::Num(n));
        }
        uuid::Uuid::parse_str(id).map(PointId::Uuid).map_err(|_| {
            IndexError::InvalidRecord(format!(
                "record id `{id}` must be an unsigned integer or a UUID"
            ))
        })
    }

    pub fn new_uuid() -> Self {
        PointId::Uuid(uuid::Uuid::new_v4())
    }

    /// JSON form for the wire: numbers stay numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PointId::Num(n) => serde_json::Value::from(*n),
            PointId::Uuid(u) => serde_json::Value::String(u.to_string()),
        }
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(u) => write!(f, "{u}"),
        }
    }
}

/// Language-name to text mapping carried by every record.
pub type Payload = BTreeMap<String, String>;

/// Named vector field holding source-language (Chinese) embeddings.
pub const PRIMARY_FIELD: &str = "vector_cn";
/// Named vector field holding every other language's embeddings.
pub const SECONDARY_FIELD: &str = "vector_en";

/// Languages a translation-memory record can carry.
///
/// The capitalized name doubles as the payload key, so `Language::Chinese`
/// stores its text under `"Chinese"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    Chinese,
    English,
    Japanese,
    Korean,
    French,
    German,
    Spanish,
    Russian,
    Portuguese,
    Vietnamese,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported language `{0}`")]
pub struct ParseLanguageError(pub String);

impl Language {
    pub const ALL: [Language; 10] = [
        Language::Chinese,
        Language::English,
        Language::Japanese,
        Language::Korean,
        Language::French,
        Language::German,
        Language::Spanish,
        Language::Russian,
        Language::Portuguese,
        Language::Vietnamese,
    ];

    /// The language whose embeddings live in [`PRIMARY_FIELD`].
    pub const PRIMARY: Language = Language::Chinese;

    pub fn payload_key(self) -> &'static str {
        match self {
            Language::Chinese => "Chinese",
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::French => "French",
            Language::German => "German",
            Language::Spanish => "Spanish",
            Language::Russian => "Russian",
            Language::Portuguese => "Portuguese",
            Language::Vietnamese => "Vietnamese",
        }
    }

    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }

    /// Vector field that indexes text written in this language.
    pub fn vector_field(self) -> &'static str {
        if self.is_primary() {
            PRIMARY_FIELD
        } else {
            SECONDARY_FIELD
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.payload_key())
    }
}

impl FromStr for Language {
    type Err = ParseLanguageError;

    /// Accepts the capitalized name in any case plus common ISO-639 codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = match s.trim().to_ascii_lowercase().as_str() {
            "chinese" | "zh" | "cn" | "zh-cn" | "zh-hans" => Language::Chinese,
            "english" | "en" => Language::English,
            "japanese" | "ja" | "jp" => Language::Japanese,
            "korean" | "ko" | "kr" => Language::Korean,
            "french" | "fr" => Language::French,
            "german" | "de" => Language::German,
            "spanish" | "es" => Language::Spanish,
            "russian" | "ru" => Language::Russian,
            "portuguese" | "pt" => Language::Portuguese,
            "vietnamese" | "vi" => Language::Vietnamese,
            _ => return Err(ParseLanguageError(s.to_string())),
        };
        Ok(lang)
    }
}

impl TryFrom<String> for Language {
    type Error = ParseLanguageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(lang: Language) -> Self {
        lang.payload_key().to_string()
    }
}

/// A translation-memory entry as written to the index.
///
/// Build with [`VectorRecord::new`] so every supported language gets a payload
/// slot, then attach texts and vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// `None` asks the backend to mint one.
    pub id: Option<RecordId>,
    /// Language whose text must be present.
    pub source_language: Language,
    pub vectors: BTreeMap<String, Embedding>,
    pub payload: Payload,
}

impl VectorRecord {
    pub fn new(source_language: Language) -> Self {
        let payload = Language::ALL
            .iter()
            .map(|lang| (lang.payload_key().to_string(), String::new()))
            .collect();
        Self {
            id: None,
            source_language,
            vectors: BTreeMap::new(),
            payload,
        }
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, lang: Language, text: impl Into<String>) -> Self {
        self.payload
            .insert(lang.payload_key().to_string(), text.into());
        self
    }

    pub fn with_vector(mut self, field: impl Into<String>, vector: Embedding) -> Self {
        self.vectors.insert(field.into(), vector);
        self
    }

    pub fn text(&self, lang: Language) -> Option<&str> {
        self.payload
            .get(lang.payload_key())
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    /// Parsed id, or a fresh UUID when none was given.
    pub fn point_id(&self) -> Result<PointId, IndexError> {
        match &self.id {
            Some(id) => PointId::parse(id),
            None => Ok(PointId::new_uuid()),
        }
    }

    /// At least one non-empty vector, a non-blank source text and, when
    /// given, a well-formed id.
    pub fn validate(&self) -> Result<(), IndexError> {
        if let Some(id) = &self.id {
            PointId::parse(id)?;
        }
        if self.vectors.values().all(|v| v.is_empty()) {
            return Err(IndexError::InvalidRecord(
                "record must carry at least one vector".into(),
            ));
        }
        if self.text(self.source_language).is_none() {
            return Err(IndexError::InvalidRecord(format!(
                "payload field `{}` must not be empty",
                self.source_language.payload_key()
            )));
        }
        Ok(())
    }
}

/// One search result as returned by a backend, before labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub id: RecordId,
    pub score: f32,
    pub payload: Option<Payload>,
}

impl RawHit {
    pub fn text(&self, lang: Language) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get(lang.payload_key()))
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }
}
