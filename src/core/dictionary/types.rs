//! Dictionary Response Types
//!
//! The unified record every provider produces, plus the cache envelope and
//! provider descriptors shared by the registry and the lazy manager.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::DictionaryError;

// ============================================================================
// Source Tag
// ============================================================================

/// Which provider produced a payload.
///
/// The set is closed: merge and cache-skip decisions match on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DictSource {
    /// Primary English-Chinese offline dictionary.
    #[serde(rename = "ecdict")]
    Ecdict,
    /// Primary entry whose definitions came from the supplement.
    #[serde(rename = "ecdict+wordnet")]
    EcdictWordnet,
    /// Supplementary English definitions.
    #[serde(rename = "wordnet")]
    Wordnet,
    /// Korean bidirectional dictionary.
    #[serde(rename = "kengdic")]
    Kengdic,
    /// Japanese bidirectional dictionary.
    #[serde(rename = "jmdict")]
    Jmdict,
    /// German bidirectional dictionary.
    #[serde(rename = "ding")]
    Ding,
    /// Russian bidirectional dictionary.
    #[serde(rename = "freedict-rus")]
    FreedictRus,
    /// Remote fallback API.
    #[serde(rename = "wiktionary")]
    Wiktionary,
    #[serde(rename = "cache")]
    Cache,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl DictSource {
    pub const ALL: [DictSource; 10] = [
        DictSource::Ecdict,
        DictSource::EcdictWordnet,
        DictSource::Wordnet,
        DictSource::Kengdic,
        DictSource::Jmdict,
        DictSource::Ding,
        DictSource::FreedictRus,
        DictSource::Wiktionary,
        DictSource::Cache,
        DictSource::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DictSource::Ecdict => "ecdict",
            DictSource::EcdictWordnet => "ecdict+wordnet",
            DictSource::Wordnet => "wordnet",
            DictSource::Kengdic => "kengdic",
            DictSource::Jmdict => "jmdict",
            DictSource::Ding => "ding",
            DictSource::FreedictRus => "freedict-rus",
            DictSource::Wiktionary => "wiktionary",
            DictSource::Cache => "cache",
            DictSource::Unknown => "unknown",
        }
    }

    /// Whether results from this source may be written to the cache.
    ///
    /// The primary local dictionary answers the bulk of traffic from disk and
    /// is never cached.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, DictSource::Ecdict)
    }
}

impl fmt::Display for DictSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DictSource {
    type Err = DictionaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DictSource::ALL
            .iter()
            .copied()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| DictionaryError::config(format!("unknown dictionary source '{s}'")))
    }
}

// ============================================================================
// Response Model
// ============================================================================

/// UK/US pair used for both phonetics and audio links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regional {
    pub uk: String,
    pub us: String,
}

impl Regional {
    pub fn both(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            uk: value.clone(),
            us: value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uk.is_empty() && self.us.is_empty()
    }
}

/// Target-language glosses grouped by part of speech.
///
/// An empty `pos_tag` means the glosses were not grouped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Translation {
    pub pos_tag: String,
    pub meanings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Definition {
    pub part_of_speech: String,
    pub definition: String,
    pub example: String,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
}

/// Inflected word forms. Every slot defaults to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Exchange {
    pub past: String,
    pub past_participle: String,
    pub present_participle: String,
    pub third_person: String,
    pub plural: String,
    pub comparative: String,
    pub superlative: String,
    pub lemma: String,
}

impl Exchange {
    /// Parse the slash-separated `code:form` notation (`p:went/d:gone/0:go`).
    ///
    /// Unknown codes and malformed segments are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut exchange = Exchange::default();
        for segment in raw.split('/') {
            let Some((code, form)) = segment.split_once(':') else {
                continue;
            };
            let form = form.trim().to_string();
            match code.trim() {
                "p" => exchange.past = form,
                "d" => exchange.past_participle = form,
                "i" => exchange.present_participle = form,
                "3" => exchange.third_person = form,
                "s" => exchange.plural = form,
                "r" => exchange.comparative = form,
                "t" => exchange.superlative = form,
                "0" => exchange.lemma = form,
                _ => {}
            }
        }
        exchange
    }

    pub fn is_empty(&self) -> bool {
        *self == Exchange::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frequency {
    pub collins: i64,
    pub oxford: i64,
    pub bnc: i64,
    pub frq: i64,
    pub tag: Vec<String>,
}

/// The canonical lookup result.
///
/// Every field is always present; an empty result is the zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DictionaryResponse {
    pub word: String,
    pub phonetics: Regional,
    pub audio: Regional,
    pub translations: Vec<Translation>,
    pub definitions: Vec<Definition>,
    pub exchange: Exchange,
    pub frequency: Frequency,
    pub source: DictSource,
    pub cached: bool,
    pub detail_url: String,
}

impl DictionaryResponse {
    pub fn new(word: impl Into<String>, source: DictSource) -> Self {
        Self {
            word: word.into(),
            source,
            ..Default::default()
        }
    }

    pub fn has_definitions(&self) -> bool {
        !self.definitions.is_empty()
    }

    pub fn has_translations(&self) -> bool {
        self.translations.iter().any(|t| !t.meanings.is_empty())
    }
}

// ============================================================================
// Cache Envelope
// ============================================================================

/// Stored cache value: payload plus hit bookkeeping (epoch milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub hit_count: u64,
    pub created_at: i64,
    pub last_hit_at: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, now_ms: i64) -> Self {
        Self {
            data,
            hit_count: 0,
            created_at: now_ms,
            last_hit_at: now_ms,
        }
    }

    /// Whole days since creation, floored.
    pub fn age_days(&self, now_ms: i64) -> i64 {
        (now_ms - self.created_at).max(0) / MILLIS_PER_DAY
    }
}

pub const MILLIS_PER_DAY: i64 = 86_400_000;

// ============================================================================
// Provider Descriptor
// ============================================================================

/// Registry-facing summary of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub name: String,
    pub display_name: String,
    pub supported_languages: Vec<String>,
    pub priority: i32,
}

/// Health row reported per registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    pub display_name: String,
    pub available: bool,
}
