//! Row Transformers
//!
//! Convert source-specific rows and payloads into [`DictionaryResponse`].

use serde::Deserialize;

use super::error::Result;
use super::storage::DictRow;
use super::types::{
    Definition, DictSource, DictionaryResponse, Exchange, Frequency, Regional, Translation,
};

/// Column layout of a local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// ECDICT `stardict` rows.
    Ecdict,
    /// English definitions stored as a JSON array.
    Supplement,
    /// Bidirectional word lists (`phonetic`/`reading`, `translation`).
    Bilingual,
}

impl RowFormat {
    pub fn for_source(source: DictSource) -> Self {
        match source {
            DictSource::Ecdict => RowFormat::Ecdict,
            DictSource::Wordnet => RowFormat::Supplement,
            _ => RowFormat::Bilingual,
        }
    }

    pub fn transform(&self, row: &DictRow, source: DictSource) -> Result<DictionaryResponse> {
        match self {
            RowFormat::Ecdict => Ok(from_ecdict_row(row)),
            RowFormat::Supplement => from_supplement_row(row),
            RowFormat::Bilingual => Ok(from_bilingual_row(row, source)),
        }
    }
}

// ============================================================================
// Line helpers
// ============================================================================

/// Split multi-line column text. Stores disagree on literal vs escaped newlines.
fn lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(['\n', '\r'])
        .flat_map(|l| l.split("\\n"))
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

/// Split a leading part-of-speech marker (`n.`, `vt.`, `adj.`) off a line.
fn split_pos(line: &str) -> (&str, &str) {
    if let Some((head, rest)) = line.split_once(char::is_whitespace) {
        if let Some(stem) = head.strip_suffix('.') {
            if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_alphabetic() || c == '&') {
                return (head, rest.trim());
            }
        }
    }
    ("", line)
}

fn expand_pos(tag: &str) -> String {
    let stem = tag.trim_end_matches('.');
    match stem {
        "n" => "noun",
        "v" | "vt" | "vi" => "verb",
        "a" | "adj" => "adjective",
        "ad" | "adv" => "adverb",
        "prep" => "preposition",
        "conj" => "conjunction",
        "pron" => "pronoun",
        "int" | "interj" => "interjection",
        "num" => "numeral",
        "art" => "article",
        other => other,
    }
    .to_string()
}

/// Group translation lines by their POS marker, keeping first-seen order.
fn parse_translations(raw: &str) -> Vec<Translation> {
    let mut groups: Vec<Translation> = Vec::new();
    for line in lines(raw) {
        let (pos, body) = split_pos(line);
        let meanings = body
            .split(['；', ';', ',', '，'])
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        match groups.iter_mut().find(|g| g.pos_tag == pos) {
            Some(group) => group.meanings.extend(meanings),
            None => groups.push(Translation {
                pos_tag: pos.to_string(),
                meanings: meanings.collect(),
            }),
        }
    }
    groups.retain(|g| !g.meanings.is_empty());
    groups
}

fn parse_definitions(raw: &str) -> Vec<Definition> {
    lines(raw)
        .map(|line| {
            let (pos, body) = split_pos(line);
            Definition {
                part_of_speech: expand_pos(pos),
                definition: body.to_string(),
                ..Default::default()
            }
        })
        .collect()
}

// ============================================================================
// Local rows
// ============================================================================

pub fn from_ecdict_row(row: &DictRow) -> DictionaryResponse {
    let mut response = DictionaryResponse::new(row.word(), DictSource::Ecdict);
    let phonetic = row.get("phonetic").trim();
    if !phonetic.is_empty() {
        response.phonetics = Regional::both(phonetic);
    }
    let audio = row.get("audio").trim();
    if !audio.is_empty() {
        response.audio = Regional::both(audio);
    }
    response.translations = parse_translations(row.get("translation"));
    response.definitions = parse_definitions(row.get("definition"));
    response.exchange = Exchange::parse(row.get("exchange"));
    response.frequency = Frequency {
        collins: row.get_i64("collins"),
        oxford: row.get_i64("oxford"),
        bnc: row.get_i64("bnc"),
        frq: row.get_i64("frq"),
        tag: row
            .get("tag")
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    };
    response
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SupplementSense {
    pos: String,
    definition: String,
    example: String,
    synonyms: Vec<String>,
    antonyms: Vec<String>,
}

pub fn from_supplement_row(row: &DictRow) -> Result<DictionaryResponse> {
    let mut response = DictionaryResponse::new(row.word(), DictSource::Wordnet);
    let raw = row.get("definitions").trim();
    if !raw.is_empty() {
        let senses: Vec<SupplementSense> = serde_json::from_str(raw)?;
        response.definitions = senses
            .into_iter()
            .filter(|s| !s.definition.trim().is_empty())
            .map(|s| Definition {
                part_of_speech: s.pos,
                definition: s.definition,
                example: s.example,
                synonyms: s.synonyms,
                antonyms: s.antonyms,
            })
            .collect();
    }
    let phonetic = row.get("phonetic").trim();
    if !phonetic.is_empty() {
        response.phonetics = Regional::both(phonetic);
    }
    Ok(response)
}

pub fn from_bilingual_row(row: &DictRow, source: DictSource) -> DictionaryResponse {
    let mut response = DictionaryResponse::new(row.word(), source);
    let phonetic = row.first_of(&["phonetic", "reading"]).trim();
    if !phonetic.is_empty() {
        response.phonetics = Regional::both(phonetic);
    }
    response.translations = parse_translations(row.get("translation"));
    response.definitions = parse_definitions(row.get("definition"));
    response
}

// ============================================================================
// Free Dictionary API payloads
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiEntry {
    pub word: String,
    pub phonetic: Option<String>,
    pub phonetics: Vec<ApiPhonetic>,
    pub meanings: Vec<ApiMeaning>,
    pub source_urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiPhonetic {
    pub text: Option<String>,
    pub audio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiMeaning {
    pub part_of_speech: String,
    pub definitions: Vec<ApiDefinition>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiDefinition {
    pub definition: String,
    pub example: Option<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
}

fn merge_unique(mut own: Vec<String>, shared: &[String]) -> Vec<String> {
    for item in shared {
        if !own.contains(item) {
            own.push(item.clone());
        }
    }
    own
}

/// Flatten API entries into one response. Returns `None` for an empty payload.
pub fn from_api_entries(entries: &[ApiEntry], source: DictSource) -> Option<DictionaryResponse> {
    let first = entries.first()?;
    let mut response = DictionaryResponse::new(first.word.clone(), source);

    for entry in entries {
        for phonetic in &entry.phonetics {
            let audio = phonetic.audio.as_deref().unwrap_or("").trim();
            let text = phonetic.text.as_deref().unwrap_or("").trim();
            let slot = if audio.ends_with("-uk.mp3") {
                Some((&mut response.phonetics.uk, &mut response.audio.uk))
            } else if audio.ends_with("-us.mp3") {
                Some((&mut response.phonetics.us, &mut response.audio.us))
            } else {
                None
            };
            if let Some((text_slot, audio_slot)) = slot {
                if text_slot.is_empty() {
                    *text_slot = text.to_string();
                }
                if audio_slot.is_empty() {
                    *audio_slot = audio.to_string();
                }
            }
        }

        let fallback_text = entry
            .phonetic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or_else(|| {
                entry
                    .phonetics
                    .iter()
                    .filter_map(|p| p.text.as_deref().map(str::trim))
                    .find(|t| !t.is_empty())
            });
        if let Some(text) = fallback_text {
            for slot in [&mut response.phonetics.uk, &mut response.phonetics.us] {
                if slot.is_empty() {
                    *slot = text.to_string();
                }
            }
        }

        for meaning in &entry.meanings {
            for def in &meaning.definitions {
                if def.definition.trim().is_empty() {
                    continue;
                }
                response.definitions.push(Definition {
                    part_of_speech: meaning.part_of_speech.clone(),
                    definition: def.definition.clone(),
                    example: def.example.clone().unwrap_or_default(),
                    synonyms: merge_unique(def.synonyms.clone(), &meaning.synonyms),
                    antonyms: merge_unique(def.antonyms.clone(), &meaning.antonyms),
                });
            }
        }

        if response.detail_url.is_empty() {
            if let Some(url) = entry.source_urls.first() {
                response.detail_url = url.clone();
            }
        }
    }

    Some(response)
}
