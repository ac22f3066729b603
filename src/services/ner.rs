//! Named Entity Recognition over serialized entries.
//!
//! Provides a `NerBackend` trait for pluggable tagging backends, a built-in
//! `RuleNerBackend` that needs no model files, and `HttpNerBackend` for a
//! remote statistical tagger. Backends return the token sequence together with
//! token-indexed entity spans so callers can re-walk the tokens in order.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::ServiceError;
use super::http::ServiceClient;

/// A single token of the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    /// Whether the token reads like a number ("24", "3.5", "1,000", "ten").
    pub like_num: bool,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let like_num = like_num(&text);
        Self { text, like_num }
    }
}

/// An entity covering tokens `start..end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

/// Tokens plus entity spans for one input text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NerDoc {
    pub tokens: Vec<Token>,
    pub entities: Vec<EntitySpan>,
}

/// Trait for pluggable NER backends.
#[async_trait]
pub trait NerBackend: Send + Sync {
    /// Human-readable backend identifier (e.g. "rule", "http").
    fn backend_id(&self) -> &str;

    /// Whether the backend can serve requests.
    async fn is_available(&self) -> bool {
        true
    }

    /// Human-readable reason when `is_available` returns false.
    fn availability_hint(&self) -> String {
        String::new()
    }

    /// Tokenize and tag `text`.
    async fn analyze(&self, text: &str) -> Result<NerDoc, ServiceError>;
}

// ============================================================================
// Tokenization
// ============================================================================

const PREFIX_CHARS: &[char] = &['"', '\'', '(', '[', '{', '<', '$', '€', '£', '#'];
const SUFFIX_CHARS: &[char] = &['"', '\'', ')', ']', '}', '>', ',', ';', ':', '!', '?', '%'];

static ABBREVIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z]\.)+[A-Za-z]?$").expect("abbreviation pattern should compile")
});

/// Split text on whitespace, peeling leading and trailing punctuation into
/// separate tokens. Sentence-final periods are split off except on
/// abbreviations ("u.s.") and numbers ("3.").
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for chunk in text.split_whitespace() {
        let mut rest = chunk;

        while let Some(c) = rest.chars().next() {
            if rest.chars().count() > 1 && PREFIX_CHARS.contains(&c) {
                tokens.push(c.to_string());
                rest = &rest[c.len_utf8()..];
            } else {
                break;
            }
        }

        let mut suffixes = Vec::new();
        while let Some(c) = rest.chars().last() {
            if rest.chars().count() <= 1 {
                break;
            }
            let body = &rest[..rest.len() - c.len_utf8()];
            let peel = SUFFIX_CHARS.contains(&c)
                || (c == '.'
                    && !ABBREVIATION.is_match(rest)
                    && !like_num(body)
                    && body.chars().last().is_some_and(|b| b.is_alphanumeric()));
            if !peel {
                break;
            }
            suffixes.push(c.to_string());
            rest = body;
        }

        if !rest.is_empty() {
            tokens.push(rest.to_string());
        }
        tokens.extend(suffixes.into_iter().rev());
    }

    tokens
}

static NUMBER_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
        "nineteen", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
        "hundred", "thousand", "million", "billion", "trillion", "quadrillion",
    ]
    .into_iter()
    .collect()
});

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_numeric())
}

/// Whether a token reads like a number.
///
/// Accepts signed digit strings with `,`/`.` separators, simple fractions
/// ("1/2"), digit ordinals ("21st") and English number words.
pub fn like_num(text: &str) -> bool {
    let text = text
        .strip_prefix(['+', '-', '±', '~'])
        .unwrap_or(text);
    let stripped: String = text.chars().filter(|c| *c != ',' && *c != '.').collect();
    if is_digits(&stripped) {
        return true;
    }

    if let Some((num, denom)) = stripped.split_once('/') {
        if is_digits(num) && is_digits(denom) {
            return true;
        }
    }

    let lower = text.to_lowercase();
    if NUMBER_WORDS.contains(lower.as_str()) {
        return true;
    }

    ["st", "nd", "rd", "th"]
        .iter()
        .any(|suffix| lower.strip_suffix(suffix).is_some_and(is_digits))
}

// ============================================================================
// RuleNerBackend: built-in, model-free tagger
// ============================================================================

static MONTHS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug",
        "sep", "sept", "oct", "nov", "dec",
    ]
    .into_iter()
    .collect()
});

static UNITS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "kg", "g", "mg", "lb", "lbs", "oz", "ounce", "ounces", "pound", "pounds", "mm", "cm",
        "m", "km", "in", "inch", "inches", "ft", "feet", "gb", "mb", "tb", "kb", "ghz", "mhz",
        "w", "watt", "watts", "v", "volt", "volts", "mah", "ml", "l", "liter", "liters", "qt",
        "gal", "rpm",
    ]
    .into_iter()
    .collect()
});

static CURRENCY_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["dollar", "dollars", "usd", "euro", "euros", "eur", "pounds sterling", "gbp"]
        .into_iter()
        .collect()
});

static ORG_SUFFIXES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "inc", "inc.", "corp", "corp.", "corporation", "ltd", "ltd.", "llc", "co.", "company",
        "gmbh", "plc", "ag", "s.a.",
    ]
    .into_iter()
    .collect()
});

static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}-\d{1,2}-\d{1,2}|\d{1,2}/\d{1,2}/\d{2,4})$")
        .expect("date pattern should compile")
});

static TIME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d{1,2}:\d{2}(?::\d{2})?(?:am|pm)?$|^\d{1,2}(?:am|pm)$")
        .expect("time pattern should compile")
});

static UNIT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+(?:\.\d+)?(kg|g|mg|lbs?|oz|mm|cm|km|in|ft|gb|mb|tb|kb|ghz|mhz|w|v|mah|ml|l)$")
        .expect("unit pattern should compile")
});

fn is_year(text: &str) -> bool {
    text.len() == 4
        && text
            .parse::<u32>()
            .is_ok_and(|y| (1900..=2099).contains(&y))
}

fn is_day(text: &str) -> bool {
    let text = text.trim_end_matches(',');
    text.parse::<u32>().is_ok_and(|d| (1..=31).contains(&d))
}

/// Rule-based NER backend.
///
/// Tags the entity types that can be recognized from token shape alone:
/// dates, times, quantities with units, money, percentages, bare numbers
/// (CARDINAL) and organizations ending in a corporate suffix. No model files
/// or network access required.
pub struct RuleNerBackend;

impl RuleNerBackend {
    pub fn new() -> Self {
        Self
    }

    /// Tag pre-tokenized text.
    pub fn tag(&self, tokens: &[Token]) -> Vec<EntitySpan> {
        let lower: Vec<String> = tokens.iter().map(|t| t.text.to_lowercase()).collect();
        let mut entities = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            match match_entity(tokens, &lower, i) {
                Some((end, label)) => {
                    entities.push(EntitySpan {
                        start: i,
                        end,
                        label: label.to_string(),
                    });
                    i = end;
                }
                None => i += 1,
            }
        }

        entities
    }
}

impl Default for RuleNerBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Try each rule at token `i`, returning the exclusive end index and label.
fn match_entity(tokens: &[Token], lower: &[String], i: usize) -> Option<(usize, &'static str)> {
    let cur = lower[i].as_str();
    let next = lower.get(i + 1).map(String::as_str);

    // Month [day] [year]
    if MONTHS.contains(cur.trim_end_matches('.')) && cur.len() > 2 {
        let mut end = i + 1;
        if lower.get(end).is_some_and(|t| is_day(t)) {
            end += 1;
        }
        if lower.get(end).is_some_and(|t| is_year(t)) {
            end += 1;
        }
        if end > i + 1 {
            return Some((end, "DATE"));
        }
    }
    if DATE_TOKEN.is_match(cur) || is_year(cur) {
        return Some((i + 1, "DATE"));
    }

    if TIME_TOKEN.is_match(cur) {
        return Some((i + 1, "TIME"));
    }
    if tokens[i].like_num && matches!(next, Some("am" | "pm" | "a.m." | "p.m.")) {
        return Some((i + 2, "TIME"));
    }

    if matches!(cur, "$" | "€" | "£") && lower.get(i + 1).is_some() && tokens[i + 1].like_num {
        return Some((i + 2, "MONEY"));
    }

    if tokens[i].like_num {
        match next {
            Some("%" | "percent") => return Some((i + 2, "PERCENT")),
            Some(n) if CURRENCY_WORDS.contains(n) => return Some((i + 2, "MONEY")),
            Some(n) if UNITS.contains(n.trim_end_matches('.')) => {
                return Some((i + 2, "QUANTITY"))
            }
            _ => {}
        }
    }
    if UNIT_TOKEN.is_match(cur) {
        return Some((i + 1, "QUANTITY"));
    }

    if let Some(n) = next {
        if ORG_SUFFIXES.contains(n) && tokens[i].text.chars().any(|c| c.is_alphabetic()) {
            return Some((i + 2, "ORG"));
        }
    }

    if tokens[i].like_num {
        return Some((i + 1, "CARDINAL"));
    }

    None
}

#[async_trait]
impl NerBackend for RuleNerBackend {
    fn backend_id(&self) -> &str {
        "rule"
    }

    async fn analyze(&self, text: &str) -> Result<NerDoc, ServiceError> {
        let tokens: Vec<Token> = tokenize(text).into_iter().map(Token::new).collect();
        let entities = self.tag(&tokens);
        Ok(NerDoc { tokens, entities })
    }
}

// ============================================================================
// HttpNerBackend: remote statistical tagger
// ============================================================================

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    tokens: Vec<RemoteToken>,
    #[serde(default)]
    ents: Vec<EntitySpan>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteToken {
    Text(String),
    Full {
        text: String,
        #[serde(default)]
        like_num: Option<bool>,
    },
}

impl From<RemoteToken> for Token {
    fn from(token: RemoteToken) -> Self {
        match token {
            RemoteToken::Text(text) => Token::new(text),
            RemoteToken::Full {
                text,
                like_num: Some(like_num),
            } => Token { text, like_num },
            RemoteToken::Full {
                text,
                like_num: None,
            } => Token::new(text),
        }
    }
}

/// NER backend that delegates to a remote tagger.
///
/// Expects `POST {endpoint}/ner` with `{"text": ...}` to return
/// `{"tokens": [...], "ents": [{"start", "end", "label"}]}` where entity
/// offsets are token indices.
pub struct HttpNerBackend {
    client: ServiceClient,
}

impl HttpNerBackend {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(endpoint, timeout_secs)?,
        })
    }
}

#[async_trait]
impl NerBackend for HttpNerBackend {
    fn backend_id(&self) -> &str {
        "http"
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    fn availability_hint(&self) -> String {
        self.client.availability_hint()
    }

    async fn analyze(&self, text: &str) -> Result<NerDoc, ServiceError> {
        let resp: NerResponse = self.client.post_json("ner", &NerRequest { text }).await?;
        let tokens: Vec<Token> = resp.tokens.into_iter().map(Token::from).collect();

        if let Some(bad) = resp.ents.iter().find(|e| e.start > e.end || e.end > tokens.len()) {
            return Err(ServiceError::Parse(format!(
                "entity span {}..{} out of range for {} tokens",
                bad.start,
                bad.end,
                tokens.len()
            )));
        }

        Ok(NerDoc {
            tokens,
            entities: resp.ents,
        })
    }
}
