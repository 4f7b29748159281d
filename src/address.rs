//! Street address normalization.
//!
//! An [`Address`] wraps the raw location string from a ticket and lazily
//! splits it into number, direction, suffix and street name. Directions and
//! suffixes are resolved through [`SynonymDictionary`] so that `801 KING ST W`
//! and `801 KING STREET WEST` compare equal.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use regex::Regex;

use crate::error::IngestResult;
use crate::synonyms::SynonymDictionary;

// ASCII whitespace only: a no-break space is a symbol, not a separator.
static NON_ADDRESS_SYMBOLS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^0-9A-Za-z \t\r\n\x0B\x0C]+").expect("failed to compile address symbol regex")
});
static STREET_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("failed to compile street number regex"));

static DEFAULT_PARSER: Lazy<AddressParser> = Lazy::new(|| {
    AddressParser::new(
        Arc::new(SynonymDictionary::directions().clone()),
        Arc::new(SynonymDictionary::suffixes().clone()),
    )
});

/// Strip everything except ASCII letters, digits and whitespace, then split
/// on whitespace runs.
pub fn tokenize(raw: &str) -> Vec<String> {
    NON_ADDRESS_SYMBOLS
        .replace_all(raw, "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Structured result of parsing an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressData {
    pub number: Option<String>,
    pub direction_token: Option<String>,
    pub direction: Option<String>,
    pub suffix_token: Option<String>,
    pub suffix: Option<String>,
    pub street_name: String,
}

impl AddressData {
    /// Map-style access by field name.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "number" => self.number.as_deref(),
            "direction_token" => self.direction_token.as_deref(),
            "direction" => self.direction.as_deref(),
            "suffix_token" => self.suffix_token.as_deref(),
            "suffix" => self.suffix.as_deref(),
            "street_name" => Some(&self.street_name),
            _ => None,
        }
    }

    /// The parts that define address identity.
    fn identity(&self) -> (Option<&str>, Option<&str>, Option<&str>, &str) {
        (
            self.number.as_deref(),
            self.direction.as_deref(),
            self.suffix.as_deref(),
            &self.street_name,
        )
    }
}

/// Resolves token lists into [`AddressData`] using a direction and a suffix
/// dictionary. Cheap to clone; the dictionaries are shared.
#[derive(Debug, Clone)]
pub struct AddressParser {
    directions: Arc<SynonymDictionary>,
    suffixes: Arc<SynonymDictionary>,
}

impl AddressParser {
    pub fn new(directions: Arc<SynonymDictionary>, suffixes: Arc<SynonymDictionary>) -> Self {
        Self {
            directions,
            suffixes,
        }
    }

    pub fn directions(&self) -> &SynonymDictionary {
        &self.directions
    }

    pub fn suffixes(&self) -> &SynonymDictionary {
        &self.suffixes
    }

    /// Extract number, trailing direction, trailing suffix and street name.
    ///
    /// Only the first purely numeric token is taken as the number. The
    /// direction and then the suffix are looked for in the last remaining
    /// token only, so words elsewhere in the name are never reclassified.
    pub fn parse_tokens(&self, tokens: &[String]) -> AddressData {
        let mut toks = tokens.to_vec();
        let mut data = AddressData::default();

        if let Some(idx) = toks.iter().position(|t| STREET_NUMBER.is_match(t)) {
            data.number = Some(toks.remove(idx));
        }

        if let Some(direction) = toks.last().and_then(|t| self.directions.resolve(t)) {
            data.direction = Some(direction.to_string());
            data.direction_token = toks.pop();
        }

        if let Some(suffix) = toks.last().and_then(|t| self.suffixes.resolve(t)) {
            data.suffix = Some(suffix.to_string());
            data.suffix_token = toks.pop();
        }

        data.street_name = toks.join(" ");
        data
    }

    pub fn parse(&self, raw: &str) -> AddressData {
        self.parse_tokens(&tokenize(raw))
    }

    /// Built-in tables, with either one replaced by a table file.
    pub fn load(directions: Option<&Path>, suffixes: Option<&Path>) -> IngestResult<Self> {
        let builtin = DEFAULT_PARSER.clone();
        let directions = match directions {
            Some(path) => Arc::new(SynonymDictionary::from_file(path)?),
            None => builtin.directions,
        };
        let suffixes = match suffixes {
            Some(path) => Arc::new(SynonymDictionary::from_file(path)?),
            None => builtin.suffixes,
        };
        Ok(Self::new(directions, suffixes))
    }
}

impl Default for AddressParser {
    fn default() -> Self {
        DEFAULT_PARSER.clone()
    }
}

/// A raw address string with memoized derived fields.
///
/// Tokens and parsed data are computed on first access and cached for the
/// lifetime of the value. Addresses are owned by the worker that parsed the
/// record, so the caches are unsynchronized.
#[derive(Clone)]
pub struct Address {
    raw: String,
    parser: AddressParser,
    tokens: OnceCell<Vec<String>>,
    data: OnceCell<AddressData>,
}

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self::with_parser(raw, AddressParser::default())
    }

    pub fn with_parser(raw: impl Into<String>, parser: AddressParser) -> Self {
        Self {
            raw: raw.into(),
            parser,
            tokens: OnceCell::new(),
            data: OnceCell::new(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[String] {
        self.tokens.get_or_init(|| tokenize(&self.raw))
    }

    pub fn data(&self) -> &AddressData {
        self.data
            .get_or_init(|| self.parser.parse_tokens(self.tokens()))
    }

    pub fn number(&self) -> Option<&str> {
        self.data().number.as_deref()
    }

    pub fn direction_token(&self) -> Option<&str> {
        self.data().direction_token.as_deref()
    }

    pub fn direction(&self) -> Option<&str> {
        self.data().direction.as_deref()
    }

    pub fn suffix_token(&self) -> Option<&str> {
        self.data().suffix_token.as_deref()
    }

    pub fn suffix(&self) -> Option<&str> {
        self.data().suffix.as_deref()
    }

    pub fn street_name(&self) -> &str {
        &self.data().street_name
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.data().identity() == other.data().identity()
    }
}

impl Eq for Address {}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address").field("raw", &self.raw).finish()
    }
}
