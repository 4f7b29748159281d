//! Synonym dictionaries for address normalization.
//!
//! A dictionary is an ordered list of synonym groups such as `WEST W`. Every
//! member of a group resolves to the group's first entry, its canonical form.
//! Dictionaries are built once and shared read-only by all worker threads.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::error::{IngestError, IngestResult};

const BUILTIN_DIRECTIONS: &str = include_str!("../data/directions.txt");
const BUILTIN_SUFFIXES: &str = include_str!("../data/suffixes.txt");

static DIRECTIONS: Lazy<SynonymDictionary> = Lazy::new(|| {
    SynonymDictionary::parse(BUILTIN_DIRECTIONS).expect("built-in direction table is valid")
});

static SUFFIXES: Lazy<SynonymDictionary> = Lazy::new(|| {
    SynonymDictionary::parse(BUILTIN_SUFFIXES).expect("built-in suffix table is valid")
});

/// One group of interchangeable tokens, canonical form first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymGroup {
    members: Vec<String>,
}

impl SynonymGroup {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members
                .into_iter()
                .map(|m| m.into().to_uppercase())
                .collect(),
        }
    }

    pub fn canonical(&self) -> Option<&str> {
        self.members.first().map(String::as_str)
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Whether `token` is one of this group's spellings.
    pub fn matches(&self, token: &str) -> bool {
        let upper = token.to_uppercase();
        self.members.iter().any(|m| *m == upper)
    }
}

/// Token -> canonical form lookup built from a list of synonym groups.
#[derive(Debug, Clone, Default)]
pub struct SynonymDictionary {
    groups: Vec<SynonymGroup>,
    index: HashMap<String, usize>,
}

impl SynonymDictionary {
    pub fn from_groups(groups: Vec<SynonymGroup>) -> Self {
        let mut index = HashMap::new();
        for (idx, group) in groups.iter().enumerate() {
            for member in group.members() {
                index.entry(member.clone()).or_insert(idx);
            }
        }
        Self { groups, index }
    }

    /// Parse a table with one whitespace-separated group per line.
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse(content: &str) -> IngestResult<Self> {
        let mut groups = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let group = SynonymGroup::new(line.split_whitespace());
            if group.members().iter().any(|m| m.contains(',')) {
                return Err(IngestError::Dictionary(format!(
                    "line {}: members must be separated by whitespace, not commas",
                    line_no + 1
                )));
            }
            groups.push(group);
        }
        Ok(Self::from_groups(groups))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> IngestResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Built-in compass direction table.
    pub fn directions() -> &'static SynonymDictionary {
        &DIRECTIONS
    }

    /// Built-in street suffix table.
    pub fn suffixes() -> &'static SynonymDictionary {
        &SUFFIXES
    }

    /// Canonical form for `token`, if any group contains it.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        let idx = match self.index.get(token) {
            Some(idx) => *idx,
            None => *self.index.get(&token.to_uppercase())?,
        };
        self.groups[idx].canonical()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.resolve(token).is_some()
    }

    pub fn groups(&self) -> &[SynonymGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
