use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use toml::{Table, Value};
use umsatz_core::{AccountError, Record, RecordError, RecordField};

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to parse rule file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("'{0}' must be a list of rules")]
    NotAList(String),
    #[error("Rule #{index} of '{identifier}' is not a table")]
    NotARule { identifier: String, index: usize },
    #[error("Pattern for '{field}' in '{identifier}' is not a string")]
    PatternNotAString { identifier: String, field: String },
    #[error("Unknown record field '{field}' in '{identifier}'")]
    UnknownField { identifier: String, field: String },
    #[error("Invalid pattern in '{identifier}': {source}")]
    InvalidPattern {
        identifier: String,
        source: regex::Error,
    },
    #[error("Identifier '{0}' is defined more than once")]
    DuplicateIdentifier(String),
    #[error("Identifier '{identifier}' has {depth} components, expected 1 or 2")]
    IdentifierDepth { identifier: String, depth: usize },
    #[error("Capture group '{group}' in '{identifier}' is not a record field")]
    UnknownCaptureGroup { identifier: String, group: String },
    #[error("Capture group in '{identifier}' writes read-only field '{field}'")]
    ReadOnlyCapture {
        identifier: String,
        field: RecordField,
    },
    #[error("Identifier '{identifier}' is not an account: {source}")]
    InvalidAccount {
        identifier: String,
        source: AccountError,
    },
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// A field must contain a match of `pattern` (case-insensitive search).
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: RecordField,
    pub pattern: Regex,
}

/// All conditions must hold. A rule without conditions matches every record.
#[derive(Debug, Clone, Default)]
pub struct Rule {
    pub conditions: Vec<Condition>,
}

/// Named capture group value from a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub name: String,
    pub value: String,
}

impl Rule {
    /// Captures of every named group that took part in the match, or `None`
    /// when some condition fails.
    pub fn captures(&self, record: &Record) -> Option<Vec<Capture>> {
        let mut found = Vec::new();
        for condition in &self.conditions {
            let caps = condition.pattern.captures(record.get(condition.field))?;
            for name in condition.pattern.capture_names().flatten() {
                if let Some(m) = caps.name(name) {
                    found.push(Capture {
                        name: name.to_string(),
                        value: m.as_str().to_string(),
                    });
                }
            }
        }
        Some(found)
    }

    /// Every group name declared by the rule's patterns, matched or not.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.conditions
            .iter()
            .flat_map(|c| c.pattern.capture_names().flatten())
    }
}

/// Flat, ordered mapping from colon-joined identifiers to rule lists.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    entries: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    pub fn from_path(path: &Path) -> Result<Self, RuleError> {
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.entries
            .iter()
            .map(|(identifier, rules)| (identifier.as_str(), rules.as_slice()))
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(identifier, _)| identifier.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for RuleSet {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let document: Table = s.parse()?;
        let mut entries = Vec::new();
        flatten(&document, &mut Vec::new(), &mut entries)?;

        let mut seen = HashSet::new();
        for (identifier, _) in &entries {
            if !seen.insert(identifier.as_str()) {
                return Err(RuleError::DuplicateIdentifier(identifier.clone()));
            }
        }
        Ok(Self { entries })
    }
}

/// Number of colon-separated components in `identifier`.
pub fn depth(identifier: &str) -> usize {
    identifier.split(':').count()
}

fn flatten<'a>(
    table: &'a Table,
    path: &mut Vec<&'a str>,
    out: &mut Vec<(String, Vec<Rule>)>,
) -> Result<(), RuleError> {
    for (key, value) in table {
        path.push(key);
        match value {
            Value::Table(inner) => flatten(inner, path, out)?,
            Value::Array(items) => {
                let identifier = path.join(":");
                let rules = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| compile_rule(&identifier, index, item))
                    .collect::<Result<_, _>>()?;
                out.push((identifier, rules));
            }
            _ => return Err(RuleError::NotAList(path.join(":"))),
        }
        path.pop();
    }
    Ok(())
}

fn compile_rule(identifier: &str, index: usize, item: &Value) -> Result<Rule, RuleError> {
    let Value::Table(conditions) = item else {
        return Err(RuleError::NotARule {
            identifier: identifier.to_string(),
            index,
        });
    };
    let conditions = conditions
        .iter()
        .map(|(key, value)| {
            let field = key.parse::<RecordField>().map_err(|_| RuleError::UnknownField {
                identifier: identifier.to_string(),
                field: key.clone(),
            })?;
            let Value::String(pattern) = value else {
                return Err(RuleError::PatternNotAString {
                    identifier: identifier.to_string(),
                    field: key.clone(),
                });
            };
            let pattern = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    identifier: identifier.to_string(),
                    source,
                })?;
            Ok(Condition { field, pattern })
        })
        .collect::<Result<_, _>>()?;
    Ok(Rule { conditions })
}
