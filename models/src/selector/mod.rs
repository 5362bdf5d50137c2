//! Typed label selectors.
//!
//! A `LabelSelector` is a conjunction of `Requirement`s, each of which is a predicate over a single label key.
//! Selectors are parsed from the Kubernetes label selector syntax (e.g. `app=web,tier in (frontend,cache),!canary`)
//! and can be rendered back into that syntax to be sent along with list requests.
mod error;

pub use self::error::Error as SelectorError;
use self::error::Result;

use lazy_static::lazy_static;
use regex::Regex;
use snafu::ensure;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

const MAX_LABEL_NAME_LENGTH: usize = 63;
const MAX_KEY_PREFIX_LENGTH: usize = 253;

lazy_static! {
    // Names and values must begin and end with an alphanumeric character, with dashes, underscores and dots between.
    static ref LABEL_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("Invalid regex literal.");
    // Key prefixes are DNS-1123 subdomains.
    static ref KEY_PREFIX_RE: Regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("Invalid regex literal.");
    static ref SET_REQUIREMENT_RE: Regex =
        Regex::new(r"^(\S+)\s+(in|notin)\s*\(([^()]*)\)$").expect("Invalid regex literal.");
    static ref EQUALITY_REQUIREMENT_RE: Regex =
        Regex::new(r"^([^\s!=]+)\s*(==|!=|=)\s*(\S*)$").expect("Invalid regex literal.");
    static ref EXISTENCE_REQUIREMENT_RE: Regex =
        Regex::new(r"^(!?)\s*([^\s!=()]+)$").expect("Invalid regex literal.");
}

/// The predicate a `Requirement` applies to the value of its label key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operator {
    /// The label is present with exactly this value.
    Equals(String),
    /// The label is absent, or present with any other value.
    NotEquals(String),
    /// The label is present with one of these values.
    In(BTreeSet<String>),
    /// The label is absent, or present with a value outside of this set.
    NotIn(BTreeSet<String>),
    /// The label is present, with any value.
    Exists,
    /// The label is absent.
    DoesNotExist,
}

/// A single predicate over one label key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Requirement {
    key: String,
    operator: Operator,
}

impl Requirement {
    pub fn new(key: &str, operator: Operator) -> Result<Self> {
        validate_key(key)?;
        match &operator {
            Operator::Equals(value) | Operator::NotEquals(value) => validate_value(key, value)?,
            Operator::In(values) | Operator::NotIn(values) => {
                ensure!(!values.is_empty(), error::EmptyValueSetSnafu { key });
                for value in values {
                    validate_value(key, value)?;
                }
            }
            Operator::Exists | Operator::DoesNotExist => {}
        }

        Ok(Requirement {
            key: key.to_string(),
            operator,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Returns whether or not the given label set satisfies this requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match &self.operator {
            Operator::Equals(expected) => value == Some(expected),
            Operator::NotEquals(expected) => value != Some(expected),
            Operator::In(values) => value.map_or(false, |v| values.contains(v)),
            Operator::NotIn(values) => value.map_or(true, |v| !values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operator {
            Operator::Equals(value) => write!(f, "{}={}", self.key, value),
            Operator::NotEquals(value) => write!(f, "{}!={}", self.key, value),
            Operator::In(values) => write!(f, "{} in ({})", self.key, join_values(values)),
            Operator::NotIn(values) => write!(f, "{} notin ({})", self.key, join_values(values)),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A conjunction of label requirements. The empty selector matches every label set.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// A selector which matches everything.
    pub fn everything() -> Self {
        LabelSelector::default()
    }

    /// Creates a selector requiring every key/value pair of the given set to be present.
    ///
    /// This is how replication controllers select their pods. The keys are not re-validated, since they come from
    /// objects already accepted by the API server.
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        LabelSelector {
            requirements: labels
                .iter()
                .map(|(key, value)| Requirement {
                    key: key.clone(),
                    operator: Operator::Equals(value.clone()),
                })
                .collect(),
        }
    }

    /// Parses a selector written in the Kubernetes label selector syntax.
    pub fn parse(selector: &str) -> Result<Self> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Ok(LabelSelector::everything());
        }

        let requirements = split_requirements(trimmed)?
            .into_iter()
            .map(|requirement| {
                let requirement = requirement.trim();
                ensure!(
                    !requirement.is_empty(),
                    error::EmptyRequirementSnafu { selector }
                );
                parse_requirement(requirement)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LabelSelector { requirements })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_everything(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Returns whether or not the given label set satisfies every requirement of this selector.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements
            .iter()
            .all(|requirement| requirement.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self> {
        LabelSelector::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", rendered.join(","))
    }
}

/// Splits a selector on the commas which separate requirements, ignoring commas inside of value sets.
fn split_requirements(selector: &str) -> Result<Vec<&str>> {
    let mut requirements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (index, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| error::UnbalancedParenthesesSnafu { selector }.build())?;
            }
            ',' if depth == 0 => {
                requirements.push(&selector[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    ensure!(depth == 0, error::UnbalancedParenthesesSnafu { selector });
    requirements.push(&selector[start..]);

    Ok(requirements)
}

fn parse_requirement(requirement: &str) -> Result<Requirement> {
    if let Some(captures) = SET_REQUIREMENT_RE.captures(requirement) {
        let key = &captures[1];
        let values_str = captures[3].trim();
        ensure!(!values_str.is_empty(), error::EmptyValueSetSnafu { key });

        let values: BTreeSet<String> = values_str
            .split(',')
            .map(|value| value.trim().to_string())
            .collect();
        let operator = match &captures[2] {
            "in" => Operator::In(values),
            _ => Operator::NotIn(values),
        };
        return Requirement::new(key, operator);
    }

    if let Some(captures) = EQUALITY_REQUIREMENT_RE.captures(requirement) {
        let value = captures[3].to_string();
        let operator = match &captures[2] {
            "!=" => Operator::NotEquals(value),
            _ => Operator::Equals(value),
        };
        return Requirement::new(&captures[1], operator);
    }

    if let Some(captures) = EXISTENCE_REQUIREMENT_RE.captures(requirement) {
        let operator = if captures[1].is_empty() {
            Operator::Exists
        } else {
            Operator::DoesNotExist
        };
        return Requirement::new(&captures[2], operator);
    }

    error::InvalidRequirementSnafu { requirement }.fail()
}

/// Label keys are an optional DNS subdomain prefix followed by a slash, and a name.
fn validate_key(key: &str) -> Result<()> {
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            ensure!(
                !prefix.is_empty() && prefix.len() <= MAX_KEY_PREFIX_LENGTH,
                error::InvalidKeySnafu {
                    key,
                    reason: format!(
                        "prefix must be between 1 and {} characters",
                        MAX_KEY_PREFIX_LENGTH
                    ),
                }
            );
            ensure!(
                KEY_PREFIX_RE.is_match(prefix),
                error::InvalidKeySnafu {
                    key,
                    reason: "prefix must be a DNS subdomain",
                }
            );
            name
        }
        None => key,
    };

    ensure!(
        !name.is_empty() && name.len() <= MAX_LABEL_NAME_LENGTH,
        error::InvalidKeySnafu {
            key,
            reason: format!(
                "name must be between 1 and {} characters",
                MAX_LABEL_NAME_LENGTH
            ),
        }
    );
    ensure!(
        LABEL_NAME_RE.is_match(name),
        error::InvalidKeySnafu {
            key,
            reason: "name must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character",
        }
    );
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<()> {
    ensure!(
        value.is_empty()
            || (value.len() <= MAX_LABEL_NAME_LENGTH && LABEL_NAME_RE.is_match(value)),
        error::InvalidValueSnafu { key, value }
    );
    Ok(())
}

fn join_values(values: &BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(",")
}
