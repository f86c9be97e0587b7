//! Typed conditional specs and their parsing.
//!
//! Condition literals arrive as JSON values. Comparator strings such as
//! `">=3"` are parsed here into [`Predicate::Comparator`], so nothing is
//! interpreted at sampling time.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Result, TabulaError};

static COMPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(<=|>=|==|!=|<|>|=)\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*$")
        .expect("comparator pattern is valid")
});

/// How a parent's buckets are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    /// Membership in a list of literals.
    Set,
    /// Numeric comparisons, all of which must hold.
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    fn parse(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            "=" | "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    pub fn apply(&self, value: f64, literal: f64) -> bool {
        match self {
            CompareOp::Lt => value < literal,
            CompareOp::Le => value <= literal,
            CompareOp::Gt => value > literal,
            CompareOp::Ge => value >= literal,
            CompareOp::Eq => value == literal,
            CompareOp::Ne => value != literal,
        }
    }
}

/// A single row test against one parent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    Comparator { op: CompareOp, literal: f64 },
    /// Upper-cased literals; a value matches if it equals any of them.
    SetMembership { values: Vec<String> },
}

impl Predicate {
    /// Parse a comparator string like `">=3"` or `"< 79.5"`.
    pub fn parse_comparator(text: &str) -> Result<Self> {
        let captures = COMPARATOR.captures(text).ok_or_else(|| {
            TabulaError::Config(format!("'{}' is not a comparison such as '>=3'", text))
        })?;
        let op = CompareOp::parse(&captures[1])
            .ok_or_else(|| TabulaError::Config(format!("unknown operator in '{}'", text)))?;
        let literal: f64 = captures[2]
            .parse()
            .map_err(|_| TabulaError::Config(format!("bad number in '{}'", text)))?;
        Ok(Predicate::Comparator { op, literal })
    }

    pub fn set_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Predicate::SetMembership {
            values: values.into_iter().map(|v| v.as_ref().to_uppercase()).collect(),
        }
    }

    pub fn matches_number(&self, value: f64) -> bool {
        match self {
            Predicate::Comparator { op, literal } => !value.is_nan() && op.apply(value, *literal),
            Predicate::SetMembership { .. } => false,
        }
    }

    /// `value` is expected upper-cased.
    pub fn matches_text(&self, value: &str) -> bool {
        match self {
            Predicate::SetMembership { values } => values.iter().any(|v| v == value),
            Predicate::Comparator { .. } => false,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparator { op, literal } => write!(f, "{}{}", op.symbol(), literal),
            Predicate::SetMembership { values } => write!(f, "in [{}]", values.join(", ")),
        }
    }
}

/// One numbered bucket of a parent. Every predicate must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub index: u32,
    pub predicates: Vec<Predicate>,
}

impl Bucket {
    pub fn matches_number(&self, value: f64) -> bool {
        self.predicates.iter().all(|p| p.matches_number(value))
    }

    pub fn matches_text(&self, value: &str) -> bool {
        self.predicates.iter().all(|p| p.matches_text(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentCondition {
    pub field: String,
    pub kind: ConditionKind,
    /// In declaration order.
    pub buckets: Vec<Bucket>,
}

/// Which channels condition the per-row resampling.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CovariateSelection {
    /// Sample the partition model unconditionally.
    #[default]
    Unconditioned,
    /// All output channels of these fields.
    Fields(Vec<String>),
    /// Channels whose absolute correlation with some child channel reaches this value.
    CorrelationThreshold(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChildSelection {
    /// Every encoded field that is not a parent.
    AllOthers,
    Fields(Vec<String>),
}

/// One conditional spec: parents, children and covariates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpec", into = "RawSpec")]
pub struct ConditionalSpec {
    pub enabled: bool,
    pub parents: Vec<ParentCondition>,
    pub covariates: CovariateSelection,
    pub children: ChildSelection,
}

impl ConditionalSpec {
    pub fn parent_fields(&self) -> Vec<String> {
        self.parents.iter().map(|p| p.field.clone()).collect()
    }

    /// Child fields given the encoded field names.
    pub fn resolve_children(&self, fields: &[String]) -> Result<Vec<String>> {
        let parents = self.parent_fields();
        match &self.children {
            ChildSelection::AllOthers => Ok(fields
                .iter()
                .filter(|f| !parents.contains(*f))
                .cloned()
                .collect()),
            ChildSelection::Fields(children) => {
                for child in children {
                    if parents.contains(child) {
                        return Err(TabulaError::Config(format!(
                            "field '{}' cannot be both a parent and a child",
                            child
                        )));
                    }
                    if !fields.contains(child) {
                        return Err(TabulaError::UnknownField(child.clone()));
                    }
                }
                Ok(children.clone())
            }
        }
    }
}

/// Named conditional specs, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionalSettings {
    specs: IndexMap<String, ConditionalSpec>,
}

impl ConditionalSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spec(mut self, name: impl Into<String>, spec: ConditionalSpec) -> Self {
        self.specs.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ConditionalSpec> {
        self.specs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConditionalSpec)> {
        self.specs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Specs that are switched on.
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &ConditionalSpec)> {
        self.iter().filter(|(_, spec)| spec.enabled)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Parse conditional specs from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TabulaError::Config(format!("invalid conditional settings: {}", e)))
    }

    /// Load conditional specs from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TabulaError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TabulaError::Config(format!(
                "invalid conditional settings in '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

// Wire form, as written in settings files.

fn enabled_by_default() -> bool {
    true
}

#[derive(Serialize, Deserialize)]
struct RawSpec {
    #[serde(rename = "bool", default = "enabled_by_default")]
    enabled: bool,
    parent_conditions: IndexMap<String, RawParent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    conditions_var: Option<RawCovariates>,
    children: RawChildren,
}

#[derive(Serialize, Deserialize)]
struct RawParent {
    condition: ConditionKind,
    condition_value: IndexMap<String, Vec<JsonValue>>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawCovariates {
    Fields(Vec<String>),
    Threshold(f64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawChildren {
    Fields(Vec<String>),
    Keyword(String),
}

const ALL_OTHERS: &str = "allOthers";

fn literal_text(field: &str, value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        other => Err(TabulaError::Config(format!(
            "unsupported condition literal {} for '{}'",
            other, field
        ))),
    }
}

fn parse_parent(field: String, raw: RawParent) -> Result<ParentCondition> {
    if raw.condition_value.is_empty() {
        return Err(TabulaError::Config(format!("parent '{}' has no buckets", field)));
    }
    let mut buckets = Vec::with_capacity(raw.condition_value.len());
    for (index, literals) in raw.condition_value {
        let index: u32 = index.trim().parse().map_err(|_| {
            TabulaError::Config(format!("bucket index '{}' of '{}' is not an integer", index, field))
        })?;
        if literals.is_empty() {
            return Err(TabulaError::Config(format!(
                "bucket {} of '{}' has no values",
                index, field
            )));
        }
        let texts = literals
            .iter()
            .map(|v| literal_text(&field, v))
            .collect::<Result<Vec<_>>>()?;
        let predicates = match raw.condition {
            ConditionKind::Set => vec![Predicate::set_of(&texts)],
            ConditionKind::Range => texts
                .iter()
                .map(|t| Predicate::parse_comparator(t))
                .collect::<Result<Vec<_>>>()?,
        };
        buckets.push(Bucket { index, predicates });
    }
    Ok(ParentCondition {
        field,
        kind: raw.condition,
        buckets,
    })
}

impl TryFrom<RawSpec> for ConditionalSpec {
    type Error = TabulaError;

    fn try_from(raw: RawSpec) -> Result<Self> {
        if raw.parent_conditions.is_empty() {
            return Err(TabulaError::Config(
                "conditional spec needs at least one parent".to_string(),
            ));
        }
        let parents = raw
            .parent_conditions
            .into_iter()
            .map(|(field, parent)| parse_parent(field, parent))
            .collect::<Result<Vec<_>>>()?;

        let covariates = match raw.conditions_var {
            None => CovariateSelection::Unconditioned,
            Some(RawCovariates::Fields(fields)) if fields.is_empty() => CovariateSelection::Unconditioned,
            Some(RawCovariates::Fields(fields)) => CovariateSelection::Fields(fields),
            Some(RawCovariates::Threshold(t)) if (0.0..=1.0).contains(&t) => {
                CovariateSelection::CorrelationThreshold(t)
            }
            Some(RawCovariates::Threshold(t)) => {
                return Err(TabulaError::Config(format!(
                    "correlation threshold {} is outside [0, 1]",
                    t
                )));
            }
        };

        let children = match raw.children {
            RawChildren::Keyword(k) if k == ALL_OTHERS => ChildSelection::AllOthers,
            RawChildren::Keyword(k) => {
                return Err(TabulaError::Config(format!(
                    "children must be a list of fields or '{}', got '{}'",
                    ALL_OTHERS, k
                )));
            }
            RawChildren::Fields(fields) if fields.is_empty() => {
                return Err(TabulaError::Config("children list is empty".to_string()));
            }
            RawChildren::Fields(fields) => ChildSelection::Fields(fields),
        };

        Ok(ConditionalSpec {
            enabled: raw.enabled,
            parents,
            covariates,
            children,
        })
    }
}

impl From<ConditionalSpec> for RawSpec {
    fn from(spec: ConditionalSpec) -> Self {
        let parent_conditions = spec
            .parents
            .into_iter()
            .map(|parent| {
                let condition_value = parent
                    .buckets
                    .into_iter()
                    .map(|bucket| {
                        let literals = bucket
                            .predicates
                            .iter()
                            .flat_map(|p| match p {
                                Predicate::SetMembership { values } => {
                                    values.iter().cloned().map(JsonValue::String).collect()
                                }
                                comparator => vec![JsonValue::String(comparator.to_string())],
                            })
                            .collect();
                        (bucket.index.to_string(), literals)
                    })
                    .collect();
                (
                    parent.field,
                    RawParent {
                        condition: parent.kind,
                        condition_value,
                    },
                )
            })
            .collect();

        RawSpec {
            enabled: spec.enabled,
            parent_conditions,
            conditions_var: match spec.covariates {
                CovariateSelection::Unconditioned => None,
                CovariateSelection::Fields(fields) => Some(RawCovariates::Fields(fields)),
                CovariateSelection::CorrelationThreshold(t) => Some(RawCovariates::Threshold(t)),
            },
            children: match spec.children {
                ChildSelection::AllOthers => RawChildren::Keyword(ALL_OTHERS.to_string()),
                ChildSelection::Fields(fields) => RawChildren::Fields(fields),
            },
        }
    }
}
