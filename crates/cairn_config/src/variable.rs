//! Variable trees.
//!
//! Site and site-component `variables` and `secrets` are parsed into a tree of
//! [`Variable`] nodes. Leaves are scalars that may contain
//! `${component.<name>.<output>}` references to another component's outputs.
//! Map children are kept in key order so every traversal is deterministic.

use crate::error::{ConfigError, ConfigResult};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

static COMPONENT_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{(component(?:\.[^}]+)+)\}").expect("component reference pattern is valid")
});

/// Kind of a variable node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Leaf value
    Scalar,
    /// Keyed children
    Map,
    /// Ordered children
    Sequence,
}

/// A node in a variable tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Variable {
    /// Leaf holding a raw value (string, number, bool or null)
    Scalar(Value),
    /// Keyed children
    Map(BTreeMap<String, Variable>),
    /// Ordered children
    Sequence(Vec<Variable>),
}

impl Variable {
    /// Build a variable tree from a nested value
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_value(v)))
                    .collect(),
            ),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from_value).collect()),
            scalar => Self::Scalar(scalar),
        }
    }

    /// Create a string scalar
    #[must_use]
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(Value::String(value.into()))
    }

    /// Node kind
    #[must_use]
    pub const fn variable_type(&self) -> VariableType {
        match self {
            Self::Scalar(_) => VariableType::Scalar,
            Self::Map(_) => VariableType::Map,
            Self::Sequence(_) => VariableType::Sequence,
        }
    }

    /// Apply `f` to every scalar leaf and rebuild a plain nested value.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`; no partial value is returned
    pub fn transform<F, E>(&self, f: &mut F) -> Result<Value, E>
    where
        F: FnMut(&Value) -> Result<Value, E>,
    {
        match self {
            Self::Scalar(value) => f(value),
            Self::Map(children) => {
                let mut out = Map::with_capacity(children.len());
                for (key, child) in children {
                    out.insert(key.clone(), child.transform(&mut *f)?);
                }
                Ok(Value::Object(out))
            }
            Self::Sequence(children) => {
                let mut out = Vec::with_capacity(children.len());
                for child in children {
                    out.push(child.transform(&mut *f)?);
                }
                Ok(Value::Array(out))
            }
        }
    }

    /// Components referenced anywhere in this tree, first-seen order.
    ///
    /// # Errors
    ///
    /// Returns error if a reference lacks the output segment
    pub fn referenced_components(&self) -> ConfigResult<Vec<String>> {
        let mut seen = IndexSet::new();
        self.collect_references(&mut seen)?;
        Ok(seen.into_iter().collect())
    }

    fn collect_references(&self, seen: &mut IndexSet<String>) -> ConfigResult<()> {
        match self {
            Self::Scalar(Value::String(text)) => {
                for reference in parse_references(text)? {
                    seen.insert(reference.component);
                }
                Ok(())
            }
            Self::Scalar(_) => Ok(()),
            Self::Map(children) => children
                .values()
                .try_for_each(|child| child.collect_references(seen)),
            Self::Sequence(children) => children
                .iter()
                .try_for_each(|child| child.collect_references(seen)),
        }
    }
}

impl From<Value> for Variable {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<Variable> for Value {
    fn from(variable: Variable) -> Self {
        match variable {
            Variable::Scalar(value) => value,
            Variable::Map(children) => Value::Object(
                children
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            Variable::Sequence(children) => {
                Value::Array(children.into_iter().map(Value::from).collect())
            }
        }
    }
}

/// Top-level `variables` or `secrets` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariablesMap(BTreeMap<String, Variable>);

impl VariablesMap {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, value: Variable) -> Option<Variable> {
        self.0.insert(key.into(), value)
    }

    /// Get a variable by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.0.get(key)
    }

    /// Number of top-level entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.0.iter()
    }

    /// Apply `f` to every scalar leaf and rebuild a plain nested map.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`; no partial map is returned
    pub fn transform<F, E>(&self, mut f: F) -> Result<Map<String, Value>, E>
    where
        F: FnMut(&Value) -> Result<Value, E>,
    {
        let mut out = Map::with_capacity(self.0.len());
        for (key, variable) in &self.0 {
            out.insert(key.clone(), variable.transform(&mut f)?);
        }
        Ok(out)
    }

    /// Components referenced by any entry, deduplicated in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns error naming the first malformed reference
    pub fn list_referenced_components(&self) -> ConfigResult<Vec<String>> {
        let mut seen = IndexSet::new();
        for variable in self.0.values() {
            variable.collect_references(&mut seen)?;
        }
        Ok(seen.into_iter().collect())
    }

    /// Materialize the map with every component reference rewritten to the
    /// module output it resolves to.
    ///
    /// # Errors
    ///
    /// Returns error naming the first malformed reference
    pub fn interpolated(&self) -> ConfigResult<Map<String, Value>> {
        self.transform(|value| match value {
            Value::String(text) => interpolate_component_refs(text).map(Value::String),
            other => Ok(other.clone()),
        })
    }
}

impl FromIterator<(String, Variable)> for VariablesMap {
    fn from_iter<I: IntoIterator<Item = (String, Variable)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Map<String, Value>> for VariablesMap {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter()
            .map(|(k, v)| (k, Variable::from_value(v)))
            .collect()
    }
}

/// Merge several maps; later maps win. Only the first level is merged,
/// nested maps are replaced as a whole.
#[must_use]
pub fn merge_variables_maps<'a, I>(maps: I) -> VariablesMap
where
    I: IntoIterator<Item = &'a VariablesMap>,
{
    let mut result = VariablesMap::new();
    for map in maps {
        for (key, value) in map.iter() {
            result.insert(key.clone(), value.clone());
        }
    }
    result
}

/// Rewrite every `${component.<name>.<output>}` into
/// `${module.<name>.<output>}`.
///
/// # Errors
///
/// Returns error if a reference lacks the output segment
pub fn interpolate_component_refs(text: &str) -> ConfigResult<String> {
    let mut result = text.to_string();
    for reference in parse_references(text)? {
        let replacement = format!("${{module.{}.{}}}", reference.component, reference.output);
        result = result.replace(&reference.raw, &replacement);
    }
    Ok(result)
}

struct ComponentRef {
    raw: String,
    component: String,
    output: String,
}

fn parse_references(text: &str) -> ConfigResult<Vec<ComponentRef>> {
    COMPONENT_REF
        .captures_iter(text)
        .map(|caps| {
            let inner = &caps[1];
            let parts: Vec<&str> = inner.splitn(3, '.').collect();
            match parts.as_slice() {
                [_, component, output] if !component.is_empty() && !output.is_empty() => {
                    Ok(ComponentRef {
                        raw: caps[0].to_string(),
                        component: (*component).to_string(),
                        output: (*output).to_string(),
                    })
                }
                _ => Err(ConfigError::MalformedReference {
                    text: inner.to_string(),
                }),
            }
        })
        .collect()
}
