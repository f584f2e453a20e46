use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

use crate::core::error::TransformError;
use crate::utils::validation::is_valid_reference_name;

/// What a source reference becomes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Keep the reference under a new (or the same) name
    Rename(String),
    /// Remove the reference and every record placed on it
    Drop,
}

// Serialized the same way map files spell it: a string, or null for drop.
impl Serialize for Target {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Target::Rename(name) => s.serialize_str(name),
            Target::Drop => s.serialize_none(),
        }
    }
}

impl Target {
    #[must_use]
    pub fn new_name(&self) -> Option<&str> {
        match self {
            Target::Rename(name) => Some(name),
            Target::Drop => None,
        }
    }
}

/// Old reference name → new name or drop.
///
/// No two sources may share a target name; that would silently merge two
/// reference sequences under one id. The check happens at construction, so
/// a `SubstitutionMap` that exists is always unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubstitutionMap {
    entries: IndexMap<String, Target>,
}

impl SubstitutionMap {
    /// Build a map from `(old, target)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `TransformError::AmbiguousTarget` if two sources share a
    /// target name, or `TransformError::InvalidMap` if a source is listed
    /// twice or a target is not a valid reference name.
    pub fn new<I, S>(pairs: I) -> Result<Self, TransformError>
    where
        I: IntoIterator<Item = (S, Target)>,
        S: Into<String>,
    {
        let mut entries: IndexMap<String, Target> = IndexMap::new();
        let mut claimed: HashMap<String, String> = HashMap::new();

        for (source, target) in pairs {
            let source = source.into();

            if let Target::Rename(name) = &target {
                if !is_valid_reference_name(name) {
                    return Err(TransformError::InvalidMap(format!(
                        "'{name}' is not a valid reference name (target of '{source}')"
                    )));
                }
                if let Some(first) = claimed.get(name) {
                    return Err(TransformError::AmbiguousTarget {
                        target: name.clone(),
                        first: first.clone(),
                        second: source,
                    });
                }
                claimed.insert(name.clone(), source.clone());
            }

            if entries.contains_key(&source) {
                return Err(TransformError::InvalidMap(format!(
                    "'{source}' is listed more than once"
                )));
            }
            entries.insert(source, target);
        }

        Ok(Self { entries })
    }

    /// Convenience constructor for pure renames
    ///
    /// # Errors
    ///
    /// Same as [`SubstitutionMap::new`].
    pub fn renames<I, S, T>(pairs: I) -> Result<Self, TransformError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(s, t)| (s, Target::Rename(t.into()))),
        )
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Target)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The map with sources and targets swapped. Drop entries have no inverse
    /// and are left out.
    #[must_use]
    pub fn inverse(&self) -> Self {
        // Targets are unique, so swapping cannot produce an ambiguous map.
        let entries = self
            .entries
            .iter()
            .filter_map(|(source, target)| match target {
                Target::Rename(name) => Some((name.clone(), Target::Rename(source.clone()))),
                Target::Drop => None,
            })
            .collect();
        Self { entries }
    }
}
