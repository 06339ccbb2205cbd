//! Surface labels and label sets.
//!
//! A [`Label`] is MNE's `Label` reduced to what parcellation building needs:
//! a name of the form `"{region}-{hemi}"`, the set of surface vertices it
//! covers and a display color. Vertex positions and values are not carried.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::Rgba;

// ── Hemisphere ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    Lh,
    Rh,
}

impl Hemisphere {
    /// Both hemispheres, left first.
    pub const BOTH: [Hemisphere; 2] = [Hemisphere::Lh, Hemisphere::Rh];

    pub fn as_str(self) -> &'static str {
        match self {
            Hemisphere::Lh => "lh",
            Hemisphere::Rh => "rh",
        }
    }

    /// Label name suffix, e.g. `"-lh"`.
    pub fn suffix(self) -> &'static str {
        match self {
            Hemisphere::Lh => "-lh",
            Hemisphere::Rh => "-rh",
        }
    }

    /// Hemisphere encoded in a label name's suffix, if any.
    pub fn of_label_name(name: &str) -> Option<Self> {
        Self::BOTH.into_iter().find(|h| name.ends_with(h.suffix()))
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hemisphere {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lh" => Ok(Hemisphere::Lh),
            "rh" => Ok(Hemisphere::Rh),
            other => Err(LabelError::UnknownHemisphere(other.to_string())),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("unknown hemisphere {0:?} (expected \"lh\" or \"rh\")")]
    UnknownHemisphere(String),
    #[error("cannot merge an empty list of labels")]
    EmptyMerge,
    #[error("cannot merge {other} into {label}: labels are on different hemispheres")]
    HemisphereMismatch { label: String, other: String },
}

// ── Label ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// `"{region}-{hemi}"`.
    pub name: String,
    pub hemi: Hemisphere,
    /// Surface vertex indices, sorted and unique.
    pub vertices: BTreeSet<u32>,
    pub color: Rgba,
}

impl Label {
    pub fn new<I>(name: impl Into<String>, hemi: Hemisphere, vertices: I, color: Rgba) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        Self {
            name: name.into(),
            hemi,
            vertices: vertices.into_iter().collect(),
            color,
        }
    }

    /// The part of the name before the first `-`, e.g. `"precentral_2"` for
    /// `"precentral_2-lh"`.
    pub fn region(&self) -> &str {
        self.name.split('-').next().unwrap_or(&self.name)
    }

    /// Add `other`'s vertices to this label. Name and color are left alone.
    pub fn union_with(&mut self, other: &Label) -> Result<(), LabelError> {
        if other.hemi != self.hemi {
            return Err(LabelError::HemisphereMismatch {
                label: self.name.clone(),
                other: other.name.clone(),
            });
        }
        self.vertices.extend(other.vertices.iter().copied());
        Ok(())
    }

    /// Union of `labels`, seeded from the first one.
    ///
    /// The result is named like MNE names summed labels
    /// (`"a-lh + b-lh"`) and keeps the seed's color; callers normally
    /// rename and recolor it.
    pub fn merge<'a, I>(labels: I) -> Result<Label, LabelError>
    where
        I: IntoIterator<Item = &'a Label>,
    {
        let mut iter = labels.into_iter();
        let mut merged = iter.next().ok_or(LabelError::EmptyMerge)?.clone();
        for other in iter {
            merged.union_with(other)?;
            merged.name.push_str(" + ");
            merged.name.push_str(&other.name);
        }
        Ok(merged)
    }
}

// ── LabelSet ──────────────────────────────────────────────────────────────

/// Number of surface vertices per hemisphere.
pub type VertexCounts = BTreeMap<Hemisphere, usize>;

/// Labels keyed by name, iterated in lexicographic name order.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    labels: BTreeMap<String, Label>,
    vertex_counts: VertexCounts,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `label`, replacing any label of the same name.
    pub fn insert(&mut self, label: Label) -> Option<Label> {
        self.labels.insert(label.name.clone(), label)
    }

    pub fn get(&self, name: &str) -> Option<&Label> {
        self.labels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    /// Names starting with `prefix` on hemisphere `hemi`, in set order.
    pub fn names_matching<'a>(
        &'a self,
        prefix: &'a str,
        hemi: Hemisphere,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.names()
            .filter(move |n| n.starts_with(prefix) && n.ends_with(hemi.suffix()))
    }

    /// Distinct region names (name before the first `-`), sorted.
    pub fn region_names(&self) -> BTreeSet<String> {
        self.iter().map(|l| l.region().to_string()).collect()
    }

    pub fn vertex_counts(&self) -> &VertexCounts {
        &self.vertex_counts
    }

    pub fn set_vertex_count(&mut self, hemi: Hemisphere, n: usize) {
        self.vertex_counts.insert(hemi, n);
    }
}

// ── LabelFilter ───────────────────────────────────────────────────────────

/// Rejects labels whose full name (`"{region}-{hemi}"`) matches any of a
/// list of regular expressions.
#[derive(Debug, Clone)]
pub struct LabelFilter {
    skip: regex::RegexSet,
}

impl LabelFilter {
    pub fn new<I, S>(skip_patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self { skip: regex::RegexSet::new(skip_patterns)? })
    }

    /// A filter that accepts everything.
    pub fn accept_all() -> Self {
        Self { skip: regex::RegexSet::empty() }
    }

    pub fn accepts(&self, name: &str) -> bool {
        !self.skip.is_match(name)
    }
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl FromIterator<Label> for LabelSet {
    fn from_iter<T: IntoIterator<Item = Label>>(iter: T) -> Self {
        let mut set = LabelSet::new();
        for label in iter {
            set.insert(label);
        }
        set
    }
}
