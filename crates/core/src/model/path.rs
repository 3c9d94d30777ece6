use std::fmt;
use std::str::FromStr;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Structural position of a node in the course, e.g. unit 1, lesson 2, component 0.
///
/// Paths are the join key between schema entities, progress nodes, snapshot
/// records, and remote records. They never change once assigned.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path(Vec<u32>);

impl Path {
    /// Wraps `indices` as a path.
    ///
    /// An empty path has no textual form that parses back, and
    /// `ProgressTree::insert` refuses it. Build paths from parsed input or
    /// from a validated schema.
    #[must_use]
    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    /// Path of the course root.
    #[must_use]
    pub fn root() -> Self {
        Self(vec![0])
    }

    /// Returns a new path with `index` appended.
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-friendly rendering used in listings, e.g. `1.2.0`.
    #[must_use]
    pub fn dot_text(&self) -> String {
        self.0
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl From<Vec<u32>> for Path {
    fn from(indices: Vec<u32>) -> Self {
        Self(indices)
    }
}

impl<const N: usize> From<[u32; N]> for Path {
    fn from(indices: [u32; N]) -> Self {
        Self(indices.to_vec())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

/// Canonical wire form: `[1,2,0]`.
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{index}")?;
        }
        f.write_str("]")
    }
}

//
// ─── PARSING ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParsePathError {
    #[error("path is empty")]
    Empty,

    #[error("unbalanced brackets in path: {raw}")]
    UnbalancedBrackets { raw: String },

    #[error("path element {position} is empty")]
    EmptyElement { position: usize },

    #[error("path element {position} is not a non-negative integer: {raw}")]
    InvalidElement { position: usize, raw: String },
}

impl FromStr for Path {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = match (trimmed.strip_prefix('['), trimmed.strip_suffix(']')) {
            (Some(_), Some(_)) if trimmed.len() >= 2 => &trimmed[1..trimmed.len() - 1],
            (None, None) => trimmed,
            _ => {
                return Err(ParsePathError::UnbalancedBrackets {
                    raw: s.to_string(),
                });
            }
        };

        if inner.trim().is_empty() {
            return Err(ParsePathError::Empty);
        }

        inner
            .split(',')
            .enumerate()
            .map(|(position, raw)| {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Err(ParsePathError::EmptyElement { position });
                }
                raw.parse::<u32>()
                    .map_err(|_| ParsePathError::InvalidElement {
                        position,
                        raw: raw.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Path)
    }
}

//
// ─── SERDE ─────────────────────────────────────────────────────────────────────
//

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PathVisitor)
    }
}

/// Accepts the string form (`"[1,2,0]"`) or a bare index array (`[1, 2, 0]`).
struct PathVisitor;

impl<'de> Visitor<'de> for PathVisitor {
    type Value = Path;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a path string like \"[1,2,0]\" or an array of indices")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Path, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Path, A::Error> {
        let mut indices = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(index) = seq.next_element::<u32>()? {
            indices.push(index);
        }
        Ok(Path(indices))
    }
}
