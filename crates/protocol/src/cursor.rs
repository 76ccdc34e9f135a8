//! Resumption cursors.
//!
//! The server tags each update with the position reached in every component
//! log stream. The client never looks inside a position beyond ordering it,
//! and hands the last applied set back verbatim when it resumes.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Position inside one component stream.
///
/// Either a plain counter or a dash-separated token such as
/// `"1718000000000-3"`. Tokens whose segments are all numeric are ordered
/// segment by segment; anything else falls back to string order. Two
/// positions are equal only when they also print the same, so `"007"` and
/// `"7"` are distinct while `7` and `"7"` are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Number(u64),
    Token(String),
}

impl Position {
    fn segments(&self) -> Option<Vec<u64>> {
        match self {
            Self::Number(n) => Some(vec![*n]),
            Self::Token(t) => t.split('-').map(|s| s.parse().ok()).collect(),
        }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.segments(), other.segments()) {
            (Some(a), Some(b)) => a
                .cmp(&b)
                .then_with(|| self.to_string().cmp(&other.to_string())),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Position {}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Token(t) => f.write_str(t),
        }
    }
}

/// How an incoming cursor set relates to the one already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progression {
    /// Strictly further along: apply it.
    Ahead,
    /// Exactly the applied position: a replayed update.
    Same,
    /// Behind or incomparable: applying it would move the session backwards.
    Behind,
}

/// Per-component resumption positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursors(BTreeMap<String, Position>);

impl Cursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixtures.
    pub fn with(mut self, component: impl Into<String>, position: Position) -> Self {
        self.0.insert(component.into(), position);
        self
    }

    pub fn get(&self, component: &str) -> Option<&Position> {
        self.0.get(component)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares `self` against the cursor set already applied.
    ///
    /// Every component known in `applied` must still be present and must not
    /// have moved backwards; new components are allowed.
    pub fn progression_from(&self, applied: &Cursors) -> Progression {
        let mut advanced = self.0.len() > applied.0.len();

        for (component, old) in &applied.0 {
            match self.0.get(component) {
                None => return Progression::Behind,
                Some(new) => match new.cmp(old) {
                    Ordering::Less => return Progression::Behind,
                    Ordering::Greater => advanced = true,
                    Ordering::Equal => {}
                },
            }
        }

        if advanced {
            Progression::Ahead
        } else {
            Progression::Same
        }
    }
}

impl fmt::Display for Cursors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (component, position) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{component}={position}")?;
            first = false;
        }
        Ok(())
    }
}
