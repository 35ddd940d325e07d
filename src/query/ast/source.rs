use std::fmt;

use serde::{Deserialize, Serialize};

/// A single named bucket of time-stamped points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
}

impl Measurement {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Where a statement reads its data from.
///
/// `Join` and `Merge` only differ in how the executor combines their
/// measurements; planning treats both as an ordered list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Measurement(Measurement),
    Join(Vec<Measurement>),
    Merge(Vec<Measurement>),
}

impl Source {
    pub fn measurement(name: impl Into<String>) -> Self {
        Source::Measurement(Measurement::new(name))
    }

    pub fn join<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Source::Join(names.into_iter().map(Measurement::new).collect())
    }

    pub fn merge<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Source::Merge(names.into_iter().map(Measurement::new).collect())
    }

    /// Measurements in declaration order.
    pub fn measurements(&self) -> &[Measurement] {
        match self {
            Source::Measurement(m) => std::slice::from_ref(m),
            Source::Join(ms) | Source::Merge(ms) => ms,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Source::Measurement(_))
    }
}

struct MeasurementList<'a>(&'a [Measurement]);

impl fmt::Display for MeasurementList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", m)?;
        }
        Ok(())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Measurement(m) => write!(f, "{}", m),
            Source::Join(ms) => write!(f, "join({})", MeasurementList(ms)),
            Source::Merge(ms) => write!(f, "merge({})", MeasurementList(ms)),
        }
    }
}
