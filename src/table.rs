//! Typed observation rows.
//!
//! Each [`Observation`] is one measured unit: a focal value, an optional
//! denominator, a sort key that orders the unit inside its group, and the
//! stratification keys that decide which group it belongs to. Column names
//! are resolved into this shape once, at the [`crate::data`] boundary, so the
//! calculator never looks anything up by name.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Key that orders observations within a group.
///
/// Keys of different kinds never appear in the same table when it comes from
/// [`crate::data::ColumnSpec::extract`]. When they are mixed by hand, numbers
/// sort before dates, and dates sort before text.
///
/// Numbers compare with [`f64::total_cmp`], so the ordering is total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortKey {
    /// Numeric key (e.g. a sample size in a funnel chart, or a period index).
    Number(f64),
    /// Calendar date (e.g. a service month).
    Date(NaiveDate),
    /// Free-form label.
    Text(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Date(_) => 1,
            SortKey::Text(_) => 2,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            SortKey::Number(n) => write!(f, "{n}"),
            SortKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SortKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for SortKey {
    fn from(value: f64) -> Self {
        SortKey::Number(value)
    }
}

impl From<i32> for SortKey {
    fn from(value: i32) -> Self {
        SortKey::Number(f64::from(value))
    }
}

impl From<NaiveDate> for SortKey {
    fn from(value: NaiveDate) -> Self {
        SortKey::Date(value)
    }
}

impl From<&str> for SortKey {
    fn from(value: &str) -> Self {
        SortKey::Text(value.to_string())
    }
}

impl From<String> for SortKey {
    fn from(value: String) -> Self {
        SortKey::Text(value)
    }
}

/// One measured unit of process data.
///
/// # Examples
///
/// ```
/// use shewhart::Observation;
///
/// // 12 rejected claims out of 480 submitted, for clinic "north", in period 3.
/// let obs = Observation::new(3, 12.0)
///     .with_denominator(480.0)
///     .with_strata(["north"]);
/// assert_eq!(obs.denominator, Some(480.0));
/// assert_eq!(obs.strata, vec!["north".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Focal value: the individual measurement, or the count numerator.
    pub value: f64,
    /// Sample size or exposure (e.g. member-months). Required by P and U charts.
    pub denominator: Option<f64>,
    /// Orders the observation inside its group.
    pub sort_key: SortKey,
    /// Stratification keys; observations with equal keys share limits.
    pub strata: Vec<String>,
}

impl Observation {
    /// Create an unstratified observation without a denominator.
    pub fn new(sort_key: impl Into<SortKey>, value: f64) -> Self {
        Self {
            value,
            denominator: None,
            sort_key: sort_key.into(),
            strata: Vec::new(),
        }
    }

    /// Attach a denominator.
    pub fn with_denominator(mut self, denominator: f64) -> Self {
        self.denominator = Some(denominator);
        self
    }

    /// Attach stratification keys.
    pub fn with_strata<I, S>(mut self, strata: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strata = strata.into_iter().map(Into::into).collect();
        self
    }
}
