//! Error type shared by the limit calculator, the table boundary, and the
//! chart renderer.
//!
//! Every failure is reported to the caller as soon as it is found. No call
//! returns a partial result: one bad group aborts the whole chart.

use thiserror::Error;

use crate::spc::ChartKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChartError>;

/// Errors raised while building, computing, or rendering a control chart.
#[derive(Debug, Error)]
pub enum ChartError {
    /// A named column does not exist in the source table.
    #[error("column `{0}` not found in table")]
    MissingColumn(String),

    /// A chart that needs a denominator received a row without one.
    #[error("{chart} chart requires a denominator, but row {row} has none")]
    MissingDenominator { chart: ChartKind, row: usize },

    /// A denominator is zero, negative, or not finite.
    #[error("row {row}: denominator must be finite and > 0, got {value}")]
    InvalidDenominator { row: usize, value: f64 },

    /// A count-based chart received a negative focal value.
    #[error("row {row}: {chart} chart requires a non-negative count, got {value}")]
    NegativeValue {
        chart: ChartKind,
        row: usize,
        value: f64,
    },

    /// A proportion numerator is larger than its denominator.
    #[error("row {row}: numerator {numerator} exceeds denominator {denominator}")]
    NumeratorExceedsDenominator {
        row: usize,
        numerator: f64,
        denominator: f64,
    },

    /// A focal value is NaN or infinite.
    #[error("row {row}: focal value {value} is not finite")]
    NonFiniteValue { row: usize, value: f64 },

    /// A table cell could not be parsed into the type its column requires.
    #[error("column `{column}`, row {row}: cannot parse `{value}`")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    /// A group is too small to estimate variation.
    #[error("group {group} has {len} observation(s); at least 2 are required")]
    InsufficientData { group: String, len: usize },

    /// There is nothing to chart.
    #[error("no observations to chart")]
    EmptyInput,

    /// Stratification was requested with an empty column list.
    #[error("stratification requested without any stratification columns")]
    EmptyStrata,

    /// Rows disagree on how many stratification keys they carry.
    #[error("row {row} has {found} stratification key(s), expected {expected}")]
    InconsistentStrata {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A stratification key is empty.
    #[error("row {row}: stratification value is empty")]
    MissingStratum { row: usize },

    /// The same sort key occurs twice inside one group.
    #[error("group {group}: sort key `{key}` appears more than once")]
    DuplicateSortKey { group: String, key: String },

    /// A derived statistic overflowed or became undefined.
    #[error("group {group}: {what} is not finite")]
    NonFiniteStatistic { group: String, what: &'static str },

    /// A rescaling factor is zero, negative, or not finite.
    #[error("scale factor must be finite and > 0, got {0}")]
    InvalidScale(f64),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading CSV input failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The drawing backend reported a failure.
    #[error("rendering failed: {0}")]
    Render(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_input() {
        let err = ChartError::MissingColumn("member_months".into());
        assert_eq!(err.to_string(), "column `member_months` not found in table");

        let err = ChartError::MissingDenominator {
            chart: ChartKind::P,
            row: 3,
        };
        assert_eq!(
            err.to_string(),
            "P chart requires a denominator, but row 3 has none"
        );

        let err = ChartError::InsufficientData {
            group: "clinic-a".into(),
            len: 1,
        };
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChartError = io.into();
        assert!(matches!(err, ChartError::Io(_)));
    }
}
