//! # shewhart
//!
//! Shewhart control chart limits for healthcare and process improvement
//! data: I charts for individual values, P and U charts for proportions and
//! rates, and the Laney P′ and U′ variants for large, overdispersed samples.
//!
//! Every chart function takes typed [`Observation`] rows, splits them into
//! independent groups by their stratification keys, orders each group by its
//! sort key, and returns the input rows augmented with the plotted
//! statistic, center line, control limits, an out-of-limits flag and a
//! signed special-cause weight.
//!
//! ## Modules
//!
//! - [`spc`]: limit calculation for the I, P, P′, U and U′ charts
//! - [`table`]: typed observation rows and sort keys
//! - [`data`]: raw tables (CSV or in-memory) and column selection
//! - [`render`]: static SVG rendering, one panel per group
//! - [`error`]: the crate error type
//!
//! ## Example
//!
//! ```
//! use shewhart::{p_chart, Observation};
//!
//! let data = vec![
//!     Observation::new(1, 5.0).with_denominator(100.0),
//!     Observation::new(2, 8.0).with_denominator(100.0),
//! ];
//! let result = p_chart(&data).unwrap();
//! let first = &result.rows()[0];
//! assert!((first.limits.cl - 0.065).abs() < 1e-12);
//! assert_eq!(first.limits.lcl, 0.0);
//! ```

pub mod data;
pub mod error;
pub mod render;
pub mod spc;
pub mod table;

pub use data::{ColumnSpec, RawTable};
pub use error::{ChartError, Result};
pub use render::{render_svg, save_svg, BetterDirection, RenderOptions};
pub use spc::{
    compute, i_chart, i_chart_with, p_chart, p_chart_with, p_prime_chart, p_prime_chart_with,
    u_chart, u_chart_with, u_prime_chart, u_prime_chart_with, ChartKind, ChartResult, ChartRow,
    ControlLimits, GroupSummary, LaneySigma, LimitConfig,
};
pub use table::{Observation, SortKey};

/// Names of every public function, in alphabetical order.
pub const LISTING: &[&str] = &[
    "compute",
    "i_chart",
    "i_chart_with",
    "p_chart",
    "p_chart_with",
    "p_prime_chart",
    "p_prime_chart_with",
    "render_svg",
    "save_svg",
    "u_chart",
    "u_chart_with",
    "u_prime_chart",
    "u_prime_chart_with",
];
