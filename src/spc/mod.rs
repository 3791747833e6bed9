//! Shewhart control chart limits.
//!
//! One function per chart kind, all backed by the shared [`compute`]
//! pipeline: validate, partition by strata, sort, fit, assemble.
//!
//! # Variables Charts
//!
//! - [`i_chart`]: Individuals chart; sigma from the average moving range
//!
//! # Attributes Charts
//!
//! - [`p_chart`]: Proportion with variable sample size
//! - [`p_prime_chart`]: Laney P′ for overdispersed proportions
//! - [`u_chart`]: Rate with variable exposure
//! - [`u_prime_chart`]: Laney U′ for overdispersed rates
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587: Standard Practice for Use of Control Charts
//! - Laney, D.B. (2002). "Improved Control Charts for Attributes",
//!   *Quality Engineering* 14(4), pp. 531-537.

mod attributes;
mod chart;
mod pipeline;
mod variables;

pub use attributes::{
    p_chart, p_chart_with, p_prime_chart, p_prime_chart_with, u_chart, u_chart_with,
    u_prime_chart, u_prime_chart_with,
};
pub use chart::{
    ChartKind, ChartResult, ChartRow, ControlLimits, GroupSummary, LaneySigma, LimitConfig,
};
pub use pipeline::compute;
pub use variables::{i_chart, i_chart_with};

pub(crate) use pipeline::group_label;
