//! Core control chart types.
//!
//! Defines the building blocks shared by every chart kind: control limits,
//! the limit configuration, chart result rows with their out-of-limits flag
//! and special-cause weight, and the per-group summaries.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - Provost, L.P. & Murray, S.K. (2011). *The Health Care Data Guide*, Chapters 5 and 8.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ChartError, Result};
use crate::table::Observation;

/// The five supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartKind {
    /// Individuals chart; sigma from the average moving range.
    I,
    /// Proportion chart; binomial standard error per row.
    P,
    /// Laney P′ chart; binomial standard error inflated by σz.
    PPrime,
    /// Rate chart; Poisson standard error per row.
    U,
    /// Laney U′ chart; Poisson standard error inflated by σz.
    UPrime,
}

impl ChartKind {
    /// Whether every row must carry a denominator.
    pub fn requires_denominator(self) -> bool {
        !matches!(self, ChartKind::I)
    }

    /// Whether the chart applies the Laney σz adjustment.
    pub fn is_laney(self) -> bool {
        matches!(self, ChartKind::PPrime | ChartKind::UPrime)
    }

    /// Whether the plotted statistic is a proportion in `[0, 1]`.
    pub fn is_proportion(self) -> bool {
        matches!(self, ChartKind::P | ChartKind::PPrime)
    }

    /// Short label used in messages and chart captions.
    pub fn label(self) -> &'static str {
        match self {
            ChartKind::I => "I",
            ChartKind::P => "P",
            ChartKind::PPrime => "P'",
            ChartKind::U => "U",
            ChartKind::UPrime => "U'",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Control limits for one chart row.
///
/// Represents the upper control limit (UCL), center line (CL), and lower
/// control limit (LCL).
///
/// # Invariants
///
/// - `lcl <= cl <= ucl`
/// - All values are finite
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlLimits {
    /// Upper control limit (UCL = CL + k sigma).
    pub ucl: f64,
    /// Center line (group mean, pooled proportion, or pooled rate).
    pub cl: f64,
    /// Lower control limit (LCL = CL - k sigma, floored at zero for counts).
    pub lcl: f64,
}

impl ControlLimits {
    /// Symmetric band `cl ± half_width`, optionally floored at zero.
    pub(crate) fn around(cl: f64, half_width: f64, floor_at_zero: bool) -> Self {
        let lcl = cl - half_width;
        Self {
            ucl: cl + half_width,
            cl,
            lcl: if floor_at_zero { lcl.max(0.0) } else { lcl },
        }
    }

    /// Whether `value` lies inside the closed band `[lcl, ucl]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lcl && value <= self.ucl
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            ucl: self.ucl * factor,
            cl: self.cl * factor,
            lcl: self.lcl * factor,
        }
    }
}

/// How σz is estimated for Laney P′ and U′ charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaneySigma {
    /// Sample standard deviation of the z-scores.
    #[default]
    StandardDeviation,
    /// Average moving range of the z-scores (in sort order) divided by 1.128.
    ///
    /// Honors [`LimitConfig::screen_moving_ranges`].
    MovingRange,
}

/// Parameters shared by every chart computation.
///
/// # Examples
///
/// ```
/// use shewhart::{LaneySigma, LimitConfig};
///
/// let config = LimitConfig {
///     screen_moving_ranges: true,
///     laney_sigma: LaneySigma::MovingRange,
///     ..LimitConfig::default()
/// };
/// assert!((config.sigma_multiplier - 3.0).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Width of the band in sigma units.
    pub sigma_multiplier: f64,
    /// Drop moving ranges above 3.27 × MR-bar before re-estimating MR-bar.
    pub screen_moving_ranges: bool,
    /// σz estimator for P′ and U′ charts.
    pub laney_sigma: LaneySigma,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            sigma_multiplier: 3.0,
            screen_moving_ranges: false,
            laney_sigma: LaneySigma::StandardDeviation,
        }
    }
}

impl LimitConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.sigma_multiplier.is_finite() || self.sigma_multiplier <= 0.0 {
            return Err(ChartError::InvalidConfig(format!(
                "sigma_multiplier must be finite and > 0, got {}",
                self.sigma_multiplier
            )));
        }
        Ok(())
    }
}

/// One row of a chart result: the input observation plus derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRow {
    /// The observation this row was computed from.
    pub observation: Observation,
    /// Plotted statistic: the focal value (I) or numerator / denominator (P, U).
    pub statistic: f64,
    /// Center line and limits for this row.
    #[serde(flatten)]
    pub limits: ControlLimits,
    /// Whether the statistic falls outside the limits.
    pub out_of_limits: bool,
    /// Signed distance beyond the nearest limit, in units of that limit's
    /// distance from the center line. Zero inside the limits.
    pub sc_weight: f64,
}

impl ChartRow {
    pub(crate) fn new(observation: Observation, statistic: f64, limits: ControlLimits) -> Self {
        Self {
            observation,
            statistic,
            limits,
            out_of_limits: !limits.contains(statistic),
            sc_weight: special_cause_weight(statistic, &limits),
        }
    }
}

/// Special-cause weight of `value` against `limits`.
///
/// Above the UCL: `(value - ucl) / (ucl - cl)`. Below the LCL:
/// `-(lcl - value) / (cl - lcl)`. A collapsed band yields `±1`.
pub(crate) fn special_cause_weight(value: f64, limits: &ControlLimits) -> f64 {
    if value > limits.ucl {
        let width = limits.ucl - limits.cl;
        if width > 0.0 {
            (value - limits.ucl) / width
        } else {
            1.0
        }
    } else if value < limits.lcl {
        let width = limits.cl - limits.lcl;
        if width > 0.0 {
            -(limits.lcl - value) / width
        } else {
            -1.0
        }
    } else {
        0.0
    }
}

/// Per-group summary of a chart computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Stratification keys shared by the group (empty when unstratified).
    pub strata: Vec<String>,
    /// Group center line.
    pub center_line: f64,
    /// Sigma estimate: MR-bar / 1.128 for I charts (statistic units), σz for
    /// P′ and U′ charts (dimensionless), `None` for P and U charts.
    pub sigma: Option<f64>,
    /// Number of rows in the group.
    pub len: usize,
}

/// Output of a limit computation.
///
/// Rows are ordered by stratification keys, then by sort key inside each
/// group. [`ChartResult::groups`] lists the groups in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartResult {
    kind: ChartKind,
    rows: Vec<ChartRow>,
    groups: Vec<GroupSummary>,
}

impl ChartResult {
    pub(crate) fn new(kind: ChartKind, rows: Vec<ChartRow>, groups: Vec<GroupSummary>) -> Self {
        Self { kind, rows, groups }
    }

    /// Which chart produced this result.
    pub fn kind(&self) -> ChartKind {
        self.kind
    }

    /// All rows, grouped and sorted.
    pub fn rows(&self) -> &[ChartRow] {
        &self.rows
    }

    /// Per-group summaries, in row order.
    pub fn groups(&self) -> &[GroupSummary] {
        &self.groups
    }

    /// Rows belonging to the group with the given stratification keys.
    pub fn group_rows<'a>(&'a self, strata: &'a [String]) -> impl Iterator<Item = &'a ChartRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.observation.strata.as_slice() == strata)
    }

    /// Rows flagged as out of limits.
    pub fn out_of_limits(&self) -> impl Iterator<Item = &ChartRow> {
        self.rows.iter().filter(|row| row.out_of_limits)
    }

    /// Check if every row is inside its limits.
    pub fn is_in_control(&self) -> bool {
        self.rows.iter().all(|row| !row.out_of_limits)
    }

    /// Multiply statistics, center lines, and limits by `factor`.
    ///
    /// Used to report per-thousand rates after computing limits on per-unit
    /// values. Flags and weights do not change. For I charts the group sigma
    /// is scaled as well; σz is dimensionless and stays as is.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::InvalidScale`] if `factor` is not finite and positive.
    ///
    /// # Examples
    ///
    /// ```
    /// use shewhart::{u_chart, Observation};
    ///
    /// let data = vec![
    ///     Observation::new(1, 30.0).with_denominator(10_000.0),
    ///     Observation::new(2, 42.0).with_denominator(11_000.0),
    ///     Observation::new(3, 35.0).with_denominator(10_500.0),
    /// ];
    /// let pmpm = u_chart(&data).unwrap();
    /// let ptmpm = pmpm.rescaled(1000.0).unwrap();
    /// let ratio = ptmpm.rows()[0].limits.cl / pmpm.rows()[0].limits.cl;
    /// assert!((ratio - 1000.0).abs() < 1e-9);
    /// ```
    pub fn rescaled(&self, factor: f64) -> Result<ChartResult> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ChartError::InvalidScale(factor));
        }
        let rows = self
            .rows
            .iter()
            .map(|row| ChartRow {
                observation: row.observation.clone(),
                statistic: row.statistic * factor,
                limits: row.limits.scaled(factor),
                out_of_limits: row.out_of_limits,
                sc_weight: row.sc_weight,
            })
            .collect();
        let groups = self
            .groups
            .iter()
            .map(|group| GroupSummary {
                strata: group.strata.clone(),
                center_line: group.center_line * factor,
                sigma: match self.kind {
                    ChartKind::I => group.sigma.map(|s| s * factor),
                    _ => group.sigma,
                },
                len: group.len,
            })
            .collect();
        Ok(ChartResult::new(self.kind, rows, groups))
    }
}
