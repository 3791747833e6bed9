//! Attributes control charts: P, P′, U, and U′ charts.
//!
//! These charts monitor count data relative to an area of opportunity.
//! Unlike the I chart, limits come from the binomial (P) or Poisson (U)
//! standard error of each row, so they vary with the row's denominator.
//!
//! The Laney variants (P′, U′) standardize every row into a z-score,
//! measure the spread of those z-scores (σz), and widen the limits by σz.
//! This corrects the overly narrow limits that large denominators produce
//! when the data are overdispersed.
//!
//! # Chart Selection Guide
//!
//! | Chart | Data Type | Denominator |
//! |-------|-----------|-------------|
//! | P     | Proportion (numerator ≤ denominator) | Sample size |
//! | P′    | Proportion, large or overdispersed samples | Sample size |
//! | U     | Rate | Exposure (e.g. member-months) |
//! | U′    | Rate, large or overdispersed samples | Exposure |
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 7: Control Charts for Attributes.
//! - Laney, D.B. (2002). "Improved Control Charts for Attributes",
//!   *Quality Engineering* 14(4), pp. 531-537.

use u_optim::stats;

use super::chart::{ChartKind, ChartResult, ControlLimits, LaneySigma, LimitConfig};
use super::pipeline::{compute, GroupFit};
use super::variables::{average_moving_range, D2};
use crate::error::{ChartError, Result};
use crate::table::Observation;

/// Standard error of one row's statistic around the center line.
///
/// - P: `sqrt(cl * (1 - cl) / n)`
/// - U: `sqrt(cl / n)`
fn standard_error(kind: ChartKind, center_line: f64, denominator: f64) -> f64 {
    if kind.is_proportion() {
        (center_line * (1.0 - center_line) / denominator).sqrt()
    } else {
        (center_line / denominator).sqrt()
    }
}

/// z-score of a statistic; zero when the standard error vanishes.
fn z_score(statistic: f64, center_line: f64, standard_error: f64) -> f64 {
    if standard_error > 0.0 {
        (statistic - center_line) / standard_error
    } else {
        0.0
    }
}

/// Estimate σz from z-scores in sort order.
pub(crate) fn laney_sigma_z(z_scores: &[f64], config: &LimitConfig) -> Option<f64> {
    let sigma_z = match config.laney_sigma {
        LaneySigma::StandardDeviation => stats::std_dev(z_scores),
        LaneySigma::MovingRange => {
            average_moving_range(z_scores, config.screen_moving_ranges).map(|mr| mr / D2)
        }
    };
    sigma_z.filter(|s| s.is_finite())
}

/// Fit one sorted group of numerator/denominator rows.
///
/// Rows have already been validated: every denominator is finite and
/// positive, every numerator is non-negative.
pub(crate) fn fit_attributes(
    group: &[&Observation],
    kind: ChartKind,
    config: &LimitConfig,
    label: &str,
) -> Result<GroupFit> {
    let pairs: Vec<(f64, f64)> = group
        .iter()
        .map(|obs| (obs.value, obs.denominator.unwrap_or(f64::NAN)))
        .collect();

    let total_numerator: f64 = pairs.iter().map(|&(num, _)| num).sum();
    let total_denominator: f64 = pairs.iter().map(|&(_, den)| den).sum();
    let center_line = total_numerator / total_denominator;
    if !center_line.is_finite() {
        return Err(ChartError::NonFiniteStatistic {
            group: label.to_string(),
            what: "center line",
        });
    }

    let statistics: Vec<f64> = pairs.iter().map(|&(num, den)| num / den).collect();
    let errors: Vec<f64> = pairs
        .iter()
        .map(|&(_, den)| standard_error(kind, center_line, den))
        .collect();

    let sigma_z = if kind.is_laney() {
        let z_scores: Vec<f64> = statistics
            .iter()
            .zip(&errors)
            .map(|(&stat, &se)| z_score(stat, center_line, se))
            .collect();
        let sigma_z = laney_sigma_z(&z_scores, config).ok_or_else(|| {
            ChartError::NonFiniteStatistic {
                group: label.to_string(),
                what: "sigma z",
            }
        })?;
        Some(sigma_z)
    } else {
        None
    };

    let inflation = sigma_z.unwrap_or(1.0);
    let limits = errors
        .iter()
        .map(|&se| ControlLimits::around(center_line, config.sigma_multiplier * inflation * se, true))
        .collect();

    Ok(GroupFit {
        statistics,
        limits,
        center_line,
        sigma: sigma_z,
    })
}

/// P chart limits with the default configuration.
///
/// # Inputs
///
/// - `observations`: numerators (`value`) with their sample sizes
///   (`denominator`), sort keys, and optional strata.
///
/// # Output
///
/// A [`ChartResult`] whose statistic is `value / denominator`, with, per group,
/// CL = Σ numerators / Σ denominators and
/// UCL/LCL = CL ± 3 × sqrt(CL × (1 − CL) / nᵢ), LCL floored at zero.
///
/// # Errors
///
/// Fails if a denominator is missing or not positive, a numerator is negative
/// or larger than its denominator, or any group has fewer than two rows.
///
/// # Examples
///
/// ```
/// use shewhart::{p_chart, Observation};
///
/// let data = vec![
///     Observation::new(1, 5.0).with_denominator(100.0),
///     Observation::new(2, 8.0).with_denominator(100.0),
/// ];
/// let result = p_chart(&data).unwrap();
/// let row = &result.rows()[0];
/// assert!((row.limits.cl - 0.065).abs() < 1e-12);
/// assert!((row.limits.ucl - 0.1390).abs() < 1e-3);
/// assert_eq!(row.limits.lcl, 0.0);
/// ```
pub fn p_chart(observations: &[Observation]) -> Result<ChartResult> {
    p_chart_with(observations, &LimitConfig::default())
}

/// P chart limits with an explicit [`LimitConfig`].
///
/// # Examples
///
/// ```
/// use shewhart::{p_chart_with, LimitConfig, Observation};
///
/// let data = vec![
///     Observation::new(1, 10.0).with_denominator(100.0),
///     Observation::new(2, 10.0).with_denominator(100.0),
/// ];
/// let config = LimitConfig { sigma_multiplier: 2.0, ..LimitConfig::default() };
/// let result = p_chart_with(&data, &config).unwrap();
/// // sigma = sqrt(0.1 * 0.9 / 100) = 0.03
/// assert!((result.rows()[0].limits.ucl - 0.16).abs() < 1e-12);
/// ```
pub fn p_chart_with(observations: &[Observation], config: &LimitConfig) -> Result<ChartResult> {
    compute(observations, ChartKind::P, config)
}

/// Laney P′ chart limits with the default configuration.
///
/// # Inputs
///
/// Same as [`p_chart`].
///
/// # Output
///
/// A [`ChartResult`] with CL as for the P chart and
/// UCL/LCL = CL ± 3 × σz × sqrt(CL × (1 − CL) / nᵢ), where σz is the
/// standard deviation of the rows' z-scores. The group's σz is reported in
/// [`crate::GroupSummary::sigma`].
///
/// # Errors
///
/// Same as [`p_chart`].
///
/// # Examples
///
/// ```
/// use shewhart::{p_chart, p_prime_chart, Observation};
///
/// // Large samples with month-to-month swings far beyond binomial noise.
/// let data: Vec<Observation> = [410.0, 520.0, 455.0, 610.0, 380.0, 495.0]
///     .iter()
///     .enumerate()
///     .map(|(m, &rejects)| Observation::new(m as i32, rejects).with_denominator(10_000.0))
///     .collect();
///
/// let p = p_chart(&data).unwrap();
/// let p_prime = p_prime_chart(&data).unwrap();
/// assert!(p_prime.rows()[0].limits.ucl > p.rows()[0].limits.ucl);
/// assert!(p_prime.out_of_limits().count() < p.out_of_limits().count());
/// ```
pub fn p_prime_chart(observations: &[Observation]) -> Result<ChartResult> {
    p_prime_chart_with(observations, &LimitConfig::default())
}

/// Laney P′ chart limits with an explicit [`LimitConfig`].
///
/// # Examples
///
/// ```
/// use shewhart::{p_prime_chart_with, LaneySigma, LimitConfig, Observation};
///
/// let data: Vec<Observation> = [410.0, 520.0, 455.0, 610.0, 380.0, 495.0]
///     .iter()
///     .enumerate()
///     .map(|(m, &rejects)| Observation::new(m as i32, rejects).with_denominator(10_000.0))
///     .collect();
///
/// let config = LimitConfig { laney_sigma: LaneySigma::MovingRange, ..LimitConfig::default() };
/// let result = p_prime_chart_with(&data, &config).unwrap();
/// assert!(result.groups()[0].sigma.unwrap() > 1.0);
/// ```
pub fn p_prime_chart_with(
    observations: &[Observation],
    config: &LimitConfig,
) -> Result<ChartResult> {
    compute(observations, ChartKind::PPrime, config)
}

/// U chart limits with the default configuration.
///
/// # Inputs
///
/// - `observations`: event counts (`value`) with their exposure
///   (`denominator`, e.g. member-months), sort keys, and optional strata.
///
/// # Output
///
/// A [`ChartResult`] whose statistic is `value / denominator`, with, per group,
/// CL = Σ counts / Σ exposure and UCL/LCL = CL ± 3 × sqrt(CL / nᵢ),
/// LCL floored at zero.
///
/// # Errors
///
/// Fails if a denominator is missing or not positive, a count is negative,
/// or any group has fewer than two rows.
///
/// # Examples
///
/// ```
/// use shewhart::{u_chart, Observation};
///
/// let data = vec![
///     Observation::new(1, 3.0).with_denominator(10.0),
///     Observation::new(2, 5.0).with_denominator(10.0),
///     Observation::new(3, 4.0).with_denominator(10.0),
///     Observation::new(4, 6.0).with_denominator(10.0),
///     Observation::new(5, 2.0).with_denominator(10.0),
/// ];
/// let result = u_chart(&data).unwrap();
/// assert!((result.groups()[0].center_line - 0.4).abs() < 1e-12);
/// ```
pub fn u_chart(observations: &[Observation]) -> Result<ChartResult> {
    u_chart_with(observations, &LimitConfig::default())
}

/// U chart limits with an explicit [`LimitConfig`].
///
/// # Examples
///
/// ```
/// use shewhart::{u_chart_with, LimitConfig, Observation};
///
/// let data = vec![
///     Observation::new(1, 8.0).with_denominator(4.0),
///     Observation::new(2, 8.0).with_denominator(4.0),
/// ];
/// let result = u_chart_with(&data, &LimitConfig::default()).unwrap();
/// // u-bar = 2.0, sigma = sqrt(2 / 4)
/// let expected = 2.0 + 3.0 * (0.5f64).sqrt();
/// assert!((result.rows()[0].limits.ucl - expected).abs() < 1e-12);
/// ```
pub fn u_chart_with(observations: &[Observation], config: &LimitConfig) -> Result<ChartResult> {
    compute(observations, ChartKind::U, config)
}

/// Laney U′ chart limits with the default configuration.
///
/// # Inputs
///
/// Same as [`u_chart`].
///
/// # Output
///
/// A [`ChartResult`] with CL as for the U chart and
/// UCL/LCL = CL ± 3 × σz × sqrt(CL / nᵢ).
///
/// # Errors
///
/// Same as [`u_chart`].
///
/// # Examples
///
/// ```
/// use shewhart::{u_prime_chart, Observation};
///
/// // Utilization per member-month over six months.
/// let data: Vec<Observation> = [(1_210.0, 50_000.0), (1_420.0, 51_000.0), (1_050.0, 50_500.0),
///                               (1_600.0, 52_000.0), (1_180.0, 51_500.0), (1_330.0, 50_800.0)]
///     .iter()
///     .enumerate()
///     .map(|(m, &(util, members))| Observation::new(m as i32, util).with_denominator(members))
///     .collect();
///
/// let result = u_prime_chart(&data).unwrap();
/// let row = &result.rows()[0];
/// assert!(row.limits.ucl >= row.limits.cl && row.limits.cl >= row.limits.lcl);
/// ```
pub fn u_prime_chart(observations: &[Observation]) -> Result<ChartResult> {
    u_prime_chart_with(observations, &LimitConfig::default())
}

/// Laney U′ chart limits with an explicit [`LimitConfig`].
///
/// # Examples
///
/// ```
/// use shewhart::{u_prime_chart_with, LaneySigma, LimitConfig, Observation};
///
/// let data = vec![
///     Observation::new(1, 120.0).with_denominator(1_000.0),
///     Observation::new(2, 180.0).with_denominator(1_000.0),
///     Observation::new(3, 140.0).with_denominator(1_000.0),
/// ];
/// let config = LimitConfig {
///     laney_sigma: LaneySigma::MovingRange,
///     screen_moving_ranges: true,
///     ..LimitConfig::default()
/// };
/// assert!(u_prime_chart_with(&data, &config).is_ok());
/// ```
pub fn u_prime_chart_with(
    observations: &[Observation],
    config: &LimitConfig,
) -> Result<ChartResult> {
    compute(observations, ChartKind::UPrime, config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn rows(pairs: &[(f64, f64)]) -> Vec<Observation> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(num, den))| Observation::new(i as i32, num).with_denominator(den))
            .collect()
    }

    fn count_rows(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
        proptest::collection::vec((1.0_f64..5_000.0, 0.0_f64..1.0), min_len..=max_len)
            .prop_map(|v| {
                v.into_iter()
                    .map(|(den, share)| ((den * share).floor(), den.ceil()))
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn limits_are_ordered(pairs in count_rows(2, 40)) {
            let data = rows(&pairs);
            for kind in [ChartKind::P, ChartKind::PPrime, ChartKind::U, ChartKind::UPrime] {
                let result = compute(&data, kind, &LimitConfig::default()).expect("valid");
                for row in result.rows() {
                    prop_assert!(row.limits.ucl >= row.limits.cl, "{kind}: ucl < cl");
                    prop_assert!(row.limits.cl >= row.limits.lcl, "{kind}: cl < lcl");
                    prop_assert!(row.limits.lcl >= 0.0, "{kind}: negative lcl");
                }
            }
        }

        #[test]
        fn flag_matches_weight(pairs in count_rows(2, 40)) {
            let result = p_prime_chart(&rows(&pairs)).expect("valid");
            for row in result.rows() {
                prop_assert_eq!(row.out_of_limits, row.sc_weight != 0.0);
            }
        }
    }
}
