//! Individuals (I) chart.
//!
//! Monitors single observations, one per period, using the moving range of
//! consecutive observations to estimate process variability.
//!
//! # Control Chart Factors
//!
//! d2 (n = 2) and the moving range upper limit factor are sourced from
//! ASTM E2587. The screening rule follows *The Health Care Data Guide*
//! (2011), Chapter 5.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 - Standard Practice for Use of Control Charts
//! - Provost, L.P. & Murray, S.K. (2011). *The Health Care Data Guide*.

use u_optim::stats;

use super::chart::{ChartKind, ChartResult, ControlLimits, LimitConfig};
use super::pipeline::{compute, GroupFit};
use crate::error::{ChartError, Result};
use crate::table::Observation;

/// d2 factor for subgroups of size 2.
///
/// sigma-hat = MR-bar / d2.
pub(crate) const D2: f64 = 1.128;

/// Upper limit factor for the moving range chart (n = 2).
///
/// Moving ranges above `MR_SCREEN * MR-bar` are treated as special causes
/// and excluded when screening is enabled.
pub(crate) const MR_SCREEN: f64 = 3.27;

/// Absolute differences between consecutive values.
pub(crate) fn moving_ranges(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}

/// Average moving range of `values`, optionally screened.
///
/// With `screened`, ranges above `3.27 * MR-bar` are dropped once and MR-bar
/// is recomputed from the rest. Returns `None` for fewer than two values or
/// non-finite ranges.
pub(crate) fn average_moving_range(values: &[f64], screened: bool) -> Option<f64> {
    let ranges = moving_ranges(values);
    let mr_bar = stats::mean(&ranges).filter(|mr| mr.is_finite())?;
    if !screened {
        return Some(mr_bar);
    }
    let ceiling = MR_SCREEN * mr_bar;
    let kept: Vec<f64> = ranges.into_iter().filter(|&r| r <= ceiling).collect();
    stats::mean(&kept).filter(|mr| mr.is_finite())
}

/// Fit one sorted group of individual values.
pub(crate) fn fit_individuals(
    group: &[&Observation],
    config: &LimitConfig,
    label: &str,
) -> Result<GroupFit> {
    let values: Vec<f64> = group.iter().map(|obs| obs.value).collect();

    // A constant group must sit exactly on its own center line; the summed
    // mean can land one ulp away and flag every point.
    let constant = values.windows(2).all(|w| w[0] == w[1]);
    let x_bar = if constant {
        Some(values[0])
    } else {
        stats::mean(&values)
    }
    .filter(|m| m.is_finite())
    .ok_or_else(|| ChartError::NonFiniteStatistic {
        group: label.to_string(),
        what: "mean",
    })?;
    let mr_bar = average_moving_range(&values, config.screen_moving_ranges).ok_or_else(|| {
        ChartError::NonFiniteStatistic {
            group: label.to_string(),
            what: "average moving range",
        }
    })?;

    let sigma = mr_bar / D2;
    let limits = ControlLimits::around(x_bar, config.sigma_multiplier * sigma, false);

    Ok(GroupFit {
        limits: vec![limits; values.len()],
        statistics: values,
        center_line: x_bar,
        sigma: Some(sigma),
    })
}

/// I chart limits with the default configuration.
///
/// # Inputs
///
/// - `observations`: individual values with sort keys and optional strata.
///   Denominators are ignored.
///
/// # Output
///
/// A [`ChartResult`] where, per group, CL = mean of the values and
/// UCL/LCL = CL ± 3 × MR-bar / 1.128.
///
/// # Errors
///
/// Fails if any value is not finite or any group has fewer than two rows.
///
/// # Examples
///
/// ```
/// use shewhart::{i_chart, Observation};
///
/// let data: Vec<Observation> = [10.0, 12.0, 11.0, 13.0, 9.0]
///     .iter()
///     .enumerate()
///     .map(|(month, &v)| Observation::new(month as i32, v))
///     .collect();
///
/// let result = i_chart(&data).unwrap();
/// let limits = result.rows()[0].limits;
/// assert!((limits.cl - 11.0).abs() < 1e-12);
/// assert!((limits.ucl - 16.984).abs() < 1e-3);
/// assert!((limits.lcl - 5.016).abs() < 1e-3);
/// ```
pub fn i_chart(observations: &[Observation]) -> Result<ChartResult> {
    i_chart_with(observations, &LimitConfig::default())
}

/// I chart limits with an explicit [`LimitConfig`].
///
/// # Examples
///
/// ```
/// use shewhart::{i_chart_with, LimitConfig, Observation};
///
/// // One large jump at the end inflates MR-bar unless screened out.
/// let values = [10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 10.0, 60.0];
/// let data: Vec<Observation> = values
///     .iter()
///     .enumerate()
///     .map(|(i, &v)| Observation::new(i as i32, v))
///     .collect();
///
/// let config = LimitConfig { screen_moving_ranges: true, ..LimitConfig::default() };
/// let result = i_chart_with(&data, &config).unwrap();
/// assert!(result.rows().last().unwrap().out_of_limits);
/// ```
pub fn i_chart_with(observations: &[Observation], config: &LimitConfig) -> Result<ChartResult> {
    compute(observations, ChartKind::I, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Observation::new(i as i32, v))
            .collect()
    }

    #[test]
    fn test_moving_ranges() {
        assert_eq!(moving_ranges(&[10.0, 12.0, 11.0, 13.0, 9.0]), vec![2.0, 1.0, 2.0, 4.0]);
        assert!(moving_ranges(&[1.0]).is_empty());
    }

    #[test]
    fn test_average_moving_range_unscreened() {
        let mr = average_moving_range(&[10.0, 12.0, 11.0, 13.0, 9.0], false).expect("mr");
        assert!((mr - 2.25).abs() < 1e-12);
    }

    #[test]
    fn test_average_moving_range_screened_drops_jump() {
        let values = [10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 10.0, 60.0];
        // Ranges: eight 1s and one 50. MR-bar0 = 58/9, ceiling ≈ 21.07.
        let raw = average_moving_range(&values, false).expect("mr");
        assert!((raw - 58.0 / 9.0).abs() < 1e-12);
        let screened = average_moving_range(&values, true).expect("mr");
        assert!((screened - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_average_moving_range_constant_series() {
        let mr = average_moving_range(&[4.0, 4.0, 4.0], true).expect("mr");
        assert!(mr.abs() < f64::EPSILON);
    }

    #[test]
    fn test_i_chart_reference_scenario() {
        let result = i_chart(&series(&[10.0, 12.0, 11.0, 13.0, 9.0])).expect("valid");
        assert_eq!(result.rows().len(), 5);

        let group = &result.groups()[0];
        assert!((group.center_line - 11.0).abs() < 1e-12);
        let sigma = group.sigma.expect("I chart sigma");
        assert!((sigma - 2.25 / 1.128).abs() < 1e-12);

        for row in result.rows() {
            assert!((row.limits.ucl - (11.0 + 3.0 * 2.25 / 1.128)).abs() < 1e-9);
            assert!((row.limits.lcl - (11.0 - 3.0 * 2.25 / 1.128)).abs() < 1e-9);
            assert!((row.limits.ucl - 16.98).abs() < 0.01);
            assert!((row.limits.lcl - 5.02).abs() < 0.01);
            assert!(!row.out_of_limits);
        }
        assert!(result.is_in_control());
    }

    #[test]
    fn test_i_chart_lcl_not_floored() {
        let result = i_chart(&series(&[0.0, 5.0, 0.0, 5.0])).expect("valid");
        assert!(result.rows()[0].limits.lcl < 0.0);
    }

    #[test]
    fn test_i_chart_sorts_by_key() {
        let data = vec![
            Observation::new(3, 13.0),
            Observation::new(1, 10.0),
            Observation::new(2, 12.0),
        ];
        let result = i_chart(&data).expect("valid");
        let values: Vec<f64> = result.rows().iter().map(|r| r.statistic).collect();
        assert_eq!(values, vec![10.0, 12.0, 13.0]);
    }

    #[test]
    fn test_i_chart_screening_flags_jump() {
        let values = [10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 10.0, 11.0, 10.0, 60.0];
        let plain = i_chart(&series(&values)).expect("valid");
        let config = LimitConfig {
            screen_moving_ranges: true,
            ..LimitConfig::default()
        };
        let screened = i_chart_with(&series(&values), &config).expect("valid");

        let plain_sigma = plain.groups()[0].sigma.expect("sigma");
        let screened_sigma = screened.groups()[0].sigma.expect("sigma");
        assert!((screened_sigma - 1.0 / 1.128).abs() < 1e-12);
        assert!(screened_sigma < plain_sigma);

        let last = screened.rows().last().expect("rows");
        assert!(last.out_of_limits);
        assert!(last.sc_weight > 0.0);
    }

    #[test]
    fn test_i_chart_sigma_multiplier() {
        let config = LimitConfig {
            sigma_multiplier: 2.0,
            ..LimitConfig::default()
        };
        let result = i_chart_with(&series(&[10.0, 12.0, 11.0, 13.0, 9.0]), &config).expect("valid");
        let row = &result.rows()[0];
        assert!((row.limits.ucl - (11.0 + 2.0 * 2.25 / 1.128)).abs() < 1e-9);
    }

    #[test]
    fn test_i_chart_constant_series_collapses_band() {
        let result = i_chart(&series(&[7.0, 7.0, 7.0])).expect("valid");
        for row in result.rows() {
            assert!((row.limits.ucl - 7.0).abs() < f64::EPSILON);
            assert!((row.limits.lcl - 7.0).abs() < f64::EPSILON);
            assert!(!row.out_of_limits);
        }
    }

    #[test]
    fn test_i_chart_inexact_constant_series_in_control() {
        for (value, len) in [(0.013, 5), (0.091, 3), (0.052, 10), (0.1, 7), (1.3e-7, 24)] {
            let result = i_chart(&series(&vec![value; len])).expect("valid");
            let group = &result.groups()[0];
            assert_eq!(group.center_line, value);
            for row in result.rows() {
                assert!(!row.out_of_limits, "{value} x {len} flagged");
                assert_eq!(row.sc_weight, 0.0);
            }
        }
    }

    #[test]
    fn test_i_chart_out_of_control() {
        let mut values = vec![25.0, 25.2, 24.8, 25.1, 24.9, 25.3, 25.0, 24.7, 25.1, 24.9];
        values.push(40.0);
        let result = i_chart(&series(&values)).expect("valid");
        assert!(!result.is_in_control());
        assert_eq!(result.out_of_limits().count(), 1);
    }

    #[test]
    fn test_i_chart_overflowing_ranges() {
        let data = series(&[f64::MAX, -f64::MAX]);
        let err = i_chart(&data).unwrap_err();
        assert!(matches!(err, ChartError::NonFiniteStatistic { .. }));
    }
}
