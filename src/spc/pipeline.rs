//! Shared limit computation pipeline.
//!
//! Every chart kind runs the same steps: validate rows, partition by
//! stratification keys, sort each group by its sort key, fit the group with
//! the kind-specific estimator, and assemble result rows. Only the fit step
//! differs between kinds.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::attributes;
use super::chart::{ChartKind, ChartResult, ChartRow, ControlLimits, GroupSummary, LimitConfig};
use super::variables;
use crate::error::{ChartError, Result};
use crate::table::Observation;

/// Fitted statistics for one group, in the group's sort order.
pub(crate) struct GroupFit {
    pub(crate) statistics: Vec<f64>,
    pub(crate) limits: Vec<ControlLimits>,
    pub(crate) center_line: f64,
    pub(crate) sigma: Option<f64>,
}

/// Compute control limits for any chart kind.
///
/// This is the function behind [`super::i_chart`], [`super::p_chart`],
/// [`super::p_prime_chart`], [`super::u_chart`] and [`super::u_prime_chart`].
///
/// # Inputs
///
/// - `observations`: the rows to chart. A denominator is required for every
///   kind except [`ChartKind::I`], which ignores it.
/// - `kind`: which limit formula to apply.
/// - `config`: sigma multiplier, moving range screening, and σz estimator.
///
/// # Output
///
/// One [`ChartRow`] per input row, grouped by stratification keys
/// (ascending) and sorted by sort key within each group, plus one
/// [`GroupSummary`] per group.
///
/// # Errors
///
/// Fails without a partial result if any row is invalid or any group has
/// fewer than two rows. See [`ChartError`] for the variants.
///
/// # Examples
///
/// ```
/// use shewhart::{compute, ChartKind, LimitConfig, Observation};
///
/// let data: Vec<Observation> = [5.0, 8.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &n)| Observation::new(i as i32, n).with_denominator(100.0))
///     .collect();
///
/// let result = compute(&data, ChartKind::P, &LimitConfig::default()).unwrap();
/// assert!((result.groups()[0].center_line - 0.065).abs() < 1e-12);
/// ```
pub fn compute(
    observations: &[Observation],
    kind: ChartKind,
    config: &LimitConfig,
) -> Result<ChartResult> {
    config.validate()?;
    if observations.is_empty() {
        return Err(ChartError::EmptyInput);
    }
    validate_rows(observations, kind)?;

    let mut rows = Vec::with_capacity(observations.len());
    let mut groups = Vec::new();

    for (strata, indices) in partition(observations)? {
        let label = group_label(&strata);
        if indices.len() < 2 {
            return Err(ChartError::InsufficientData {
                group: label,
                len: indices.len(),
            });
        }

        let group: Vec<&Observation> = indices.iter().map(|&i| &observations[i]).collect();
        let fit = match kind {
            ChartKind::I => variables::fit_individuals(&group, config, &label)?,
            _ => attributes::fit_attributes(&group, kind, config, &label)?,
        };

        debug!(
            chart = %kind,
            group = %label,
            len = group.len(),
            center_line = fit.center_line,
            sigma = ?fit.sigma,
            "fitted group"
        );

        for ((observation, statistic), limits) in group
            .into_iter()
            .zip(fit.statistics)
            .zip(fit.limits)
        {
            rows.push(ChartRow::new(observation.clone(), statistic, limits));
        }
        groups.push(GroupSummary {
            strata,
            center_line: fit.center_line,
            sigma: fit.sigma,
            len: indices.len(),
        });
    }

    let result = ChartResult::new(kind, rows, groups);
    info!(
        chart = %kind,
        rows = result.rows().len(),
        groups = result.groups().len(),
        out_of_limits = result.out_of_limits().count(),
        "computed control limits"
    );
    Ok(result)
}

/// Check every row against the kind's input contract.
fn validate_rows(observations: &[Observation], kind: ChartKind) -> Result<()> {
    let expected_strata = observations[0].strata.len();

    for (row, obs) in observations.iter().enumerate() {
        if !obs.value.is_finite() {
            return Err(ChartError::NonFiniteValue {
                row,
                value: obs.value,
            });
        }
        if obs.strata.len() != expected_strata {
            return Err(ChartError::InconsistentStrata {
                row,
                expected: expected_strata,
                found: obs.strata.len(),
            });
        }
        if obs.strata.iter().any(|s| s.trim().is_empty()) {
            return Err(ChartError::MissingStratum { row });
        }

        if !kind.requires_denominator() {
            continue;
        }
        let denominator = obs
            .denominator
            .ok_or(ChartError::MissingDenominator { chart: kind, row })?;
        if !denominator.is_finite() || denominator <= 0.0 {
            return Err(ChartError::InvalidDenominator {
                row,
                value: denominator,
            });
        }
        if obs.value < 0.0 {
            return Err(ChartError::NegativeValue {
                chart: kind,
                row,
                value: obs.value,
            });
        }
        if kind.is_proportion() && obs.value > denominator {
            return Err(ChartError::NumeratorExceedsDenominator {
                row,
                numerator: obs.value,
                denominator,
            });
        }
    }
    Ok(())
}

/// Group row indices by stratification keys and sort each group by sort key.
///
/// Groups come back in ascending key order. Sorting is stable; equal sort
/// keys within a group are rejected.
fn partition(observations: &[Observation]) -> Result<BTreeMap<Vec<String>, Vec<usize>>> {
    let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for (i, obs) in observations.iter().enumerate() {
        groups.entry(obs.strata.clone()).or_default().push(i);
    }

    for (strata, indices) in groups.iter_mut() {
        indices.sort_by(|&a, &b| observations[a].sort_key.cmp(&observations[b].sort_key));
        if let Some(pair) = indices
            .windows(2)
            .find(|w| observations[w[0]].sort_key == observations[w[1]].sort_key)
        {
            return Err(ChartError::DuplicateSortKey {
                group: group_label(strata),
                key: observations[pair[0]].sort_key.to_string(),
            });
        }
    }
    Ok(groups)
}

/// Human-readable name of a group for messages and captions.
pub(crate) fn group_label(strata: &[String]) -> String {
    if strata.is_empty() {
        "(all)".to_string()
    } else {
        strata.join(" / ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SortKey;

    fn counts(values: &[(f64, f64)]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &(num, den))| Observation::new(i as i32, num).with_denominator(den))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let err = compute(&[], ChartKind::I, &LimitConfig::default()).unwrap_err();
        assert!(matches!(err, ChartError::EmptyInput));
    }

    #[test]
    fn test_single_observation_is_insufficient() {
        let data = vec![Observation::new(1, 10.0)];
        let err = compute(&data, ChartKind::I, &LimitConfig::default()).unwrap_err();
        assert!(matches!(err, ChartError::InsufficientData { len: 1, .. }));
    }

    #[test]
    fn test_small_stratum_aborts_whole_call() {
        let data = vec![
            Observation::new(1, 10.0).with_strata(["a"]),
            Observation::new(2, 11.0).with_strata(["a"]),
            Observation::new(1, 12.0).with_strata(["b"]),
        ];
        let err = compute(&data, ChartKind::I, &LimitConfig::default()).unwrap_err();
        match err {
            ChartError::InsufficientData { group, len } => {
                assert_eq!(group, "b");
                assert_eq!(len, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_denominator() {
        let data = vec![Observation::new(1, 5.0), Observation::new(2, 8.0)];
        for kind in [ChartKind::P, ChartKind::PPrime, ChartKind::U, ChartKind::UPrime] {
            let err = compute(&data, kind, &LimitConfig::default()).unwrap_err();
            assert!(
                matches!(err, ChartError::MissingDenominator { row: 0, .. }),
                "{kind}: {err}"
            );
        }
    }

    #[test]
    fn test_i_chart_ignores_denominator() {
        let data = vec![
            Observation::new(1, 10.0).with_denominator(0.0),
            Observation::new(2, 12.0).with_denominator(-4.0),
        ];
        assert!(compute(&data, ChartKind::I, &LimitConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_denominator() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let data = counts(&[(5.0, 100.0), (3.0, bad)]);
            let err = compute(&data, ChartKind::U, &LimitConfig::default()).unwrap_err();
            assert!(matches!(err, ChartError::InvalidDenominator { row: 1, .. }));
        }
    }

    #[test]
    fn test_negative_count() {
        let data = counts(&[(5.0, 100.0), (-1.0, 100.0)]);
        let err = compute(&data, ChartKind::U, &LimitConfig::default()).unwrap_err();
        assert!(matches!(err, ChartError::NegativeValue { row: 1, .. }));
    }

    #[test]
    fn test_negative_individual_value_is_allowed() {
        let data = vec![Observation::new(1, -3.0), Observation::new(2, -5.0)];
        assert!(compute(&data, ChartKind::I, &LimitConfig::default()).is_ok());
    }

    #[test]
    fn test_numerator_exceeds_denominator() {
        let data = counts(&[(5.0, 100.0), (11.0, 10.0)]);
        let err = compute(&data, ChartKind::P, &LimitConfig::default()).unwrap_err();
        assert!(matches!(err, ChartError::NumeratorExceedsDenominator { row: 1, .. }));
        // Rates may exceed one.
        assert!(compute(&data, ChartKind::U, &LimitConfig::default()).is_ok());
    }

    #[test]
    fn test_non_finite_value() {
        let data = vec![Observation::new(1, 1.0), Observation::new(2, f64::NAN)];
        let err = compute(&data, ChartKind::I, &LimitConfig::default()).unwrap_err();
        assert!(matches!(err, ChartError::NonFiniteValue { row: 1, .. }));
    }

    #[test]
    fn test_inconsistent_strata() {
        let data = vec![
            Observation::new(1, 1.0).with_strata(["a"]),
            Observation::new(2, 2.0).with_strata(["a", "x"]),
        ];
        let err = compute(&data, ChartKind::I, &LimitConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ChartError::InconsistentStrata {
                row: 1,
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_blank_stratum_is_rejected() {
        let data = vec![
            Observation::new(1, 1.0).with_strata(["a"]),
            Observation::new(2, 2.0).with_strata(["  "]),
        ];
        let err = compute(&data, ChartKind::I, &LimitConfig::default()).unwrap_err();
        assert!(matches!(err, ChartError::MissingStratum { row: 1 }));
    }

    #[test]
    fn test_duplicate_sort_key() {
        let data = vec![
            Observation::new(1, 1.0),
            Observation::new(2, 2.0),
            Observation::new(1, 3.0),
        ];
        let err = compute(&data, ChartKind::I, &LimitConfig::default()).unwrap_err();
        match err {
            ChartError::DuplicateSortKey { key, .. } => assert_eq!(key, "1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_sort_key_in_different_strata_is_fine() {
        let data = vec![
            Observation::new(1, 1.0).with_strata(["a"]),
            Observation::new(2, 2.0).with_strata(["a"]),
            Observation::new(1, 3.0).with_strata(["b"]),
            Observation::new(2, 4.0).with_strata(["b"]),
        ];
        assert!(compute(&data, ChartKind::I, &LimitConfig::default()).is_ok());
    }

    #[test]
    fn test_output_order_follows_strata_then_sort_key() {
        let data = vec![
            Observation::new(3, 1.0).with_strata(["b"]),
            Observation::new(1, 2.0).with_strata(["b"]),
            Observation::new(2, 3.0).with_strata(["a"]),
            Observation::new(1, 4.0).with_strata(["a"]),
            Observation::new(2, 5.0).with_strata(["b"]),
        ];
        let result = compute(&data, ChartKind::I, &LimitConfig::default()).expect("valid");
        let order: Vec<(String, SortKey)> = result
            .rows()
            .iter()
            .map(|r| (r.observation.strata[0].clone(), r.observation.sort_key.clone()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), SortKey::from(1)),
                ("a".to_string(), SortKey::from(2)),
                ("b".to_string(), SortKey::from(1)),
                ("b".to_string(), SortKey::from(2)),
                ("b".to_string(), SortKey::from(3)),
            ]
        );
        assert_eq!(result.groups().len(), 2);
        assert_eq!(result.groups()[0].strata, vec!["a".to_string()]);
        assert_eq!(result.groups()[1].len, 3);
    }

    #[test]
    fn test_strata_never_share_center_line() {
        let data = vec![
            Observation::new(1, 10.0).with_strata(["a"]),
            Observation::new(2, 12.0).with_strata(["a"]),
            Observation::new(1, 100.0).with_strata(["b"]),
            Observation::new(2, 104.0).with_strata(["b"]),
        ];
        let result = compute(&data, ChartKind::I, &LimitConfig::default()).expect("valid");
        let a: Vec<f64> = result.rows()[..2].iter().map(|r| r.limits.cl).collect();
        let b: Vec<f64> = result.rows()[2..].iter().map(|r| r.limits.cl).collect();
        assert!(a.iter().all(|&cl| (cl - 11.0).abs() < 1e-12));
        assert!(b.iter().all(|&cl| (cl - 102.0).abs() < 1e-12));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let data = vec![Observation::new(1, 1.0), Observation::new(2, 2.0)];
        let config = LimitConfig {
            sigma_multiplier: -3.0,
            ..LimitConfig::default()
        };
        let err = compute(&data, ChartKind::I, &config).unwrap_err();
        assert!(matches!(err, ChartError::InvalidConfig(_)));
    }

    #[test]
    fn test_group_label() {
        assert_eq!(group_label(&[]), "(all)");
        assert_eq!(group_label(&["a".to_string(), "b".to_string()]), "a / b");
    }
}
