//! Static SVG rendering of chart results.
//!
//! One panel per stratification group, stacked vertically. Each panel shows
//! the statistic as a line with markers, the center line and the (possibly
//! stepped) control limits as dashed grey lines, and out-of-limit points
//! colored by their special-cause weight.

mod palette;

use std::fmt;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ChartError, Result};
use crate::spc::{group_label, ChartResult, ChartRow};

pub use palette::BetterDirection;

const FONT: &str = "sans-serif";

/// Presentation options for [`render_svg`] and [`save_svg`].
///
/// # Examples
///
/// ```
/// use shewhart::{BetterDirection, RenderOptions};
///
/// let options = RenderOptions {
///     title: "Falls per 1,000 bed days".into(),
///     better_direction: BetterDirection::Lower,
///     ..RenderOptions::default()
/// };
/// assert_eq!(options.width, 1100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Figure title; omitted when empty.
    pub title: String,
    /// X axis description.
    pub x_label: String,
    /// Y axis description; the chart kind label when empty.
    pub y_label: String,
    /// Color scheme for out-of-limit points.
    pub better_direction: BetterDirection,
    /// Label every out-of-limit point with its sort key.
    pub annotate_out_of_limits: bool,
    /// Sort keys (as displayed) to label regardless of their flag.
    pub annotate_keys: Vec<String>,
    /// Show sort keys as x tick labels.
    pub show_x_ticks: bool,
    /// Format the y axis as a percentage. Defaults to on for P and P′ charts.
    pub percent_axis: Option<bool>,
    /// Figure width in pixels.
    pub width: u32,
    /// Figure height in pixels, shared by all panels.
    pub height: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            better_direction: BetterDirection::None,
            annotate_out_of_limits: false,
            annotate_keys: Vec::new(),
            show_x_ticks: true,
            percent_axis: None,
            width: 1100,
            height: 850,
        }
    }
}

fn render_error<E: fmt::Display>(err: E) -> ChartError {
    ChartError::Render(err.to_string())
}

/// Render `result` as an SVG document.
///
/// # Errors
///
/// Returns [`ChartError::EmptyInput`] for a result without rows and
/// [`ChartError::Render`] if the drawing backend fails.
///
/// # Examples
///
/// ```
/// use shewhart::{i_chart, render_svg, Observation, RenderOptions};
///
/// let data: Vec<Observation> = [10.0, 12.0, 11.0, 13.0, 9.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &v)| Observation::new(i as i32, v))
///     .collect();
/// let result = i_chart(&data).unwrap();
///
/// let options = RenderOptions { title: "Wait time".into(), ..RenderOptions::default() };
/// let svg = render_svg(&result, &options).unwrap();
/// assert!(svg.contains("Wait time"));
/// ```
pub fn render_svg(result: &ChartResult, options: &RenderOptions) -> Result<String> {
    if result.rows().is_empty() {
        return Err(ChartError::EmptyInput);
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(render_error)?;

        let body = if options.title.is_empty() {
            root.clone()
        } else {
            root.titled(&options.title, (FONT, 24).into_font())
                .map_err(render_error)?
        };

        let max_weight = result
            .rows()
            .iter()
            .map(|row| row.sc_weight.abs())
            .fold(0.0, f64::max);

        let panels = body.split_evenly((result.groups().len(), 1));
        for (panel, group) in panels.iter().zip(result.groups()) {
            let rows: Vec<&ChartRow> = result.group_rows(&group.strata).collect();
            let caption = if group.strata.is_empty() {
                None
            } else {
                Some(group_label(&group.strata))
            };
            debug!(group = ?caption, rows = rows.len(), "drawing panel");
            draw_panel(panel, result, &rows, caption.as_deref(), max_weight, options)?;
        }

        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

/// Render `result` and write the SVG document to `path`.
///
/// # Errors
///
/// Same as [`render_svg`], plus [`ChartError::Io`] if the file cannot be
/// written.
pub fn save_svg(result: &ChartResult, options: &RenderOptions, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let svg = render_svg(result, options)?;
    std::fs::write(path, svg)?;
    info!(path = %path.display(), chart = %result.kind(), "chart saved");
    Ok(())
}

fn y_range(rows: &[&ChartRow]) -> (f64, f64) {
    let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
        (
            lo.min(row.statistic).min(row.limits.lcl),
            hi.max(row.statistic).max(row.limits.ucl),
        )
    });
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.08
    } else {
        (hi.abs() * 0.1).max(1.0)
    };
    (lo - pad, hi + pad)
}

/// Stepped polyline: each row's value spans `[i - 0.5, i + 0.5]`.
fn stepped(rows: &[&ChartRow], pick: impl Fn(&ChartRow) -> f64) -> Vec<(f64, f64)> {
    rows.iter()
        .enumerate()
        .flat_map(|(i, row)| {
            let x = i as f64;
            let y = pick(row);
            [(x - 0.5, y), (x + 0.5, y)]
        })
        .collect()
}

fn draw_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    result: &ChartResult,
    rows: &[&ChartRow],
    caption: Option<&str>,
    max_weight: f64,
    options: &RenderOptions,
) -> Result<()> {
    let n = rows.len();
    let (y_lo, y_hi) = y_range(rows);
    let percent = options
        .percent_axis
        .unwrap_or_else(|| result.kind().is_proportion());

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60);
    if let Some(caption) = caption {
        builder.caption(caption, (FONT, 18).into_font());
    }
    let mut chart = builder
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_lo..y_hi)
        .map_err(render_error)?;

    let x_formatter = |x: &f64| {
        let index = x.round();
        if !options.show_x_ticks || (x - index).abs() > 1e-6 || index < 0.0 {
            return String::new();
        }
        rows.get(index as usize)
            .map(|row| row.observation.sort_key.to_string())
            .unwrap_or_default()
    };
    let y_formatter = |y: &f64| {
        if percent {
            format!("{:.1}%", y * 100.0)
        } else {
            format!("{y:.2}")
        }
    };
    let y_desc = if options.y_label.is_empty() {
        result.kind().label().to_string()
    } else {
        options.y_label.clone()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n.min(12))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .x_desc(options.x_label.as_str())
        .y_desc(y_desc)
        .label_style((FONT, 12).into_font())
        .draw()
        .map_err(render_error)?;

    for pick in [
        (|row: &ChartRow| row.limits.ucl) as fn(&ChartRow) -> f64,
        |row: &ChartRow| row.limits.cl,
        |row: &ChartRow| row.limits.lcl,
    ] {
        chart
            .draw_series(DashedLineSeries::new(
                stepped(rows, pick),
                6,
                4,
                palette::REFERENCE.stroke_width(1),
            ))
            .map_err(render_error)?;
    }

    chart
        .draw_series(LineSeries::new(
            rows.iter()
                .enumerate()
                .map(|(i, row)| (i as f64, row.statistic)),
            palette::IN_LIMITS.stroke_width(2),
        ))
        .map_err(render_error)?;

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            let color = palette::point_color(row.sc_weight, max_weight, options.better_direction);
            Circle::new((i as f64, row.statistic), 4, color.filled())
        }))
        .map_err(render_error)?;

    let annotations: Vec<Text<'_, (f64, f64), String>> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let key = row.observation.sort_key.to_string();
            let wanted = (options.annotate_out_of_limits && row.out_of_limits)
                || options.annotate_keys.contains(&key);
            wanted.then(|| Text::new(key, (i as f64, row.statistic), (FONT, 12).into_font()))
        })
        .collect();
    chart.draw_series(annotations).map_err(render_error)?;

    Ok(())
}
