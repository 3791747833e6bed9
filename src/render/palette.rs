//! Point colors for in-limit and out-of-limit observations.

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

/// Which side of the center line is the desirable one.
///
/// Decides whether out-of-limit points are drawn as bad (red) or good
/// (green) news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BetterDirection {
    /// Any special cause is bad: every out-of-limit point is red.
    #[default]
    None,
    /// Lower is better: points below the LCL are green, above the UCL red.
    Lower,
    /// Higher is better: points above the UCL are green, below the LCL red.
    Higher,
}

pub(crate) const IN_LIMITS: RGBColor = RGBColor(31, 119, 180);
pub(crate) const REFERENCE: RGBColor = RGBColor(128, 128, 128);

const DARK_RED: RGBColor = RGBColor(139, 0, 0);
const RED: RGBColor = RGBColor(255, 0, 0);
const DARK_GREEN: RGBColor = RGBColor(0, 100, 0);
const GREEN: RGBColor = RGBColor(0, 160, 0);

/// Color of a point with special-cause weight `weight`.
///
/// Out-of-limit points run from the dark to the light end of their scale as
/// `|weight|` approaches `max_weight`.
pub(crate) fn point_color(weight: f64, max_weight: f64, direction: BetterDirection) -> RGBColor {
    if weight == 0.0 {
        return IN_LIMITS;
    }
    let good = match direction {
        BetterDirection::None => false,
        BetterDirection::Lower => weight < 0.0,
        BetterDirection::Higher => weight > 0.0,
    };
    let (dark, light) = if good { (DARK_GREEN, GREEN) } else { (DARK_RED, RED) };
    let t = if max_weight > 0.0 {
        (weight.abs() / max_weight).clamp(0.0, 1.0)
    } else {
        1.0
    };
    lerp(dark, light, t)
}

fn lerp(from: RGBColor, to: RGBColor, t: f64) -> RGBColor {
    let channel = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    RGBColor(
        channel(from.0, to.0),
        channel(from.1, to.1),
        channel(from.2, to.2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_limits_is_blue() {
        assert_eq!(point_color(0.0, 3.0, BetterDirection::Lower), IN_LIMITS);
    }

    #[test]
    fn test_direction_none_is_always_red() {
        let above = point_color(1.0, 2.0, BetterDirection::None);
        let below = point_color(-1.0, 2.0, BetterDirection::None);
        assert!(above.0 > above.1);
        assert!(below.0 > below.1);
    }

    #[test]
    fn test_lower_is_better() {
        let below = point_color(-2.0, 2.0, BetterDirection::Lower);
        let above = point_color(2.0, 2.0, BetterDirection::Lower);
        assert_eq!(below, GREEN);
        assert_eq!(above, RED);
    }

    #[test]
    fn test_higher_is_better() {
        assert_eq!(point_color(2.0, 2.0, BetterDirection::Higher), GREEN);
        assert_eq!(point_color(-2.0, 2.0, BetterDirection::Higher), RED);
    }

    #[test]
    fn test_severity_grades_toward_light_end() {
        let mild = point_color(0.1, 4.0, BetterDirection::None);
        let severe = point_color(4.0, 4.0, BetterDirection::None);
        assert!(mild.0 < severe.0);
        assert_eq!(severe, RED);
    }

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(DARK_RED, RED, 0.0), DARK_RED);
        assert_eq!(lerp(DARK_RED, RED, 1.0), RED);
    }
}
