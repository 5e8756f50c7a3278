//! Straight-line pointer paths.
//!
//! A pointer move is not a teleport: applications that detect drags by
//! distance or time thresholds only see a drag when the cursor travels through
//! intermediate positions. [`LinePath`] yields those positions.
//!
//! The walk advances along the *dominant* axis (the one with the larger
//! displacement) in fixed steps and derives the other coordinate from the
//! slope of the line:
//!
//! ```text
//! a = a1 + la
//! b = trunc(k * la) + b1        k = (b2 - b1) / (a2 - a1)
//! ```
//!
//! `la` runs from `0` toward `a2 - a1` while `|la| <= |a2 - a1|`, so the last
//! yielded point can fall short of the destination when the distance is not
//! a multiple of the step. Gestures leave the cursor there and record the
//! destination as the live position.
//!
//! # Example
//!
//! ```
//! use screenpilot_core::path::LinePath;
//! use screenpilot_core::point::ScreenPoint;
//!
//! let steps: Vec<_> = LinePath::new(&ScreenPoint::new(0, 0), &ScreenPoint::new(25, 5), 10)
//!     .map(|p| p.xy())
//!     .collect();
//! assert_eq!(steps, vec![(0, 0), (10, 2), (20, 4)]);
//! ```

use crate::point::ScreenPoint;

/// Axis the walk advances along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Iterator over the intermediate points of a straight move.
#[derive(Debug, Clone)]
pub struct LinePath {
    axis: Axis,
    a1: i64,
    b1: i64,
    span: i64,
    slope: f64,
    step: i64,
    la: i64,
    done: bool,
}

impl LinePath {
    /// Plan a walk from `from` to `to`, advancing `step` pixels per point.
    ///
    /// A zero `step` is treated as `1`. When both points coincide the path is
    /// empty.
    pub fn new(from: &ScreenPoint, to: &ScreenPoint, step: u32) -> Self {
        let dx = i64::from(to.x) - i64::from(from.x);
        let dy = i64::from(to.y) - i64::from(from.y);

        let (axis, a1, b1, a2, b2) = if dx.abs() >= dy.abs() {
            (Axis::X, from.x, from.y, to.x, to.y)
        } else {
            (Axis::Y, from.y, from.x, to.y, to.x)
        };
        let (a1, b1) = (i64::from(a1), i64::from(b1));
        let span = i64::from(a2) - a1;
        let slope = if span == 0 {
            0.0
        } else {
            (i64::from(b2) - b1) as f64 / span as f64
        };

        Self {
            axis,
            a1,
            b1,
            span,
            slope,
            step: i64::from(step.max(1)) * span.signum(),
            la: 0,
            done: dx == 0 && dy == 0,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }
}

impl Iterator for LinePath {
    type Item = ScreenPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.la.abs() > self.span.abs() {
            return None;
        }

        let a = self.a1 + self.la;
        // Truncation toward zero is part of the pixel path, not a rounding bug.
        let b = (self.slope * self.la as f64) as i64 + self.b1;
        self.la += self.step;

        // Both coordinates stay between the endpoints, so they fit in i32.
        let (a, b) = (a as i32, b as i32);
        Some(match self.axis {
            Axis::X => ScreenPoint::new(a, b),
            Axis::Y => ScreenPoint::new(b, a),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(from: (i32, i32), to: (i32, i32), step: u32) -> Vec<(i32, i32)> {
        LinePath::new(&from.into(), &to.into(), step)
            .map(|p| p.xy())
            .collect()
    }

    #[test]
    fn test_same_point_is_empty() {
        assert!(walk((5, 5), (5, 5), 10).is_empty());
    }

    #[test]
    fn test_dominant_axis_choice() {
        let along_y = LinePath::new(&(0, 0).into(), &(5, 100).into(), 10);
        assert_eq!(along_y.axis(), Axis::Y);

        let along_x = LinePath::new(&(0, 0).into(), &(100, 5).into(), 10);
        assert_eq!(along_x.axis(), Axis::X);

        // Ties go to x.
        let diagonal = LinePath::new(&(0, 0).into(), &(30, 30).into(), 10);
        assert_eq!(diagonal.axis(), Axis::X);
    }

    #[test]
    fn test_steps_along_x() {
        let steps = walk((0, 0), (100, 37), 10);
        assert_eq!(steps.len(), 11);
        assert_eq!(steps[0], (0, 0));
        assert_eq!(steps[1], (10, 3));
        assert_eq!(steps[5], (50, 18));
        assert_eq!(*steps.last().unwrap(), (100, 37));
    }

    #[test]
    fn test_steps_along_y() {
        let steps = walk((0, 0), (5, 100), 10);
        assert_eq!(steps.len(), 11);
        assert!(steps.iter().enumerate().all(|(i, &(_, y))| y == i as i32 * 10));
        assert_eq!(steps[1], (0, 10));
        assert_eq!(steps[2], (1, 20));
        assert_eq!(*steps.last().unwrap(), (5, 100));
    }

    #[test]
    fn test_partial_last_step_stops_short() {
        assert_eq!(walk((0, 0), (25, 0), 10), vec![(0, 0), (10, 0), (20, 0)]);
    }

    #[test]
    fn test_negative_direction() {
        assert_eq!(
            walk((50, 10), (20, 10), 10),
            vec![(50, 10), (40, 10), (30, 10), (20, 10)]
        );
        assert_eq!(walk((0, 0), (0, -20), 10), vec![(0, 0), (0, -10), (0, -20)]);
    }

    #[test]
    fn test_negative_slope_truncates_toward_zero() {
        // k = -1/3: trunc(-3.33) = -3, trunc(-6.67) = -6 (floor would give -4 and -7).
        assert_eq!(
            walk((0, 0), (30, -10), 10),
            vec![(0, 0), (10, -3), (20, -6), (30, -10)]
        );
    }

    #[test]
    fn test_offset_origin() {
        assert_eq!(
            walk((100, 200), (120, 210), 10),
            vec![(100, 200), (110, 205), (120, 210)]
        );
    }

    #[test]
    fn test_zero_step_is_clamped() {
        assert_eq!(walk((0, 0), (3, 0), 0).len(), 4);
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let steps: Vec<_> = LinePath::new(
            &ScreenPoint::new(i32::MIN, 0),
            &ScreenPoint::new(i32::MAX, 0),
            u32::MAX,
        )
        .collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].x, i32::MIN);
    }
}
