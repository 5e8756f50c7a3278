//! Integer screen points and sampled colors.
//!
//! A [`ScreenPoint`] is a plain value: moving it around (`above`, `offset`,
//! arithmetic) always produces a new point. Anything that touches the real
//! cursor lives on [`GestureMachine`](crate::gesture::GestureMachine), and the
//! live position of a multi-step gesture lives on
//! [`GestureSession`](crate::gesture::GestureSession).

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::vector::Vector;

/// A pixel on the display. Coordinates may be negative on multi-monitor setups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
    /// Human-readable tag shown in logs. Never used in computation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y, label: None }
    }

    /// Build a point from a vector, truncating each component toward zero.
    pub fn from_vector(v: Vector) -> Self {
        Self::new(v.x as i32, v.y as i32)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn xy(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn to_vector(&self) -> Vector {
        Vector::new(f64::from(self.x), f64::from(self.y))
    }

    /// Scale both coordinates and truncate the result.
    pub fn scale(&self, k: f64) -> Self {
        Self::from_vector(self.to_vector().scale(k))
    }

    /// Shift by an arbitrary (possibly negative) amount.
    pub fn offset(&self, dx: i32, dy: i32) -> Result<Self> {
        match (self.x.checked_add(dx), self.y.checked_add(dy)) {
            (Some(x), Some(y)) => Ok(Self::new(x, y)),
            _ => Err(ApiError::invalid_argument(format!(
                "offset({}, {}) of {} leaves the coordinate range",
                dx, dy, self
            ))),
        }
    }

    pub fn above(&self, dy: i32) -> Result<Self> {
        let dy = non_negative("above", dy)?;
        self.shifted("above", 0, -dy)
    }

    pub fn below(&self, dy: i32) -> Result<Self> {
        let dy = non_negative("below", dy)?;
        self.shifted("below", 0, dy)
    }

    pub fn left(&self, dx: i32) -> Result<Self> {
        let dx = non_negative("left", dx)?;
        self.shifted("left", -dx, 0)
    }

    pub fn right(&self, dx: i32) -> Result<Self> {
        let dx = non_negative("right", dx)?;
        self.shifted("right", dx, 0)
    }

    fn shifted(&self, op: &str, dx: i32, dy: i32) -> Result<Self> {
        self.offset(dx, dy).map_err(|_| {
            ApiError::invalid_argument(format!(
                "{}({}) of {} leaves the coordinate range",
                op,
                dx.abs().max(dy.abs()),
                self
            ))
        })
    }

    /// Midpoint of the segment between `self` and `other`, truncated.
    pub fn midpoint_to(&self, other: impl Into<ScreenPoint>) -> Self {
        let other = other.into();
        Self::from_vector((self + &other).to_vector().scale(0.5))
    }

    pub fn distance_to(&self, other: impl Into<ScreenPoint>) -> f64 {
        let other = other.into();
        (self - &other).to_vector().magnitude()
    }
}

fn non_negative(op: &str, delta: i32) -> Result<i32> {
    if delta < 0 {
        return Err(ApiError::invalid_argument(format!(
            "{}({}): expected a non-negative integer",
            op, delta
        )));
    }
    Ok(delta)
}

/// Validate a delta that arrived as an untyped number (JSON, CLI).
///
/// Fractional, non-finite or out-of-range values are rejected so that `1.5`
/// never silently becomes `1`.
pub fn integral_delta(value: f64) -> Result<i32> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(ApiError::invalid_argument(format!(
            "{} is not an integer pixel count",
            value
        )));
    }
    if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(ApiError::invalid_argument(format!(
            "{} is outside the coordinate range",
            value
        )));
    }
    Ok(value as i32)
}

impl fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "ScreenPoint({}, {} '{}')", self.x, self.y, label),
            None => write!(f, "ScreenPoint({}, {})", self.x, self.y),
        }
    }
}

impl From<Vector> for ScreenPoint {
    fn from(v: Vector) -> Self {
        Self::from_vector(v)
    }
}

impl From<(i32, i32)> for ScreenPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<&ScreenPoint> for ScreenPoint {
    fn from(p: &ScreenPoint) -> Self {
        p.clone()
    }
}

impl Add for &ScreenPoint {
    type Output = ScreenPoint;

    fn add(self, rhs: Self) -> Self::Output {
        ScreenPoint::from_vector(self.to_vector() + rhs.to_vector())
    }
}

impl Sub for &ScreenPoint {
    type Output = ScreenPoint;

    fn sub(self, rhs: Self) -> Self::Output {
        ScreenPoint::from_vector(self.to_vector() - rhs.to_vector())
    }
}

impl Neg for &ScreenPoint {
    type Output = ScreenPoint;

    fn neg(self) -> Self::Output {
        ScreenPoint::from_vector(-self.to_vector())
    }
}

/// An RGB color sampled from the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Decode the first pixel of a BGR capture buffer.
    pub fn from_bgr(buffer: &[u8]) -> Option<Self> {
        match buffer {
            [b, g, r, ..] => Some(Self::new(*r, *g, *b)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
