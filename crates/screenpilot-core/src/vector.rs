//! Real-valued 2-D vector arithmetic.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// A 2-D vector with `f64` components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

/// Right-hand side of a vector division.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Scalar(f64),
    Vector(Vector),
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl From<Vector> for Operand {
    fn from(value: Vector) -> Self {
        Operand::Vector(value)
    }
}

impl Vector {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Euclidean length, `sqrt(self · self)`.
    pub fn magnitude(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Divide by a scalar.
    ///
    /// Division by another vector has no meaning here and is rejected, as is
    /// division by zero or by a non-finite scalar.
    pub fn divide(self, rhs: impl Into<Operand>) -> Result<Self> {
        match rhs.into() {
            Operand::Vector(v) => Err(ApiError::invalid_operation(format!(
                "Cannot divide {} by vector {}",
                self, v
            ))),
            Operand::Scalar(k) if k == 0.0 || !k.is_finite() => Err(
                ApiError::invalid_operation(format!("Cannot divide {} by {}", self, k)),
            ),
            Operand::Scalar(k) => Ok(Self::new(self.x / k, self.y / k)),
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector({}, {})", self.x, self.y)
    }
}

impl Add for Vector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl Neg for Vector {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}
