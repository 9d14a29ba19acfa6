//! # Geometry module
//!
//! Provides the planar primitives used throughout the follower: a polar
//! [`Vector`] for force/velocity demands and a [`Pose`] coupling a position
//! with a heading.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use util::maths::wrap_angle;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A two dimensional vector stored in polar form.
///
/// The magnitude is always non-negative and the direction is always in the
/// half-open interval `(-pi, pi]`. Constructors enforce this, so any two
/// vectors describing the same physical quantity compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Length of the vector
    magnitude: f64,

    /// Direction of the vector (rad)
    theta: f64,
}

/// A position and heading in the field frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in the field frame
    pub position: Vector2<f64>,

    /// Heading (rad), normalised into `(-pi, pi]`
    pub heading: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Vector {
    /// Create a new vector from a magnitude and direction.
    ///
    /// A negative magnitude is folded into the direction, so
    /// `Vector::new(-1.0, 0.0)` is the same vector as `Vector::new(1.0, PI)`.
    pub fn new(magnitude: f64, theta: f64) -> Self {
        if magnitude < 0f64 {
            Self {
                magnitude: -magnitude,
                theta: wrap_angle(theta + std::f64::consts::PI),
            }
        } else {
            Self {
                magnitude,
                theta: wrap_angle(theta),
            }
        }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Create a vector from cartesian components.
    pub fn from_components(x: f64, y: f64) -> Self {
        Self::new(x.hypot(y), y.atan2(x))
    }

    /// Convert a cartesian `nalgebra` vector into polar form.
    pub fn from_vector2(v: Vector2<f64>) -> Self {
        Self::from_components(v[0], v[1])
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Cartesian x component.
    pub fn x(&self) -> f64 {
        self.magnitude * self.theta.cos()
    }

    /// Cartesian y component.
    pub fn y(&self) -> f64 {
        self.magnitude * self.theta.sin()
    }

    /// Convert to a cartesian `nalgebra` vector.
    pub fn as_vector2(&self) -> Vector2<f64> {
        Vector2::new(self.x(), self.y())
    }

    /// A copy of this vector with a new magnitude but the same direction.
    pub fn with_magnitude(&self, magnitude: f64) -> Self {
        Self::new(magnitude, self.theta)
    }

    /// A copy of this vector rotated by the given angle.
    pub fn rotated(&self, angle: f64) -> Self {
        Self::new(self.magnitude, self.theta + angle)
    }

    /// A unit vector in the same direction, or the zero vector if this vector
    /// has no direction to speak of.
    pub fn normalised(&self) -> Self {
        if self.magnitude == 0f64 {
            Self::zero()
        } else {
            self.with_magnitude(1f64)
        }
    }

    /// Dot product with another vector.
    pub fn dot(&self, other: &Self) -> f64 {
        self.x() * other.x() + self.y() * other.y()
    }
}

impl std::ops::Add for Vector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_components(self.x() + rhs.x(), self.y() + rhs.y())
    }
}

impl std::ops::Sub for Vector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_components(self.x() - rhs.x(), self.y() - rhs.y())
    }
}

impl std::ops::Mul<f64> for Vector {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.magnitude * rhs, self.theta)
    }
}

impl std::ops::Neg for Vector {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(self.magnitude, self.theta + std::f64::consts::PI)
    }
}

impl Pose {
    /// Create a new pose, normalising the heading.
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            position: Vector2::new(x, y),
            heading: wrap_angle(heading),
        }
    }

    pub fn x(&self) -> f64 {
        self.position[0]
    }

    pub fn y(&self) -> f64 {
        self.position[1]
    }

    /// Euclidean distance to another pose, ignoring heading.
    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.position - other.position).norm()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
