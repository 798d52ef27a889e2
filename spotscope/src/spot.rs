//! Detection result types.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mesh::TriMesh;

/// Physical size of one pixel along x, y and z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration(pub [f64; 3]);

impl Default for Calibration {
    fn default() -> Self {
        Self([1.0; 3])
    }
}

impl Calibration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    pub fn isotropic(size: f64) -> Self {
        Self([size; 3])
    }

    #[inline]
    pub fn axis(&self, d: usize) -> f64 {
        self.0[d]
    }

    /// Physical volume (or area, for `ndim == 2`) of one pixel.
    pub fn cell_volume(&self, ndim: usize) -> f64 {
        self.0[..ndim].iter().product()
    }

    /// Multiplies each axis by the matching integer factor.
    pub fn scaled(&self, factors: [usize; 3]) -> Self {
        Self([
            self.0[0] * factors[0] as f64,
            self.0[1] * factors[1] as f64,
            self.0[2] * factors[2] as f64,
        ])
    }

    pub fn validate(&self) -> Result<()> {
        for (d, &c) in self.0.iter().enumerate() {
            if !c.is_finite() || c <= 0.0 {
                return Err(Error::invalid(format!(
                    "calibration on axis {d} must be finite and positive, got {c}"
                )));
            }
        }
        Ok(())
    }

    /// Physical coordinate of a (possibly fractional) pixel position.
    #[inline]
    pub fn to_physical(&self, pixel: DVec3) -> DVec3 {
        pixel * DVec3::from(self.0)
    }
}

/// Explicit boundary of a segmented object, in physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpotShape {
    /// Closed outline; the last vertex connects back to the first.
    Polygon(Vec<DVec2>),
    Mesh(TriMesh),
}

/// A detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    /// Centroid in physical units. Axes the image does not have are zero.
    pub position: DVec3,
    /// Equivalent radius in physical units.
    pub radius: f64,
    /// Ranking score; larger means more likely to be real.
    pub quality: f64,
    pub shape: Option<SpotShape>,
}

impl Spot {
    pub fn new(position: DVec3, radius: f64, quality: f64) -> Self {
        Self {
            position,
            radius,
            quality,
            shape: None,
        }
    }

    pub fn with_shape(mut self, shape: SpotShape) -> Self {
        self.shape = Some(shape);
        self
    }

    #[inline]
    pub fn distance_squared(&self, other: &Spot) -> f64 {
        self.position.distance_squared(other.position)
    }
}
