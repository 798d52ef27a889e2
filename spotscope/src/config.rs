//! Detector configuration types.
//!
//! One plain struct per detector, validated once when the detector is built.
//! Every struct deserializes with per-field defaults so partial settings can
//! be loaded from JSON or YAML.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Enums
// ============================================================================

/// Pixel connectivity for connected component labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Neighbours share a face: 4-connectivity in 2D, 6-connectivity in 3D.
    #[default]
    Face,
    /// Neighbours share a face, edge or corner: 8-connectivity in 2D,
    /// 26-connectivity in 3D.
    Full,
}

/// How the segmentation threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Threshold {
    /// Pixels strictly above this value are foreground. `Fixed(0.0)` turns
    /// the detector into a mask importer.
    Fixed(f64),
    /// Otsu threshold over the analysed interval.
    #[default]
    Otsu,
}

// ============================================================================
// Blob detectors
// ============================================================================

/// Settings shared by the LoG and DoG detectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Expected blob radius in physical units.
    pub radius: f64,
    /// Minimum filter response for a maximum to be kept.
    pub threshold: f64,
    pub subpixel: bool,
    /// Apply a 3x3 median filter per plane before filtering.
    pub median_filter: bool,
    pub num_threads: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            threshold: 0.0,
            subpixel: true,
            median_filter: false,
            num_threads: 1,
        }
    }
}

impl BlobConfig {
    pub fn validate(&self) -> Result<()> {
        validate_radius("radius", self.radius)?;
        validate_finite("threshold", self.threshold)?;
        validate_threads(self.num_threads)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HessianConfig {
    /// Expected radius in the xy-plane, in physical units.
    pub radius_xy: f64,
    /// Expected radius along z, in physical units. Ignored for 2D images.
    pub radius_z: f64,
    pub threshold: f64,
    /// Rescale the determinant response to [0, 1] per frame.
    pub normalize: bool,
    pub subpixel: bool,
    pub num_threads: usize,
}

impl Default for HessianConfig {
    fn default() -> Self {
        Self {
            radius_xy: 5.0,
            radius_z: 8.0,
            threshold: 0.0,
            normalize: false,
            subpixel: true,
            num_threads: 1,
        }
    }
}

impl HessianConfig {
    pub fn validate(&self) -> Result<()> {
        validate_radius("radius_xy", self.radius_xy)?;
        validate_radius("radius_z", self.radius_z)?;
        validate_finite("threshold", self.threshold)?;
        validate_threads(self.num_threads)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownsampleLogConfig {
    pub radius: f64,
    pub threshold: f64,
    /// Integer box size along x and y. The z factor follows from the
    /// voxel aspect ratio.
    pub downsample_factor: usize,
    pub num_threads: usize,
}

impl Default for DownsampleLogConfig {
    fn default() -> Self {
        Self {
            radius: 5.0,
            threshold: 0.0,
            downsample_factor: 4,
            num_threads: 1,
        }
    }
}

impl DownsampleLogConfig {
    pub fn validate(&self) -> Result<()> {
        validate_radius("radius", self.radius)?;
        validate_finite("threshold", self.threshold)?;
        if self.downsample_factor < 1 {
            return Err(Error::invalid(format!(
                "downsample_factor must be at least 1, got {}",
                self.downsample_factor
            )));
        }
        validate_threads(self.num_threads)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockLogConfig {
    #[serde(flatten)]
    pub blob: BlobConfig,
    /// Number of tiles along x and along y.
    pub num_splits: usize,
}

impl Default for BlockLogConfig {
    fn default() -> Self {
        Self {
            blob: BlobConfig::default(),
            num_splits: 2,
        }
    }
}

impl BlockLogConfig {
    pub fn validate(&self) -> Result<()> {
        self.blob.validate()?;
        if self.num_splits < 1 {
            return Err(Error::invalid(format!(
                "num_splits must be at least 1, got {}",
                self.num_splits
            )));
        }
        Ok(())
    }
}

/// Settings of the tolerance-based maxima detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindMaximaConfig {
    /// How far below a maximum its region extends. Weaker maxima inside
    /// that region are absorbed.
    pub tolerance: f64,
    /// Radius given to every spot, in physical units.
    pub radius: f64,
    pub num_threads: usize,
}

impl Default for FindMaximaConfig {
    fn default() -> Self {
        Self {
            tolerance: 10.0,
            radius: 2.0,
            num_threads: 1,
        }
    }
}

impl FindMaximaConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::invalid(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        validate_radius("radius", self.radius)?;
        validate_threads(self.num_threads)
    }
}

// ============================================================================
// Segmentation detectors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub threshold: Threshold,
    /// Resample and simplify polygon outlines / decimate meshes.
    pub simplify: bool,
    /// Physical scale of the Gaussian smoothing applied to each object mask
    /// before outline extraction. Zero disables smoothing.
    pub smoothing_scale: f64,
    /// Attach outlines (2D) or meshes (3D). Without shapes, each connected
    /// component is reduced to a centroid and equivalent radius.
    pub shapes: bool,
    pub connectivity: Connectivity,
    pub num_threads: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: Threshold::Otsu,
            simplify: true,
            smoothing_scale: 0.0,
            shapes: true,
            connectivity: Connectivity::Face,
            num_threads: 1,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        if let Threshold::Fixed(value) = self.threshold {
            validate_finite("threshold", value)?;
        }
        validate_smoothing(self.smoothing_scale)?;
        validate_threads(self.num_threads)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelImageConfig {
    pub simplify: bool,
    pub smoothing_scale: f64,
    pub shapes: bool,
    pub num_threads: usize,
}

impl Default for LabelImageConfig {
    fn default() -> Self {
        Self {
            simplify: true,
            smoothing_scale: 0.0,
            shapes: true,
            num_threads: 1,
        }
    }
}

impl LabelImageConfig {
    pub fn validate(&self) -> Result<()> {
        validate_smoothing(self.smoothing_scale)?;
        validate_threads(self.num_threads)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_radius(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::invalid(format!(
            "{name} must be finite and positive, got {value}"
        )));
    }
    Ok(())
}

fn validate_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::invalid(format!("{name} must be finite, got {value}")));
    }
    Ok(())
}

fn validate_smoothing(value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid(format!(
            "smoothing_scale must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

fn validate_threads(num_threads: usize) -> Result<()> {
    if num_threads == 0 {
        return Err(Error::invalid("num_threads must be at least 1"));
    }
    Ok(())
}
