//! Spotscope - spot detection and shape extraction for microscopy images.
//!
//! Finds blob-like or arbitrarily shaped objects in 1D, 2D and 3D
//! single-channel images and reports each as a [`Spot`]: a calibrated
//! position, an equivalent radius, a quality score and, for segmented
//! objects, a polygon outline (2D) or a closed triangle mesh (3D).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use common::Grid;
//! use spotscope::{BlobConfig, Calibration, Frame, LogDetector, SpotDetector};
//!
//! let detector = LogDetector::new(BlobConfig {
//!     radius: 2.5,
//!     ..Default::default()
//! })?;
//! let frame = Frame::new(&image).with_calibration(Calibration::new(0.2, 0.2, 1.0));
//! let spots = detector.detect(&frame)?;
//! ```

pub mod config;
pub mod contour;
pub mod convolution;
pub mod detector;
pub mod error;
pub mod filter;
pub mod kernel;
pub mod maxima;
pub mod mesh;
pub mod segment;
pub mod shapes;
pub mod simplify;
pub mod spot;

#[cfg(test)]
pub mod testing;


// ============================================================================
// Results and errors
// ============================================================================

pub use error::{Error, Result};
pub use mesh::TriMesh;
pub use spot::{Calibration, Spot, SpotShape};

// ============================================================================
// Detectors
// ============================================================================

pub use config::{
    BlobConfig, BlockLogConfig, Connectivity, DownsampleLogConfig, FindMaximaConfig,
    HessianConfig, LabelImageConfig, Threshold, ThresholdConfig,
};
pub use detector::{
    dedup_spots, detect_frames, BlockLogDetector, DogDetector, DownsampleLogDetector,
    FindMaximaDetector, Frame, HessianDetector, LabelImageDetector, LogDetector, SpotDetector,
    ThresholdDetector,
};
