use thiserror::Error;

/// Errors surfaced by detectors and the parallel building blocks they use.
///
/// Degenerate geometry (tiny polygons, sub-threshold meshes) is not an error;
/// such shapes are dropped from the output.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{detector} requires a {expected} image, got {ndim}D")]
    Dimensionality {
        detector: &'static str,
        expected: &'static str,
        ndim: usize,
    },

    #[error("Interval {interval:?} exceeds grid extent {dims:?}")]
    IntervalOutOfBounds {
        interval: common::Interval,
        dims: [usize; 3],
    },

    #[error("Quality image extent {actual:?} does not match source extent {expected:?}")]
    QualityImageMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("block ix={ix}, iy={iy}: {source}")]
    Block {
        ix: usize,
        iy: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("{detector}: {source}")]
    Detector {
        detector: &'static str,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }

    pub(crate) fn in_detector(self, detector: &'static str) -> Self {
        Error::Detector {
            detector,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_block(self, ix: usize, iy: usize) -> Self {
        Error::Block {
            ix,
            iy,
            source: Box::new(self),
        }
    }
}
