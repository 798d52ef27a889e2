use super::*;

// ============================================================================
// LoG kernel
// ============================================================================

#[test]
fn test_log_kernel_size_and_center() {
    // radius 3*sqrt(2) in 2D gives sigma 3 px, half extent round(9) + 1 = 10.
    let kernel = log_kernel(3.0 * 2f64.sqrt(), 2, &Calibration::default());
    assert_eq!(kernel.ndim(), 2);
    assert_eq!(kernel.dims(), [23, 23, 1]);
    assert_eq!(kernel.center(), [11, 11, 0]);
}

#[test]
fn test_log_kernel_minimum_half_extent() {
    let kernel = log_kernel(0.1, 2, &Calibration::default());
    assert_eq!(kernel.dims(), [7, 7, 1]);
    assert_eq!(kernel.center(), [3, 3, 0]);
}

#[test]
fn test_log_kernel_positive_center_negative_ring() {
    let kernel = log_kernel(4.0, 2, &Calibration::default());
    let [cx, cy, _] = kernel.center();
    let w = kernel.weights();
    let center = *w.get(cx, cy, 0);
    assert!(center > 0.0);
    // sigma = 4 / sqrt(2) ~ 2.83; at 2 sigma the sign has flipped.
    assert!(*w.get(cx + 6, cy, 0) < 0.0);
    for &v in w.iter() {
        assert!(v <= center);
    }
}

#[test]
fn test_log_kernel_symmetric() {
    let kernel = log_kernel(3.0, 3, &Calibration::new(0.5, 0.5, 1.0));
    let w = kernel.weights();
    let [sx, sy, sz] = kernel.dims();
    for z in 0..sz {
        for y in 0..sy {
            for x in 0..sx {
                let a = *w.get(x, y, z);
                let b = *w.get(sx - 1 - x, sy - 1 - y, sz - 1 - z);
                assert!((a - b).abs() < 1e-15);
            }
        }
    }
}

#[test]
fn test_log_kernel_anisotropic_extent() {
    let kernel = log_kernel(3.0, 3, &Calibration::new(0.2, 0.2, 1.0));
    let [sx, sy, sz] = kernel.dims();
    assert_eq!(sx, sy);
    assert!(sz < sx);
}

#[test]
fn test_log_kernel_invariant_under_calibration_rescale() {
    let base = log_kernel(3.0, 2, &Calibration::isotropic(1.0));
    let scaled = log_kernel(0.75, 2, &Calibration::isotropic(0.25));
    assert_eq!(base.dims(), scaled.dims());
    for (a, b) in base.weights().iter().zip(scaled.weights().iter()) {
        assert!(
            (a - b).abs() <= 1e-12 * a.abs().max(1e-12),
            "weights differ: {a} vs {b}"
        );
    }
}

// ============================================================================
// Gaussian kernel
// ============================================================================

#[test]
fn test_gaussian_kernel_1d_normalization() {
    for sigma in [0.3, 1.0, 2.0, 3.5] {
        let kernel = gaussian_kernel_1d(sigma);
        let sum: f64 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12, "sum {sum} for sigma {sigma}");
    }
}

#[test]
fn test_gaussian_kernel_1d_size() {
    assert_eq!(gaussian_kernel_1d(2.0).len(), 15);
    assert_eq!(gaussian_kernel_1d(1.0).len(), 9);
    assert_eq!(gaussian_kernel_1d(0.6).len(), 7);
    // Small sigmas still get a 5-tap kernel.
    assert_eq!(gaussian_kernel_1d(0.1).len(), 5);
    assert_eq!(gaussian_half_width(0.1), 2);
}

#[test]
fn test_gaussian_kernel_1d_peak_at_center() {
    let kernel = gaussian_kernel_1d(1.5);
    let center = kernel.len() / 2;
    for (i, &v) in kernel.iter().enumerate() {
        if i != center {
            assert!(v < kernel[center]);
        }
        assert!((v - kernel[kernel.len() - 1 - i]).abs() < 1e-15);
    }
}

#[test]
#[should_panic(expected = "Sigma must be positive")]
fn test_gaussian_kernel_1d_zero_sigma_panics() {
    gaussian_kernel_1d(0.0);
}
