use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use nalgebra::Point2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{GcfdError, Result};
use crate::image::{sample_bilinear, Image};

/// How far the polar rays reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolarMode {
    /// Rays reach the farthest corner; samples outside the image are zero.
    Full,
    /// Rays stop at the inscribed circle, so every sample lies inside.
    #[default]
    Crop,
}

impl FromStr for PolarMode {
    type Err = GcfdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(PolarMode::Full),
            "crop" => Ok(PolarMode::Crop),
            other => Err(GcfdError::invalid_input(format!(
                "unknown polar mode '{other}', expected 'full' or 'crop'"
            ))),
        }
    }
}

impl fmt::Display for PolarMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolarMode::Full => write!(f, "full"),
            PolarMode::Crop => write!(f, "crop"),
        }
    }
}

/// Output size of a polar image: one row per radius, one column per angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolarSize {
    pub radii: usize,
    pub angles: usize,
}

/// Largest radius sampled from `center` on a `rows x cols` grid.
pub fn max_radius(rows: usize, cols: usize, center: Point2<f64>, mode: PolarMode) -> f64 {
    let left = center.x;
    let right = cols as f64 - 1.0 - center.x;
    let top = center.y;
    let bottom = rows as f64 - 1.0 - center.y;
    match mode {
        PolarMode::Crop => left.min(right).min(top).min(bottom),
        PolarMode::Full => {
            let dx = left.max(right);
            let dy = top.max(bottom);
            (dx * dx + dy * dy).sqrt()
        }
    }
}

/// Resamples `image` into polar coordinates around `center` (default: the
/// geometric center). The output has the input's size and pixel type.
pub fn cartesian_to_polar(
    image: &Image,
    mode: PolarMode,
    center: Option<Point2<f64>>,
) -> Result<Image> {
    cartesian_to_polar_sized(image, mode, center, None)
}

/// Resamples `image` into polar coordinates.
///
/// Output cell `(i, j)` holds the bilinear sample at
/// `center + rho_i * (cos theta_j, sin theta_j)` with `rho_i = i * R / (radii - 1)`
/// and `theta_j = 2 * pi * j / angles`, where `R` is [`max_radius`] for `mode`.
/// Every channel of a color image uses the same sample positions.
///
/// # Errors
/// `InvalidInput` if the image is empty or smaller than 2x2, if `center` lies
/// outside the image, if `size` has a zero side, or if the crop radius is zero.
pub fn cartesian_to_polar_sized(
    image: &Image,
    mode: PolarMode,
    center: Option<Point2<f64>>,
    size: Option<PolarSize>,
) -> Result<Image> {
    image.ensure_non_empty()?;
    let (rows, cols) = image.shape();
    if rows < 2 || cols < 2 {
        return Err(GcfdError::invalid_input(format!(
            "polar resampling needs at least 2x2 pixels, got {rows}x{cols}"
        )));
    }

    let center = center.unwrap_or_else(|| image.center());
    let inside = center.x.is_finite()
        && center.y.is_finite()
        && (0.0..=(cols - 1) as f64).contains(&center.x)
        && (0.0..=(rows - 1) as f64).contains(&center.y);
    if !inside {
        return Err(GcfdError::invalid_input(format!(
            "center ({}, {}) lies outside the {rows}x{cols} image",
            center.x, center.y
        )));
    }

    let size = size.unwrap_or(PolarSize {
        radii: rows,
        angles: cols,
    });
    if size.radii == 0 || size.angles == 0 {
        return Err(GcfdError::invalid_input(format!(
            "polar size must be positive, got {}x{}",
            size.radii, size.angles
        )));
    }

    let radius = max_radius(rows, cols, center, mode);
    if radius <= 0.0 {
        return Err(GcfdError::invalid_input(format!(
            "center ({}, {}) leaves no room for a {mode} polar image",
            center.x, center.y
        )));
    }

    let radial_step = if size.radii > 1 {
        radius / (size.radii - 1) as f64
    } else {
        0.0
    };
    let angular_step = 2.0 * PI / size.angles as f64;

    // One (x, y) per output cell, shared by all channels.
    let positions: Vec<(f64, f64)> = (0..size.radii)
        .flat_map(|i| {
            let rho = i as f64 * radial_step;
            (0..size.angles).map(move |j| {
                let (sin, cos) = (j as f64 * angular_step).sin_cos();
                (center.x + rho * cos, center.y + rho * sin)
            })
        })
        .collect();

    tracing::trace!(
        rows,
        cols,
        radii = size.radii,
        angles = size.angles,
        radius,
        %mode,
        "polar resampling"
    );

    image.map_channels(|plane| {
        Array2::from_shape_fn((size.radii, size.angles), |(i, j)| {
            let (x, y) = positions[i * size.angles + j];
            sample_bilinear(&plane, x, y).unwrap_or(0.0)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine_transform::rotate_image;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_gray(rows: usize, cols: usize, seed: u64) -> Image {
        let mut rng = StdRng::seed_from_u64(seed);
        Image::Gray(Array2::from_shape_fn((rows, cols), |_| rng.random::<f64>()))
    }

    fn gray(image: Image) -> Array2<f64> {
        match image {
            Image::Gray(data) => data,
            Image::Color(_) => panic!("expected a gray image"),
        }
    }

    #[test]
    fn single_pixel_image_is_rejected() {
        let image = Image::Gray(Array2::ones((1, 1)));
        let err = cartesian_to_polar(&image, PolarMode::Crop, None).unwrap_err();
        assert!(matches!(err, GcfdError::InvalidInput(_)));
    }

    #[test]
    fn center_outside_is_rejected() {
        let image = Image::Gray(Array2::ones((8, 8)));
        for center in [Point2::new(-0.5, 3.0), Point2::new(3.0, 7.5), Point2::new(f64::NAN, 1.0)] {
            let err = cartesian_to_polar(&image, PolarMode::Full, Some(center)).unwrap_err();
            assert!(matches!(err, GcfdError::InvalidInput(_)));
        }
    }

    #[test]
    fn crop_on_the_border_has_no_radius() {
        let image = Image::Gray(Array2::ones((8, 8)));
        let err = cartesian_to_polar(&image, PolarMode::Crop, Some(Point2::new(0.0, 4.0)));
        assert!(matches!(err, Err(GcfdError::InvalidInput(_))));
        assert!(cartesian_to_polar(&image, PolarMode::Full, Some(Point2::new(0.0, 4.0))).is_ok());
    }

    #[test]
    fn radii_follow_mode() {
        let c = Point2::new(3.5, 2.0);
        assert_abs_diff_eq!(max_radius(5, 8, c, PolarMode::Crop), 2.0);
        assert_abs_diff_eq!(max_radius(5, 8, c, PolarMode::Full), (3.5f64 * 3.5 + 4.0).sqrt());
    }

    #[test]
    fn output_keeps_type_and_size() {
        let color = Image::Color(Array3::from_elem((6, 10, 3), 0.5));
        let polar = cartesian_to_polar(&color, PolarMode::Crop, None).unwrap();
        assert_eq!(polar.shape(), (6, 10));
        assert_eq!(polar.channels(), 3);

        let sized = cartesian_to_polar_sized(
            &random_gray(9, 9, 1),
            PolarMode::Full,
            None,
            Some(PolarSize { radii: 4, angles: 12 }),
        )
        .unwrap();
        assert!(matches!(sized, Image::Gray(_)));
        assert_eq!(sized.shape(), (4, 12));
    }

    #[test]
    fn first_row_samples_the_center() {
        let image = random_gray(7, 7, 2);
        let center_value = gray(image.clone())[[3, 3]];
        let polar = gray(cartesian_to_polar(&image, PolarMode::Crop, None).unwrap());
        for v in polar.row(0) {
            assert_abs_diff_eq!(*v, center_value, epsilon = 1e-12);
        }
    }

    #[test]
    fn crop_of_uniform_image_is_uniform() {
        let image = Image::Color(Array3::from_elem((12, 12, 3), 0.25));
        let polar = cartesian_to_polar(&image, PolarMode::Crop, None).unwrap();
        assert_eq!(polar.count_null_pixels(), 0);
        let Image::Color(data) = polar else { panic!("expected color") };
        for v in data.iter() {
            assert_abs_diff_eq!(*v, 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn full_mode_zeroes_outside_samples() {
        let image = Image::Gray(Array2::ones((12, 12)));
        let polar = cartesian_to_polar(&image, PolarMode::Full, None).unwrap();
        let data = gray(polar.clone());
        assert!(polar.count_null_pixels() > 0);
        assert_abs_diff_eq!(data[[0, 0]], 1.0, epsilon = 1e-12);
        // The last radius reaches the corners only along the diagonals.
        assert_eq!(data[[11, 0]], 0.0);
    }

    #[test]
    fn quarter_turn_becomes_cyclic_angle_shift() {
        let image = random_gray(9, 9, 3);
        let rotated = rotate_image(&image, 90.0).unwrap();
        let size = Some(PolarSize { radii: 5, angles: 8 });
        let a = gray(cartesian_to_polar_sized(&image, PolarMode::Crop, None, size).unwrap());
        let b = gray(cartesian_to_polar_sized(&rotated, PolarMode::Crop, None, size).unwrap());
        for i in 0..5 {
            for j in 0..8 {
                assert_abs_diff_eq!(b[[i, j]], a[[i, (j + 6) % 8]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("Full".parse::<PolarMode>().unwrap(), PolarMode::Full);
        assert_eq!(" crop ".parse::<PolarMode>().unwrap(), PolarMode::Crop);
        assert!("polar".parse::<PolarMode>().is_err());
        assert_eq!(PolarMode::Full.to_string(), "full");
    }
}
