//! Two-dimensional discrete Fourier transform of single-channel grids.
//!
//! The forward transform is unnormalised and the inverse divides by
//! `rows * cols`, so `inverse(forward(x)) == x` up to rounding. Spectra come
//! out with the zero frequency at index `(0, 0)`; [`shift`] moves it to
//! `(rows / 2, cols / 2)` and [`crop_spectrum`] makes both sides even first so
//! that the shifted spectrum is symmetric about that center.

use ndarray::{s, Array2, ArrayView2};
use num_complex::Complex64;
use rustfft::{FftDirection, FftPlanner};

use crate::error::{GcfdError, Result};
use crate::image::Image;

/// Complex spectrum (or complex field) with the shape of the grid it came from.
pub type ComplexGrid = Array2<Complex64>;

/// Forward transform of a real grid.
pub fn forward(grid: ArrayView2<f64>) -> Result<ComplexGrid> {
    ensure_non_empty(grid.dim())?;
    Ok(transform_2d(grid.mapv(|v| Complex64::new(v, 0.0)), FftDirection::Forward))
}

/// Forward transform of a complex grid.
pub fn forward_complex(grid: ArrayView2<Complex64>) -> Result<ComplexGrid> {
    ensure_non_empty(grid.dim())?;
    Ok(transform_2d(grid.to_owned(), FftDirection::Forward))
}

/// Forward transform of a single-channel image. Color images with more than
/// one channel are rejected.
pub fn forward_image(image: &Image) -> Result<ComplexGrid> {
    match image {
        Image::Gray(data) => forward(data.view()),
        Image::Color(data) if data.dim().2 == 1 => {
            forward(data.index_axis(ndarray::Axis(2), 0))
        }
        Image::Color(data) => Err(GcfdError::invalid_input(format!(
            "the 2D transform takes one channel, got {}",
            data.dim().2
        ))),
    }
}

/// Inverse transform, normalised by `1 / (rows * cols)`.
pub fn inverse(grid: ArrayView2<Complex64>) -> Result<ComplexGrid> {
    ensure_non_empty(grid.dim())?;
    let (rows, cols) = grid.dim();
    let scale = 1.0 / (rows * cols) as f64;
    let mut out = transform_2d(grid.to_owned(), FftDirection::Inverse);
    out.mapv_inplace(|v| v * scale);
    Ok(out)
}

/// Swaps quadrants so that index `(0, 0)` moves to `(rows / 2, cols / 2)`.
pub fn shift<T: Clone>(grid: &mut Array2<T>) {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return;
    }
    let (half_rows, half_cols) = (rows / 2, cols / 2);
    let source = grid.clone();
    for ((r, c), value) in grid.indexed_iter_mut() {
        let src_r = (r + rows - half_rows) % rows;
        let src_c = (c + cols - half_cols) % cols;
        *value = source[[src_r, src_c]].clone();
    }
}

/// Drops the last row and/or column when that dimension is odd.
///
/// Must run before [`shift`] whenever a side is odd; otherwise the shifted
/// zero frequency is not at the center of a symmetric grid.
pub fn crop_spectrum<T: Clone>(grid: &mut Array2<T>) {
    let (rows, cols) = grid.dim();
    let (even_rows, even_cols) = (rows & !1, cols & !1);
    if (even_rows, even_cols) != (rows, cols) {
        *grid = grid.slice(s![..even_rows, ..even_cols]).to_owned();
    }
}

/// Elementwise complex modulus.
pub fn magnitude(grid: &ComplexGrid) -> Array2<f64> {
    grid.mapv(|v| v.norm())
}

/// Forward transform, crop to even size, shift, modulus: the centered
/// magnitude spectrum the ring integrator consumes.
pub fn centered_magnitude(grid: ArrayView2<f64>) -> Result<Array2<f64>> {
    let mut spectrum = forward(grid)?;
    crop_spectrum(&mut spectrum);
    shift(&mut spectrum);
    Ok(magnitude(&spectrum))
}

fn ensure_non_empty((rows, cols): (usize, usize)) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(GcfdError::invalid_input(format!(
            "cannot transform an empty {rows}x{cols} grid"
        )));
    }
    Ok(())
}

/// Separable 2D transform: every row, then every column.
fn transform_2d(mut data: ComplexGrid, direction: FftDirection) -> ComplexGrid {
    let (rows, cols) = data.dim();
    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft(cols, direction);
    let col_fft = planner.plan_fft(rows, direction);

    let mut buffer: Vec<Complex64> = Vec::with_capacity(rows.max(cols));

    for mut row in data.rows_mut() {
        buffer.clear();
        buffer.extend(row.iter().copied());
        row_fft.process(&mut buffer);
        for (dst, src) in row.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }

    for mut col in data.columns_mut() {
        buffer.clear();
        buffer.extend(col.iter().copied());
        col_fft.process(&mut buffer);
        for (dst, src) in col.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn random_grid(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.random_range(-1.0..1.0))
    }

    /// Direct O(n^2) evaluation of the same transform.
    fn naive_dft(grid: &Array2<f64>) -> ComplexGrid {
        let (rows, cols) = grid.dim();
        Array2::from_shape_fn((rows, cols), |(u, v)| {
            let mut acc = Complex64::new(0.0, 0.0);
            for ((r, c), x) in grid.indexed_iter() {
                let phase = -2.0 * PI
                    * ((u * r) as f64 / rows as f64 + (v * c) as f64 / cols as f64);
                acc += Complex64::from_polar(*x, phase);
            }
            acc
        })
    }

    #[test]
    fn round_trip_recovers_input() {
        for (rows, cols) in [(8, 8), (5, 7), (1, 9), (12, 3)] {
            let grid = random_grid(rows, cols, (rows * 31 + cols) as u64);
            let spectrum = forward(grid.view()).unwrap();
            let back = inverse(spectrum.view()).unwrap();
            for (orig, rec) in grid.iter().zip(back.iter()) {
                assert_abs_diff_eq!(rec.re, *orig, epsilon = 1e-9);
                assert_abs_diff_eq!(rec.im, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn matches_direct_transform() {
        let grid = random_grid(3, 4, 11);
        let fast = forward(grid.view()).unwrap();
        let slow = naive_dft(&grid);
        for (a, b) in fast.iter().zip(slow.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-9);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-9);
        }
    }

    #[test]
    fn constant_grid_has_only_dc() {
        let grid = Array2::from_elem((4, 6), 2.5);
        let spectrum = forward(grid.view()).unwrap();
        assert_abs_diff_eq!(spectrum[[0, 0]].re, 2.5 * 24.0, epsilon = 1e-9);
        for ((r, c), v) in spectrum.indexed_iter() {
            if (r, c) != (0, 0) {
                assert_abs_diff_eq!(v.norm(), 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn complex_forward_matches_real_forward() {
        let grid = random_grid(4, 5, 3);
        let as_complex = grid.mapv(|v| Complex64::new(v, 0.0));
        let a = forward(grid.view()).unwrap();
        let b = forward_complex(as_complex.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shift_moves_origin_to_center() {
        let mut grid = Array2::from_shape_fn((4, 6), |(r, c)| r * 10 + c);
        shift(&mut grid);
        assert_eq!(grid[[2, 3]], 0);
        assert_eq!(grid[[0, 0]], 23);
        shift(&mut grid);
        assert_eq!(grid, Array2::from_shape_fn((4, 6), |(r, c)| r * 10 + c));

        let mut odd = array![[0, 1, 2], [3, 4, 5], [6, 7, 8]];
        shift(&mut odd);
        assert_eq!(odd[[1, 1]], 0);
    }

    #[test]
    fn crop_makes_sides_even() {
        let mut grid = Array2::from_shape_fn((5, 7), |(r, c)| r * 10 + c);
        crop_spectrum(&mut grid);
        assert_eq!(grid.dim(), (4, 6));
        assert_eq!(grid[[3, 5]], 35);

        let mut even = Array2::<u8>::zeros((4, 4));
        crop_spectrum(&mut even);
        assert_eq!(even.dim(), (4, 4));
    }

    #[test]
    fn centered_magnitude_puts_dc_in_the_middle() {
        let grid = Array2::from_elem((7, 5), 1.0);
        let mag = centered_magnitude(grid.view()).unwrap();
        assert_eq!(mag.dim(), (6, 4));
        assert_abs_diff_eq!(mag[[3, 2]], 35.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mag.sum(), 35.0, epsilon = 1e-9);
    }

    #[test]
    fn magnitude_is_modulus() {
        let grid = array![[Complex64::new(3.0, 4.0), Complex64::new(0.0, -2.0)]];
        assert_eq!(magnitude(&grid), array![[5.0, 2.0]]);
    }

    #[test]
    fn rejects_empty_and_multichannel_input() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(matches!(forward(empty.view()), Err(GcfdError::InvalidInput(_))));

        let color = Image::Color(Array3::zeros((4, 4, 3)));
        assert!(matches!(forward_image(&color), Err(GcfdError::InvalidInput(_))));

        let gray = Image::Gray(Array2::ones((2, 2)));
        assert!(forward_image(&gray).is_ok());
    }
}
