use nalgebra::Point2;
use ndarray::{s, stack, Array2, Array3, ArrayView2, Axis, Zip};

use crate::error::{GcfdError, Result};

/// Samples this far outside the pixel grid still count as inside, so that
/// rotations and polar rays landing exactly on a border survive rounding.
const EDGE_TOLERANCE: f64 = 1e-9;

/// ITU-R BT.601 luma weights for R, G and B.
const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// A grid of floating-point samples, either one value per cell or one color
/// vector per cell.
///
/// Grids are row-major: `Gray` has shape `(rows, cols)` and `Color` has shape
/// `(rows, cols, channels)`. Every operation in this crate borrows an image
/// and returns a new one.
#[derive(Debug, Clone, PartialEq)]
pub enum Image {
    Gray(Array2<f64>),
    Color(Array3<f64>),
}

impl Image {
    /// Builds a color image from interleaved 8-bit RGBA data, 4 bytes per
    /// pixel. Alpha is dropped and samples are scaled to `[0, 1]`.
    ///
    /// # Errors
    /// `InvalidInput` if the buffer length does not match `width * height * 4`
    /// or if either dimension is zero.
    pub fn from_rgba8(width: usize, height: usize, img_data: &[u8]) -> Result<Image> {
        if width == 0 || height == 0 {
            return Err(GcfdError::invalid_input("image has a zero dimension"));
        }
        if img_data.len() != width * height * 4 {
            return Err(GcfdError::invalid_input(format!(
                "expected {} RGBA bytes for a {}x{} image, got {}",
                width * height * 4,
                width,
                height,
                img_data.len()
            )));
        }
        let data = Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
            img_data[(y * width + x) * 4 + c] as f64 / 255.0
        });
        Ok(Image::Color(data))
    }

    pub fn rows(&self) -> usize {
        match self {
            Image::Gray(data) => data.nrows(),
            Image::Color(data) => data.dim().0,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Image::Gray(data) => data.ncols(),
            Image::Color(data) => data.dim().1,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Image::Gray(_) => 1,
            Image::Color(data) => data.dim().2,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0 || self.cols() == 0 || self.channels() == 0
    }

    /// Geometric center of the pixel grid, `x` along columns and `y` along rows.
    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (self.cols() as f64 - 1.0) / 2.0,
            (self.rows() as f64 - 1.0) / 2.0,
        )
    }

    /// Returns the first three channels at pixel `(x, y)`, or `None` when out
    /// of bounds. Gray pixels are replicated into all three slots.
    pub fn get_rgb(&self, x: usize, y: usize) -> Option<[f64; 3]> {
        if x >= self.cols() || y >= self.rows() {
            return None;
        }
        match self {
            Image::Gray(data) => {
                let v = data[[y, x]];
                Some([v, v, v])
            }
            Image::Color(data) if data.dim().2 >= 3 => {
                Some([data[[y, x, 0]], data[[y, x, 1]], data[[y, x, 2]]])
            }
            Image::Color(_) => None,
        }
    }

    /// Converts to a single channel. Three-channel images use BT.601 luma,
    /// single-channel color grids are unwrapped, gray images are copied.
    pub fn to_gray(&self) -> Result<Array2<f64>> {
        match self {
            Image::Gray(data) => Ok(data.clone()),
            Image::Color(data) => match data.dim().2 {
                1 => Ok(data.index_axis(Axis(2), 0).to_owned()),
                3 => Ok(data.map_axis(Axis(2), |px| {
                    px.iter().zip(LUMA_WEIGHTS).map(|(v, w)| v * w).sum::<f64>()
                })),
                n => Err(GcfdError::invalid_input(format!(
                    "cannot convert a {n}-channel image to gray"
                ))),
            },
        }
    }

    /// Euclidean norm of each pixel across its channels.
    pub fn pixel_norms(&self) -> Array2<f64> {
        match self {
            Image::Gray(data) => data.mapv(f64::abs),
            Image::Color(data) => data.map_axis(Axis(2), |px| px.dot(&px).sqrt()),
        }
    }

    /// Number of pixels whose channels are all exactly zero.
    pub fn count_null_pixels(&self) -> usize {
        match self {
            Image::Gray(data) => data.iter().filter(|v| **v == 0.0).count(),
            Image::Color(data) => data
                .lanes(Axis(2))
                .into_iter()
                .filter(|px| px.iter().all(|v| *v == 0.0))
                .count(),
        }
    }

    /// Swaps the first and third channels in place (BGR <-> RGB).
    /// Gray images are left untouched.
    pub fn reorder_color_channels(&mut self) {
        if let Image::Color(data) = self {
            if data.dim().2 >= 3 {
                let (mut first, mut third) =
                    data.multi_slice_mut((s![.., .., 0], s![.., .., 2]));
                Zip::from(&mut first)
                    .and(&mut third)
                    .for_each(|a, b| std::mem::swap(a, b));
            }
        }
    }

    pub(crate) fn ensure_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(GcfdError::invalid_input(format!(
                "empty image ({}x{}, {} channels)",
                self.rows(),
                self.cols(),
                self.channels()
            )));
        }
        Ok(())
    }

    /// Applies the same single-channel operation to every channel and keeps
    /// the pixel type: gray stays gray, color is restacked in channel order.
    pub(crate) fn map_channels<F>(&self, mut op: F) -> Result<Image>
    where
        F: FnMut(ArrayView2<f64>) -> Array2<f64>,
    {
        match self {
            Image::Gray(data) => Ok(Image::Gray(op(data.view()))),
            Image::Color(data) => {
                let planes: Vec<Array2<f64>> = data
                    .axis_iter(Axis(2))
                    .map(|plane| op(plane))
                    .collect();
                let views: Vec<ArrayView2<f64>> = planes.iter().map(|p| p.view()).collect();
                let stacked = stack(Axis(2), &views)
                    .map_err(|err| GcfdError::invalid_input(err.to_string()))?;
                Ok(Image::Color(stacked))
            }
        }
    }
}

/// Bilinear sample of a single-channel grid at `(x, y)` = (column, row).
///
/// Returns `None` when the point lies outside `[0, cols-1] x [0, rows-1]`.
pub fn sample_bilinear(grid: &ArrayView2<f64>, x: f64, y: f64) -> Option<f64> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let max_x = (cols - 1) as f64;
    let max_y = (rows - 1) as f64;
    if x < -EDGE_TOLERANCE
        || y < -EDGE_TOLERANCE
        || x > max_x + EDGE_TOLERANCE
        || y > max_y + EDGE_TOLERANCE
    {
        return None;
    }

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(cols - 1);
    let y1 = (y0 + 1).min(rows - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let top = grid[[y0, x0]] * (1.0 - fx) + grid[[y0, x1]] * fx;
    let bottom = grid[[y1, x0]] * (1.0 - fx) + grid[[y1, x1]] * fx;
    Some(top * (1.0 - fy) + bottom * fy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn sample_color() -> Image {
        Image::Color(Array3::from_shape_fn((2, 3, 3), |(y, x, c)| {
            (y * 100 + x * 10 + c) as f64
        }))
    }

    #[test]
    fn from_rgba8_drops_alpha_and_scales() {
        let data = [255u8, 0, 51, 7, 0, 255, 0, 9];
        let image = Image::from_rgba8(2, 1, &data).unwrap();
        assert_eq!(image.shape(), (1, 2));
        assert_eq!(image.channels(), 3);
        assert_eq!(image.get_rgb(0, 0), Some([1.0, 0.0, 0.2]));
        assert_eq!(image.get_rgb(1, 0), Some([0.0, 1.0, 0.0]));
    }

    #[test]
    fn from_rgba8_rejects_short_buffer() {
        let err = Image::from_rgba8(2, 2, &[0u8; 12]).unwrap_err();
        assert!(matches!(err, GcfdError::InvalidInput(_)));
    }

    #[test]
    fn center_is_geometric() {
        let image = Image::Gray(Array2::zeros((5, 8)));
        let c = image.center();
        assert_eq!((c.x, c.y), (3.5, 2.0));
    }

    #[test]
    fn get_rgb_out_of_bounds_is_none() {
        let image = sample_color();
        assert_eq!(image.get_rgb(3, 0), None);
        assert_eq!(image.get_rgb(2, 1), Some([120.0, 121.0, 122.0]));
    }

    #[test]
    fn to_gray_uses_luma_weights() {
        let image = Image::Color(Array3::from_shape_fn((1, 1, 3), |(_, _, c)| {
            [1.0, 2.0, 3.0][c]
        }));
        let gray = image.to_gray().unwrap();
        assert_abs_diff_eq!(gray[[0, 0]], 0.299 + 2.0 * 0.587 + 3.0 * 0.114, epsilon = 1e-12);
    }

    #[test]
    fn to_gray_rejects_two_channels() {
        let image = Image::Color(Array3::zeros((2, 2, 2)));
        assert!(image.to_gray().is_err());
    }

    #[test]
    fn reorder_swaps_red_and_blue() {
        let mut image = sample_color();
        image.reorder_color_channels();
        assert_eq!(image.get_rgb(1, 1), Some([112.0, 111.0, 110.0]));
        image.reorder_color_channels();
        assert_eq!(image, sample_color());
    }

    #[test]
    fn null_pixels_and_norms() {
        let mut data = Array3::zeros((2, 2, 3));
        data[[0, 0, 0]] = 3.0;
        data[[0, 0, 1]] = 4.0;
        data[[1, 1, 2]] = -2.0;
        let image = Image::Color(data);
        assert_eq!(image.count_null_pixels(), 2);
        let norms = image.pixel_norms();
        assert_abs_diff_eq!(norms[[0, 0]], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(norms[[1, 1]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn bilinear_interpolates_and_rejects_outside() {
        let grid = array![[0.0, 1.0], [2.0, 3.0]];
        let view = grid.view();
        assert_abs_diff_eq!(sample_bilinear(&view, 0.5, 0.5).unwrap(), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(sample_bilinear(&view, 1.0, 0.0).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(sample_bilinear(&view, 1.5, 0.0), None);
        assert_eq!(sample_bilinear(&view, 0.0, -0.1), None);
    }

    #[test]
    fn map_channels_keeps_pixel_type() {
        let color = sample_color();
        let doubled = color.map_channels(|plane| plane.mapv(|v| v * 2.0)).unwrap();
        assert_eq!(doubled.channels(), 3);
        assert_eq!(doubled.get_rgb(1, 0), Some([20.0, 22.0, 24.0]));

        let gray = Image::Gray(Array2::ones((2, 2)));
        let mapped = gray.map_channels(|plane| plane.to_owned()).unwrap();
        assert!(matches!(mapped, Image::Gray(_)));
    }
}
