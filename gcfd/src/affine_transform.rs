use nalgebra::{Matrix2, Point2};
use ndarray::Array2;

use crate::error::{GcfdError, Result};
use crate::image::{sample_bilinear, Image};

/// 2D affine map in pixel coordinates: a point is moved relative to
/// (`origin_x`, `origin_y`), multiplied by the matrix
/// `[[a11, a12], [a21, a22]]`, then placed relative to
/// (`translate_x`, `translate_y`):
///
/// ```text
///   X = a11 * (x - origin_x) + a12 * (y - origin_y) + translate_x
///   Y = a21 * (x - origin_x) + a22 * (y - origin_y) + translate_y
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AffineTransform {
    /// Column coordinate of the point the matrix turns about, in the input.
    pub origin_x: f64,
    /// Row coordinate of the point the matrix turns about, in the input.
    pub origin_y: f64,
    /// Column coordinate where `origin` lands in the output.
    pub translate_x: f64,
    /// Row coordinate where `origin` lands in the output.
    pub translate_y: f64,
    /// Weight of the input x offset in the output x.
    pub a11: f64,
    /// Weight of the input y offset in the output x.
    pub a12: f64,
    /// Weight of the input x offset in the output y.
    pub a21: f64,
    /// Weight of the input y offset in the output y.
    pub a22: f64,
}

impl AffineTransform {
    /// Rotation by `angle_degrees` about `center`. Positive angles turn the
    /// `+x` axis toward the `+y` axis, the same orientation used for polar
    /// angles.
    ///
    /// # Examples
    /// ```
    /// # use gcfd::affine_transform::AffineTransform;
    /// # use nalgebra::Point2;
    /// let t = AffineTransform::rotation_about(Point2::new(1.0, 1.0), 90.0);
    /// let (x, y) = t.transform(2.0, 1.0);
    /// assert!((x - 1.0).abs() < 1e-12 && (y - 2.0).abs() < 1e-12);
    /// ```
    pub fn rotation_about(center: Point2<f64>, angle_degrees: f64) -> AffineTransform {
        let (sin, cos) = angle_degrees.to_radians().sin_cos();
        AffineTransform {
            origin_x: center.x,
            origin_y: center.y,
            translate_x: center.x,
            translate_y: center.y,
            a11: cos,
            a12: -sin,
            a21: sin,
            a22: cos,
        }
    }

    pub fn determinant(&self) -> f64 {
        self.a11 * self.a22 - self.a12 * self.a21
    }

    /// Maps `(x, y)` to `(X, Y)`.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let tx = self.a11 * dx + self.a12 * dy + self.translate_x;
        let ty = self.a21 * dx + self.a22 * dy + self.translate_y;
        (tx, ty)
    }

    /// The transform mapping every output of `self` back to its input, or
    /// `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<AffineTransform> {
        let inv = Matrix2::new(self.a11, self.a12, self.a21, self.a22).try_inverse()?;
        Some(AffineTransform {
            origin_x: self.translate_x,
            origin_y: self.translate_y,
            translate_x: self.origin_x,
            translate_y: self.origin_y,
            a11: inv[(0, 0)],
            a12: inv[(0, 1)],
            a21: inv[(1, 0)],
            a22: inv[(1, 1)],
        })
    }
}

/// Rotates a gray or color image by `angle_degrees` about its geometric
/// center. The output keeps the input size; pixels whose source falls outside
/// the image are zero.
pub fn rotate_image(image: &Image, angle_degrees: f64) -> Result<Image> {
    image.ensure_non_empty()?;
    if !angle_degrees.is_finite() {
        return Err(GcfdError::invalid_input("rotation angle must be finite"));
    }

    let forward = AffineTransform::rotation_about(image.center(), angle_degrees);
    let backward = forward
        .inverse()
        .ok_or_else(|| GcfdError::numeric_degeneracy("rotation matrix is singular"))?;

    image.map_channels(|plane| {
        Array2::from_shape_fn(plane.dim(), |(y, x)| {
            let (sx, sy) = backward.transform(x as f64, y as f64);
            sample_bilinear(&plane, sx, sy).unwrap_or(0.0)
        })
    })
}
