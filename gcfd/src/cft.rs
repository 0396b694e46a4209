//! Color Clifford Fourier transform.
//!
//! A color pixel `f` is a vector of the 4D algebra spanned by `e1, e2, e3`
//! (the color channels) and an extra direction `e4`. A reference color `v`
//! defines the bivector `B = v ∧ e4`. The part of `f` lying in the plane of
//! `B` is carried by the scalar field `f · v`; the rest of `f` lies in the
//! color plane orthogonal to `v` and is carried by a complex field whose two
//! coordinates are taken on an orthonormal basis `(a, b)` of that plane.
//! Both fields go through the ordinary 2D transform and the two spectra are
//! reassembled as one 4D vector per frequency:
//!
//! ```text
//! F = Re P · v̂ + Im P · e4 + Re O · a + Im O · b
//! ```
//!
//! `{v̂, e4, a, b}` is orthonormal, so `|F|² = |P|² + |O|²`.
//!
//! `(a, b)` depends only on the line through `v`, never on its sign, so
//! replacing `v` with `-v` negates `P`, leaves `O` untouched and keeps `|F|`.
//! Rotating every color about `v` multiplies `O` by a unit phase and keeps
//! `|F|` as well.

use std::ops::Neg;

use nalgebra::{Vector3, Vector4};
use ndarray::{Array2, Array3, Axis, Zip};
use num_complex::Complex64;

use crate::error::{GcfdError, Result};
use crate::image::Image;
use crate::spectral::{self, ComplexGrid};

/// Norms below this make the decomposition numerically meaningless.
pub const MIN_REFERENCE_NORM: f64 = 1e-12;

/// Reference color direction. Not normalised: its length scales both parts
/// of the decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorVector(Vector3<f64>);

impl ColorVector {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        ColorVector(Vector3::new(r, g, b))
    }

    /// # Errors
    /// `InvalidInput` unless `values` has exactly 3 components.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [r, g, b] => Ok(ColorVector::new(*r, *g, *b)),
            _ => Err(GcfdError::invalid_input(format!(
                "a color vector has 3 components, got {}",
                values.len()
            ))),
        }
    }

    pub fn as_vector(&self) -> &Vector3<f64> {
        &self.0
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.0.x, self.0.y, self.0.z]
    }

    pub fn norm(&self) -> f64 {
        self.0.norm()
    }
}

/// The unit gray axis `(1, 1, 1) / sqrt(3)`.
impl Default for ColorVector {
    fn default() -> Self {
        let c = 1.0 / 3f64.sqrt();
        ColorVector::new(c, c, c)
    }
}

impl From<[f64; 3]> for ColorVector {
    fn from(values: [f64; 3]) -> Self {
        ColorVector::new(values[0], values[1], values[2])
    }
}

impl Neg for ColorVector {
    type Output = ColorVector;

    fn neg(self) -> ColorVector {
        ColorVector(-self.0)
    }
}

/// Orthonormal frame attached to `B = v ∧ e4`: the unit color direction and
/// a basis of the color plane orthogonal to it.
#[derive(Debug, Clone, Copy)]
struct BivectorFrame {
    v: Vector3<f64>,
    norm: f64,
    unit: Vector3<f64>,
    a: Vector3<f64>,
    b: Vector3<f64>,
}

impl BivectorFrame {
    fn new(reference: &ColorVector) -> Result<BivectorFrame> {
        let v = *reference.as_vector();
        if v.iter().any(|c| !c.is_finite()) {
            return Err(GcfdError::invalid_input("reference color vector must be finite"));
        }
        if v.iter().all(|c| *c == 0.0) {
            return Err(GcfdError::invalid_input(
                "zero reference color vector: the bivector v ∧ e4 vanishes",
            ));
        }
        let norm = v.norm();
        if norm < MIN_REFERENCE_NORM {
            return Err(GcfdError::numeric_degeneracy(format!(
                "reference color vector norm {norm:e} is too small"
            )));
        }

        // Same line, same sign for v and -v.
        let sign = if v[v.iamax()] < 0.0 { -1.0 } else { 1.0 };
        let canonical = v * (sign / norm);
        let helper = Vector3::ith(canonical.iamin(), 1.0);
        let a = canonical.cross(&helper).normalize();
        let b = canonical.cross(&a);

        Ok(BivectorFrame {
            v,
            norm,
            unit: v / norm,
            a,
            b,
        })
    }

    fn parallel_axis(&self) -> Vector4<f64> {
        Vector4::new(self.unit.x, self.unit.y, self.unit.z, 0.0)
    }

    fn orthogonal_axes(&self) -> (Vector4<f64>, Vector4<f64>) {
        (
            Vector4::new(self.a.x, self.a.y, self.a.z, 0.0),
            Vector4::new(self.b.x, self.b.y, self.b.z, 0.0),
        )
    }
}

/// Parallel and orthogonal fields of a color image relative to `v ∧ e4`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// `f · v` at every pixel.
    pub parallel: Array2<f64>,
    /// `|v| ((f · a) + i (f · b))` at every pixel.
    pub orthogonal: ComplexGrid,
}

/// Spectra of both parts plus their recombination.
#[derive(Debug, Clone, PartialEq)]
pub struct CftResult {
    pub parallel_part: ComplexGrid,
    pub orthogonal_part: ComplexGrid,
    /// One 4D vector per frequency, in the `(e1, e2, e3, e4)` basis.
    pub reconstructed: Array2<Vector4<f64>>,
}

impl CftResult {
    pub fn shape(&self) -> (usize, usize) {
        self.reconstructed.dim()
    }

    /// Elementwise norm of the reconstructed spectrum.
    pub fn magnitude(&self) -> Array2<f64> {
        self.reconstructed.mapv(|f| f.norm())
    }

    pub fn parallel_magnitude(&self) -> Array2<f64> {
        spectral::magnitude(&self.parallel_part)
    }

    pub fn orthogonal_magnitude(&self) -> Array2<f64> {
        spectral::magnitude(&self.orthogonal_part)
    }
}

/// `f · v` at every pixel of a 3-channel image.
pub fn project_on_vector(image: &Image, v: &ColorVector) -> Result<Array2<f64>> {
    Ok(project(color_data(image)?, v.as_vector()))
}

fn project(data: &Array3<f64>, v: &Vector3<f64>) -> Array2<f64> {
    data.map_axis(Axis(2), |px| px[0] * v.x + px[1] * v.y + px[2] * v.z)
}

/// Splits a 3-channel image into its parallel and orthogonal fields.
///
/// # Errors
/// `InvalidInput` for anything but a non-empty 3-channel image or for a zero
/// `v`; `NumericDegeneracy` when `|v|` is below [`MIN_REFERENCE_NORM`].
pub fn decompose(image: &Image, v: &ColorVector) -> Result<Decomposition> {
    let frame = BivectorFrame::new(v)?;
    decompose_in(image, &frame)
}

fn decompose_in(image: &Image, frame: &BivectorFrame) -> Result<Decomposition> {
    let data = color_data(image)?;

    let parallel = project(data, &frame.v);
    // a and b are orthogonal to v, so only the orthogonal remainder of f
    // contributes to these dot products.
    let orthogonal = data.map_axis(Axis(2), |px| {
        let f = Vector3::new(px[0], px[1], px[2]);
        Complex64::new(f.dot(&frame.a), f.dot(&frame.b)) * frame.norm
    });

    Ok(Decomposition {
        parallel,
        orthogonal,
    })
}

/// Color Clifford Fourier transform of a 3-channel image.
pub fn transform(image: &Image, v: &ColorVector) -> Result<CftResult> {
    let frame = BivectorFrame::new(v)?;
    let Decomposition {
        parallel,
        orthogonal,
    } = decompose_in(image, &frame)?;

    let parallel_part = spectral::forward(parallel.view())?;
    let orthogonal_part = spectral::forward_complex(orthogonal.view())?;
    let reconstructed = recombine(&parallel_part, &orthogonal_part, &frame)?;

    tracing::trace!(
        rows = parallel_part.nrows(),
        cols = parallel_part.ncols(),
        "clifford fourier transform"
    );

    Ok(CftResult {
        parallel_part,
        orthogonal_part,
        reconstructed,
    })
}

/// Inverse of [`transform`] for the same `v`: returns the color image.
pub fn invert(result: &CftResult, v: &ColorVector) -> Result<Image> {
    let frame = BivectorFrame::new(v)?;
    if result.parallel_part.dim() != result.orthogonal_part.dim() {
        return Err(GcfdError::dimension_mismatch(
            result.parallel_part.dim(),
            result.orthogonal_part.dim(),
        ));
    }

    let parallel = spectral::inverse(result.parallel_part.view())?;
    let orthogonal = spectral::inverse(result.orthogonal_part.view())?;
    let (rows, cols) = parallel.dim();
    let norm_sq = frame.norm * frame.norm;

    let mut data = Array3::zeros((rows, cols, 3));
    Zip::from(data.lanes_mut(Axis(2)))
        .and(&parallel)
        .and(&orthogonal)
        .for_each(|mut px, p, o| {
            let f = frame.v * (p.re / norm_sq)
                + frame.a * (o.re / frame.norm)
                + frame.b * (o.im / frame.norm);
            px[0] = f.x;
            px[1] = f.y;
            px[2] = f.z;
        });

    Ok(Image::Color(data))
}

fn recombine(
    parallel_part: &ComplexGrid,
    orthogonal_part: &ComplexGrid,
    frame: &BivectorFrame,
) -> Result<Array2<Vector4<f64>>> {
    if parallel_part.dim() != orthogonal_part.dim() {
        return Err(GcfdError::dimension_mismatch(
            parallel_part.dim(),
            orthogonal_part.dim(),
        ));
    }
    let axis = frame.parallel_axis();
    let (a, b) = frame.orthogonal_axes();
    let e4 = Vector4::w();

    let mut out = Array2::from_elem(parallel_part.dim(), Vector4::zeros());
    Zip::from(&mut out)
        .and(parallel_part)
        .and(orthogonal_part)
        .for_each(|f, p, o| {
            *f = axis * p.re + e4 * p.im + a * o.re + b * o.im;
        });
    Ok(out)
}

fn color_data(image: &Image) -> Result<&Array3<f64>> {
    image.ensure_non_empty()?;
    match image {
        Image::Color(data) if data.dim().2 == 3 => Ok(data),
        other => Err(GcfdError::invalid_input(format!(
            "the color transform needs 3 channels, got {}",
            other.channels()
        ))),
    }
}
