use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::cft::{self, ColorVector};
use crate::config::{ConfigError, DescriptorConfig};
use crate::discrete_circles::{RingMaskCache, RingMaskSet};
use crate::error::{GcfdError, Result};
use crate::image::Image;
use crate::polar::cartesian_to_polar_sized;
use crate::spectral;

/// The three descriptor pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    /// Gray-level Fourier descriptor.
    #[default]
    Gfd1,
    /// Clifford descriptor over the combined transform magnitude.
    Gcfd1,
    /// Clifford descriptor over the parallel and orthogonal magnitudes, one
    /// after the other.
    Gcfd3,
}

impl DescriptorKind {
    /// Number of integrated magnitudes per descriptor.
    pub fn components(self) -> usize {
        match self {
            DescriptorKind::Gfd1 | DescriptorKind::Gcfd1 => 1,
            DescriptorKind::Gcfd3 => 2,
        }
    }

    pub fn uses_color(self) -> bool {
        !matches!(self, DescriptorKind::Gfd1)
    }

    /// Descriptor length for outermost ring `max_r`; independent of the
    /// image. `None` when the length does not fit in `usize`.
    pub fn descriptor_len(self, max_r: usize) -> Option<usize> {
        max_r.checked_add(1)?.checked_mul(self.components())
    }
}

impl FromStr for DescriptorKind {
    type Err = GcfdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gfd1" => Ok(DescriptorKind::Gfd1),
            "gcfd1" => Ok(DescriptorKind::Gcfd1),
            "gcfd3" => Ok(DescriptorKind::Gcfd3),
            other => Err(GcfdError::invalid_input(format!(
                "unknown descriptor '{other}', expected gfd1, gcfd1 or gcfd3"
            ))),
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorKind::Gfd1 => "gfd1",
            DescriptorKind::Gcfd1 => "gcfd1",
            DescriptorKind::Gcfd3 => "gcfd3",
        };
        f.write_str(name)
    }
}

/// Rotation-invariant summary of one image: ring integrals of its centered
/// magnitude spectra, innermost ring first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptorVector {
    kind: DescriptorKind,
    values: Vec<f64>,
}

impl DescriptorVector {
    pub fn new(kind: DescriptorKind, values: Vec<f64>) -> Self {
        DescriptorVector { kind, values }
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance between two descriptors of the same length.
    pub fn distance(&self, other: &DescriptorVector) -> Result<f64> {
        if self.len() != other.len() {
            return Err(GcfdError::dimension_mismatch(
                (1, self.len()),
                (1, other.len()),
            ));
        }
        Ok(self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt())
    }
}

/// Gray-level descriptor with default settings.
///
/// `masks`, when given, must match the centered spectrum shape; otherwise
/// rings up to half the spectrum height are built.
pub fn gfd1(image: &Image, masks: Option<&RingMaskSet>) -> Result<DescriptorVector> {
    let config = DescriptorConfig {
        kind: DescriptorKind::Gfd1,
        ..DescriptorConfig::default()
    };
    compute_with_config(image, &config, masks)
}

/// Clifford descriptor of the combined magnitude relative to `color`.
pub fn gcfd1(
    image: &Image,
    color: &ColorVector,
    masks: Option<&RingMaskSet>,
) -> Result<DescriptorVector> {
    let config = DescriptorConfig {
        kind: DescriptorKind::Gcfd1,
        color: color.to_array(),
        ..DescriptorConfig::default()
    };
    compute_with_config(image, &config, masks)
}

/// Clifford descriptor of the parallel then the orthogonal magnitude; twice
/// as long as [`gcfd1`] for the same rings.
pub fn gcfd3(
    image: &Image,
    color: &ColorVector,
    masks: Option<&RingMaskSet>,
) -> Result<DescriptorVector> {
    let config = DescriptorConfig {
        kind: DescriptorKind::Gcfd3,
        color: color.to_array(),
        ..DescriptorConfig::default()
    };
    compute_with_config(image, &config, masks)
}

/// Runs the pipeline selected by `kind`. `color` is ignored by `gfd1`.
///
/// # Errors
/// `InvalidInput` when a Clifford variant gets no `color`.
pub fn compute(
    image: &Image,
    kind: DescriptorKind,
    color: Option<&ColorVector>,
    masks: Option<&RingMaskSet>,
) -> Result<DescriptorVector> {
    match (kind, color) {
        (DescriptorKind::Gfd1, _) => gfd1(image, masks),
        (DescriptorKind::Gcfd1, Some(color)) => gcfd1(image, color, masks),
        (DescriptorKind::Gcfd3, Some(color)) => gcfd3(image, color, masks),
        (kind, None) => Err(GcfdError::invalid_input(format!(
            "{kind} needs a reference color vector"
        ))),
    }
}

/// Runs the pipeline described by `config`.
pub fn compute_with_config(
    image: &Image,
    config: &DescriptorConfig,
    masks: Option<&RingMaskSet>,
) -> Result<DescriptorVector> {
    let spectra = magnitude_spectra(image, config)?;
    match masks {
        Some(masks) => assemble(config.kind, &spectra, masks),
        None => {
            let (rows, cols) = spectra[0].dim();
            let masks = RingMaskSet::for_shape(rows, cols, config.max_r.unwrap_or(rows / 2))?;
            assemble(config.kind, &spectra, &masks)
        }
    }
}

/// Centered magnitude spectra of the polar image: one for `gfd1` and `gcfd1`,
/// parallel then orthogonal for `gcfd3`.
fn magnitude_spectra(image: &Image, config: &DescriptorConfig) -> Result<Vec<Array2<f64>>> {
    let size = config.polar_size(image.rows(), image.cols());

    let spectra = match config.kind {
        DescriptorKind::Gfd1 => {
            let gray = Image::Gray(image.to_gray()?);
            let polar = cartesian_to_polar_sized(&gray, config.mode, None, size)?.to_gray()?;
            vec![spectral::centered_magnitude(polar.view())?]
        }
        DescriptorKind::Gcfd1 => {
            let polar = cartesian_to_polar_sized(image, config.mode, None, size)?;
            let result = cft::transform(&polar, &config.color_vector())?;
            vec![centered(result.magnitude())]
        }
        DescriptorKind::Gcfd3 => {
            let polar = cartesian_to_polar_sized(image, config.mode, None, size)?;
            let result = cft::transform(&polar, &config.color_vector())?;
            vec![
                centered(result.parallel_magnitude()),
                centered(result.orthogonal_magnitude()),
            ]
        }
    };

    tracing::debug!(
        kind = %config.kind,
        rows = spectra[0].nrows(),
        cols = spectra[0].ncols(),
        "centered magnitude spectra"
    );
    Ok(spectra)
}

fn centered(mut magnitude: Array2<f64>) -> Array2<f64> {
    spectral::crop_spectrum(&mut magnitude);
    spectral::shift(&mut magnitude);
    magnitude
}

fn assemble(
    kind: DescriptorKind,
    spectra: &[Array2<f64>],
    masks: &RingMaskSet,
) -> Result<DescriptorVector> {
    let mut values = Vec::with_capacity(masks.len() * spectra.len());
    for spectrum in spectra {
        values.extend(masks.integrate(spectrum.view())?);
    }
    tracing::debug!(%kind, rings = masks.len(), len = values.len(), "descriptor assembled");
    Ok(DescriptorVector::new(kind, values))
}

/// Extracts descriptors for many images with one configuration, reusing ring
/// masks across images whose spectra share a shape.
#[derive(Debug)]
pub struct DescriptorExtractor {
    config: DescriptorConfig,
    cache: RingMaskCache,
}

impl DescriptorExtractor {
    pub fn new(config: DescriptorConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(DescriptorExtractor {
            config,
            cache: RingMaskCache::new(),
        })
    }

    pub fn config(&self) -> &DescriptorConfig {
        &self.config
    }

    pub fn extract(&mut self, image: &Image) -> Result<DescriptorVector> {
        let spectra = magnitude_spectra(image, &self.config)?;
        let (rows, cols) = spectra[0].dim();
        let max_r = self.config.max_r.unwrap_or(rows / 2);
        let masks = self.cache.get_or_build(rows, cols, max_r)?;
        assemble(self.config.kind, &spectra, &masks)
    }

    /// Stops at the first image that fails.
    pub fn extract_all<'a, I>(&mut self, images: I) -> Result<Vec<DescriptorVector>>
    where
        I: IntoIterator<Item = &'a Image>,
    {
        images.into_iter().map(|image| self.extract(image)).collect()
    }

    /// `(hits, misses)` of the ring mask cache.
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.stats()
    }
}

/// Stacks descriptors into one row each.
///
/// # Errors
/// `InvalidInput` for an empty slice, `DimensionMismatch` when lengths differ.
pub fn to_matrix(descriptors: &[DescriptorVector]) -> Result<Array2<f64>> {
    let first = descriptors
        .first()
        .ok_or_else(|| GcfdError::invalid_input("no descriptors to stack"))?;
    let cols = first.len();
    let mut out = Array2::zeros((descriptors.len(), cols));
    for (mut row, descriptor) in out.axis_iter_mut(Axis(0)).zip(descriptors) {
        if descriptor.len() != cols {
            return Err(GcfdError::dimension_mismatch((1, cols), (1, descriptor.len())));
        }
        row.assign(&ndarray::aview1(descriptor.values()));
    }
    Ok(out)
}

/// Rescales every column of `descriptors` (one descriptor per row) to
/// `[-1, 1]`. Constant columns map to 0.
pub fn scale_descriptors(descriptors: &Array2<f64>) -> Array2<f64> {
    let mut scaled = descriptors.clone();
    for mut column in scaled.axis_iter_mut(Axis(1)) {
        let min = column.iter().copied().fold(f64::INFINITY, f64::min);
        let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range > 0.0 {
            column.mapv_inplace(|x| 2.0 * (x - min) / range - 1.0);
        } else {
            column.fill(0.0);
        }
    }
    scaled
}
