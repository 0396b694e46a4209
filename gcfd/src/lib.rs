//! # GCFD Library
//!
//! The `gcfd` library computes rotation-invariant descriptors of gray and color
//! images from their Fourier and Clifford Fourier spectra. An image is
//! resampled to polar coordinates, so that an in-plane rotation becomes a
//! cyclic shift along the angle axis; the modulus of its 2D spectrum is then
//! blind to that shift, and integrating the centered modulus over concentric
//! rings yields a fixed-length vector.
//!
//! ## Overview of Modules
//!
//! - **`image`**: Defines the `Image` enum (gray or multi-channel `f64` grids) with
//!   conversion from RGBA bytes, gray conversion, channel reordering and pixel norms.
//!
//! - **`spectral`**: Forward and inverse 2D FFT of real or complex grids, plus the
//!   spectrum shift, even-size crop and modulus helpers.
//!
//! - **`polar`**: Cartesian-to-polar resampling of gray or color images in `full` or
//!   `crop` mode.
//!
//! - **`cft`**: The color Clifford Fourier transform relative to a reference color,
//!   its parallel/orthogonal decomposition and its inverse.
//!
//! - **`discrete_circles`**: Concentric ring masks, ring integration and a cache of
//!   mask sets keyed by grid shape.
//!
//! - **`descriptor`**: The `gfd1`, `gcfd1` and `gcfd3` pipelines, descriptor distance
//!   and scaling, and a `DescriptorExtractor` for batches of images.
//!
//! - **`affine_transform`**: 2D affine transforms and image rotation.
//!
//! - **`config`**: `DescriptorConfig`, loadable from TOML.
//!
//! - **`error`**: The `GcfdError` type shared by every operation.

pub mod affine_transform;
pub mod cft;
pub mod config;
pub mod descriptor;
pub mod discrete_circles;
pub mod error;
pub mod image;
pub mod polar;
pub mod spectral;

pub use cft::{ColorVector, CftResult};
pub use config::{ConfigError, DescriptorConfig};
pub use descriptor::{DescriptorExtractor, DescriptorKind, DescriptorVector};
pub use discrete_circles::{RingMaskCache, RingMaskSet};
pub use error::{GcfdError, Result};
pub use image::Image;
pub use polar::{PolarMode, PolarSize};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
