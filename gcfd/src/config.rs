//! Descriptor configuration loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! kind = "gcfd3"
//! color = [1.0, 0.0, 0.0]
//! mode = "crop"
//! max_r = 32
//! radii = 64
//! angles = 64
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cft::ColorVector;
use crate::descriptor::DescriptorKind;
use crate::discrete_circles::MAX_RING_RADIUS;
use crate::polar::{PolarMode, PolarSize};

/// Errors raised while loading or validating a [`DescriptorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parameters of a descriptor pipeline.
///
/// # Examples
///
/// ```
/// use gcfd::config::DescriptorConfig;
/// use gcfd::descriptor::DescriptorKind;
///
/// let config = DescriptorConfig::from_toml_str("kind = \"gcfd1\"\nmax_r = 8").unwrap();
/// assert_eq!(config.kind, DescriptorKind::Gcfd1);
/// assert_eq!(config.max_r, Some(8));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DescriptorConfig {
    /// Which pipeline to run.
    pub kind: DescriptorKind,
    /// Reference color for the Clifford variants, ignored by `gfd1`.
    pub color: [f64; 3],
    /// Polar resampling mode.
    pub mode: PolarMode,
    /// Outermost ring; half the spectrum height when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_r: Option<usize>,
    /// Polar rows; the source height when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radii: Option<usize>,
    /// Polar columns; the source width when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angles: Option<usize>,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            kind: DescriptorKind::default(),
            color: ColorVector::default().to_array(),
            mode: PolarMode::default(),
            max_r: None,
            radii: None,
            angles: None,
        }
    }
}

impl DescriptorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: DescriptorConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a pipeline cannot recover from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("radii", self.radii), ("angles", self.angles)] {
            if let Some(n) = value {
                if n < 2 {
                    return Err(ConfigError::Invalid(format!(
                        "{name} must be at least 2, got {n}"
                    )));
                }
            }
        }
        if let Some(max_r) = self.max_r {
            if max_r > MAX_RING_RADIUS || self.kind.descriptor_len(max_r).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "max_r must be at most {MAX_RING_RADIUS}, got {max_r}"
                )));
            }
        }
        if self.kind.uses_color() {
            if self.color.iter().any(|c| !c.is_finite()) {
                return Err(ConfigError::Invalid("color must be finite".into()));
            }
            if self.color.iter().all(|c| *c == 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} needs a non-zero reference color",
                    self.kind
                )));
            }
        }
        Ok(())
    }

    pub fn color_vector(&self) -> ColorVector {
        ColorVector::from(self.color)
    }

    /// Polar output size for a `rows x cols` source, or `None` to keep the
    /// source size.
    pub fn polar_size(&self, rows: usize, cols: usize) -> Option<PolarSize> {
        if self.radii.is_none() && self.angles.is_none() {
            return None;
        }
        Some(PolarSize {
            radii: self.radii.unwrap_or(rows),
            angles: self.angles.unwrap_or(cols),
        })
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}
