use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use gcfd::affine_transform::rotate_image;
use gcfd::descriptor::{scale_descriptors, to_matrix};
use gcfd::{DescriptorConfig, DescriptorExtractor, DescriptorKind, DescriptorVector, Image, PolarMode};
use image::{open, GenericImageView};

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(author, version, about = "Rotation-invariant Fourier and Clifford Fourier descriptors of images.")]
struct Args {
    /// Image files to describe
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Descriptor: gfd1 (gray), gcfd1 or gcfd3 (color)
    #[arg(long)]
    kind: Option<DescriptorKind>,

    /// Reference color for the color descriptors, as "r,g,b"
    #[arg(long, value_parser = parse_color)]
    color: Option<[f64; 3]>,

    /// Polar resampling mode: full or crop
    #[arg(long)]
    mode: Option<PolarMode>,

    /// Outermost ring radius (default: half the spectrum height)
    #[arg(long)]
    max_r: Option<usize>,

    /// Number of radii in the polar image (default: image height)
    #[arg(long)]
    radii: Option<usize>,

    /// Number of angles in the polar image (default: image width)
    #[arg(long)]
    angles: Option<usize>,

    /// TOML file with descriptor settings; other flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Swap the red and blue channels after loading
    #[arg(long)]
    swap_rb: bool,

    /// Rotate every image by this many degrees before describing it
    #[arg(long)]
    rotate: Option<f64>,

    /// Rescale every descriptor component to [-1, 1] across the given images
    #[arg(long)]
    scale: bool,

    /// Write the descriptors to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

/// One output line.
#[derive(Serialize)]
struct Record<'a> {
    image: String,
    kind: DescriptorKind,
    values: &'a [f64],
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;
    tracing::info!(kind = %config.kind, mode = %config.mode, images = args.images.len(), "describing images");

    let mut extractor = DescriptorExtractor::new(config)?;
    let mut descriptors = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let mut image = read_image(path)?;
        if args.swap_rb {
            image.reorder_color_channels();
        }
        if let Some(angle) = args.rotate {
            image = rotate_image(&image, angle)
                .with_context(|| format!("rotating {}", path.display()))?;
        }
        let descriptor = extractor
            .extract(&image)
            .with_context(|| format!("describing {}", path.display()))?;
        descriptors.push(descriptor);
    }
    let (hits, misses) = extractor.cache_stats();
    tracing::debug!(hits, misses, "ring mask cache");

    let values: Vec<Vec<f64>> = if args.scale {
        let scaled = scale_descriptors(&to_matrix(&descriptors)?);
        scaled.rows().into_iter().map(|row| row.to_vec()).collect()
    } else {
        descriptors.iter().map(|d| d.values().to_vec()).collect()
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_records(BufWriter::new(file), &args.images, &descriptors, &values)?;
            tracing::info!("descriptors written to {}", path.display());
        }
        None => write_records(io::stdout().lock(), &args.images, &descriptors, &values)?,
    }
    Ok(())
}

/// Config file first, then every flag that was given.
fn build_config(args: &Args) -> Result<DescriptorConfig> {
    let mut config = match &args.config {
        Some(path) => DescriptorConfig::load_from_file(path)?,
        None => DescriptorConfig::default(),
    };
    if let Some(kind) = args.kind {
        config.kind = kind;
    }
    if let Some(color) = args.color {
        config.color = color;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    config.max_r = args.max_r.or(config.max_r);
    config.radii = args.radii.or(config.radii);
    config.angles = args.angles.or(config.angles);
    config.validate()?;
    Ok(config)
}

fn write_records<W: Write>(
    mut out: W,
    paths: &[PathBuf],
    descriptors: &[DescriptorVector],
    values: &[Vec<f64>],
) -> Result<()> {
    for ((path, descriptor), values) in paths.iter().zip(descriptors).zip(values) {
        let record = Record {
            image: path.display().to_string(),
            kind: descriptor.kind(),
            values,
        };
        serde_json::to_writer(&mut out, &record)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn parse_color(s: &str) -> Result<[f64; 3], String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(format!("expected 3 comma-separated values, got {}", parts.len())),
    }
}

pub fn read_image(path: &Path) -> Result<Image> {
    tracing::info!("Reading image file: {}", path.display());
    let img = open(path).with_context(|| format!("could not load {}", path.display()))?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        bail!("{} is empty", path.display());
    }
    let pixel_data = img.to_rgba8().into_raw();
    Ok(Image::from_rgba8(width as usize, height as usize, &pixel_data)?)
}
