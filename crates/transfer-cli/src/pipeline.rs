//! Pipeline functions behind the CLI subcommands.

use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use image::imageops::FilterType;
use image::RgbImage;

use style::features::bridge::{pixels_to_tensor, tensor_to_pixels};
use style::{transfer, LossHistory, StyleModel, VggBackbone};

use crate::config::{
    build_backbone_config, build_transfer_config, load_transfer_toml, resolve_image_size,
    CliOverrides, TransferToml,
};

type TransferBackend = Autodiff<NdArray<f32>>;

/// Arguments for the `transfer` subcommand.
#[derive(Debug)]
pub struct TransferArgs {
    /// Optional TOML config file.
    pub config: Option<PathBuf>,
    /// Image whose style is transferred.
    pub style: PathBuf,
    /// Image whose content is kept; also the starting point.
    pub content: PathBuf,
    /// Where the result image is written.
    pub output: PathBuf,
    /// Backbone weights saved with `NamedMpkFileRecorder`.
    pub weights: Option<PathBuf>,
    /// Optional JSON file for the loss history.
    pub losses: Option<PathBuf>,
    /// Build the model and report feature shapes without optimizing.
    pub dry_run: bool,
    pub overrides: CliOverrides,
}

/// Arguments for the `summary` subcommand.
#[derive(Debug)]
pub struct SummaryArgs {
    /// Loss history JSON written by `transfer --losses`.
    pub input: PathBuf,
    /// Output as JSON instead of human-readable text.
    pub json: bool,
}

/// Load an image as a `(1, 3, H, W)` tensor whose longest side is `size`.
fn load_image<B: Backend>(path: &Path, size: u32, device: &B::Device) -> anyhow::Result<Tensor<B, 4>> {
    let img = image::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?
        .resize(size, size, FilterType::Triangle)
        .to_rgb32f();
    let (width, height) = img.dimensions();
    tracing::debug!(path = %path.display(), width, height, "Loaded image");
    Ok(pixels_to_tensor(
        img.as_raw(),
        height as usize,
        width as usize,
        device,
    ))
}

/// Write a `(1, 3, H, W)` tensor with values in `[0, 1]` as an 8-bit RGB image.
fn save_image<B: Backend>(tensor: Tensor<B, 4>, path: &Path) -> anyhow::Result<()> {
    let (pixels, height, width) = tensor_to_pixels(tensor)?;
    let bytes: Vec<u8> = pixels
        .iter()
        .map(|p| (p.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let img = RgbImage::from_raw(width as u32, height as u32, bytes)
        .ok_or_else(|| anyhow::anyhow!("Pixel buffer does not match {width}x{height}"))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    img.save(path)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
    Ok(())
}

/// Run a style transfer and write the resulting image.
pub fn run_transfer(args: TransferArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let device = Default::default();

    // 1. Config
    let toml = match &args.config {
        Some(path) => load_transfer_toml(path)?,
        None => TransferToml::default(),
    };
    let config = build_transfer_config(&toml.transfer, &args.overrides)?;
    let image_size = resolve_image_size(&toml.transfer, &args.overrides);

    // 2. Backbone
    let mut backbone: VggBackbone<TransferBackend> =
        build_backbone_config(&toml.backbone).init(&device);
    if let Some(weights) = &args.weights {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        backbone = backbone
            .load_file(weights.clone(), &recorder, &device)
            .map_err(|e| anyhow::anyhow!("Failed to load backbone from {}: {e}", weights.display()))?;
        tracing::info!(path = %weights.display(), "Loaded backbone weights");
    } else {
        tracing::warn!("No backbone weights given, using randomly initialized features");
    }

    // 3. Images
    let style_image = load_image::<TransferBackend>(&args.style, image_size, &device)?;
    let content_image = load_image::<TransferBackend>(&args.content, image_size, &device)?;
    tracing::info!(
        style = ?style_image.dims(),
        content = ?content_image.dims(),
        distance = %config.distance,
        "Images loaded"
    );

    let model = StyleModel::new(backbone, style_image, content_image.clone(), &config)?;

    if args.dry_run {
        let features = model.extract(content_image);
        for (stage, map) in features.iter().enumerate() {
            tracing::info!(stage, shape = ?map.dims(), "Feature map");
        }
        println!("Dry run complete: model built, {} style layers", model.style_layers().len());
        return Ok(());
    }

    // 4. Optimize
    let outcome = transfer(&config, &model, content_image, &device)?;

    // 5. Outputs
    save_image(outcome.image.pixels_detached(), &args.output)?;
    if let Some(path) = &args.losses {
        let file = std::fs::File::create(path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;
        serde_json::to_writer_pretty(file, &outcome.history)?;
    }

    let elapsed = start.elapsed();
    println!("\n--- Transfer Summary ---");
    println!("Distance: {}", config.distance);
    println!("Steps: {}", outcome.history.len());
    println!("Final: {}", outcome.history.display());
    println!("Output: {}", args.output.display());
    if let Some(path) = &args.losses {
        println!("Losses: {}", path.display());
    }
    println!("Elapsed: {:.1}s", elapsed.as_secs_f64());

    Ok(())
}

/// Print statistics from a loss history JSON file.
pub fn run_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let file = std::fs::File::open(&args.input)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", args.input.display()))?;
    let history: LossHistory = serde_json::from_reader(file)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", args.input.display()))?;

    let summary = HistorySummary::of(&history);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("--- Loss History Summary ---");
    println!("File: {}", args.input.display());
    println!("Steps: {}", summary.steps);
    println!("Style: first={:.4} last={:.4} min={:.4}", summary.style.first, summary.style.last, summary.style.min);
    println!("Content: first={:.4} last={:.4} min={:.4}", summary.content.first, summary.content.last, summary.content.min);
    if let Some(disc) = &summary.disc {
        println!("Disc: first={:.4} last={:.4} min={:.4}", disc.first, disc.last, disc.min);
    }
    for warning in history.health_check() {
        println!("Warning: {warning}");
    }
    Ok(())
}

/// First, last and smallest value of one loss series.
#[derive(Debug, serde::Serialize, PartialEq)]
pub struct SeriesSummary {
    pub first: f64,
    pub last: f64,
    pub min: f64,
}

impl SeriesSummary {
    fn of(values: &[f64]) -> Option<Self> {
        Some(Self {
            first: *values.first()?,
            last: *values.last()?,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
        })
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HistorySummary {
    pub steps: usize,
    pub style: SeriesSummary,
    pub content: SeriesSummary,
    pub disc: Option<SeriesSummary>,
}

impl HistorySummary {
    pub fn of(history: &LossHistory) -> Self {
        let empty = || SeriesSummary {
            first: f64::NAN,
            last: f64::NAN,
            min: f64::NAN,
        };
        Self {
            steps: history.len(),
            style: SeriesSummary::of(&history.style).unwrap_or_else(empty),
            content: SeriesSummary::of(&history.content).unwrap_or_else(empty),
            disc: SeriesSummary::of(&history.disc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_summary() {
        let history = LossHistory {
            style: vec![3.0, 1.0, 2.0],
            content: vec![0.5, 0.4, 0.3],
            disc: vec![],
        };
        let summary = HistorySummary::of(&history);
        assert_eq!(summary.steps, 3);
        assert_eq!(
            summary.style,
            SeriesSummary {
                first: 3.0,
                last: 2.0,
                min: 1.0
            }
        );
        assert_eq!(summary.content.min, 0.3);
        assert!(summary.disc.is_none());
    }

    #[test]
    fn test_image_round_trip_through_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("out.png");
        let device = Default::default();

        let flat: Vec<f32> = (0..4 * 6 * 3).map(|i| (i % 5) as f32 / 4.0).collect();
        let tensor = pixels_to_tensor::<NdArray<f32>>(&flat, 4, 6, &device);
        save_image(tensor, &path).unwrap();

        // Longest side already 6, so no resampling
        let loaded = load_image::<NdArray<f32>>(&path, 6, &device).unwrap();
        assert_eq!(loaded.dims(), [1, 3, 4, 6]);
        let (pixels, _, _) = tensor_to_pixels(loaded).unwrap();
        for (a, b) in pixels.iter().zip(&flat) {
            assert!((a - b).abs() < 1.0 / 255.0 + 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn test_missing_image_reports_path() {
        let device = Default::default();
        let err = load_image::<NdArray<f32>>(Path::new("/nonexistent/style.png"), 8, &device)
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/style.png"));
    }
}
